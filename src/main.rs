//! Glyph Grid Solver
//!
//! Reads the 3x3 glyph grid of the on-screen puzzle from a screenshot and
//! replays it as key presses, row by row.
//!
//! Usage: `glyph-grid-solver <screenshot.png> [--execute] [--debug-images]`
//!
//! Without `--execute` the keys are only logged. With it (Windows only) they
//! are sent to the focused window; Escape stops the sequence.
//! `--debug-images` saves the grid and cell crops for this run.

mod capture;
mod glyph;
mod grid;
mod paths;
mod solver;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use capture::{FrameSource, ImageFileSource, StaticFrameSource};
use glyph::{build_classifier, load_templates, LetterClassifier};
use grid::locator::{is_known_preset, PROFILE_AUTO, PROFILE_CUSTOM};
use grid::DisplayGeometry;
use solver::config::ClassifierStrategy;
use solver::{KeyInjector, LogInjector, SessionRequest, SessionState, SolverConfig, SolverEvent};

/// Log file of the active session, if any.
static SESSION_LOG: Mutex<Option<PathBuf>> = Mutex::new(None);

fn append_line(path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Logs a message to both console and log file with timestamp.
///
/// While a session log is set, the line is also appended there.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    append_line(&paths::get_logs_dir().join("glyph_grid_solver.log"), &line);

    if let Ok(session_log) = SESSION_LOG.lock() {
        if let Some(path) = session_log.as_ref() {
            append_line(path, &line);
        }
    }
}

/// Activates (or with `None`, deactivates) per-session logging.
pub fn set_session_log(path: Option<PathBuf>) {
    if let Ok(mut session_log) = SESSION_LOG.lock() {
        *session_log = path;
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        append_line(&paths::get_logs_dir().join("glyph_grid_solver.log"), &log_msg);
    }));

    let mut screenshot: Option<PathBuf> = None;
    let mut execute = false;
    let mut debug_images = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--execute" => execute = true,
            "--debug-images" => debug_images = true,
            _ if screenshot.is_none() => screenshot = Some(PathBuf::from(arg)),
            other => return Err(anyhow!("Unexpected argument: {}", other)),
        }
    }
    let screenshot =
        screenshot.ok_or_else(|| anyhow!("Usage: glyph-grid-solver <screenshot.png> [--execute] [--debug-images]"))?;

    // Ensure output directories exist
    paths::ensure_directories().context("Failed to create output directories")?;

    // Load configuration
    solver::init_config();
    if debug_images {
        let mut config = (*solver::get_config()).clone();
        config.save_debug_images = true;
        solver::update_config(config)?;
    }
    let config = solver::get_config();
    let profile = config.grid.resolution_profile.as_str();
    if profile != PROFILE_AUTO && profile != PROFILE_CUSTOM && !is_known_preset(profile) {
        log(&format!(
            "Unknown resolution profile \"{}\", using proportional layout",
            profile
        ));
    }

    let classifier = load_classifier(&config);

    // The screenshot stands in for the display
    let frame = ImageFileSource::new(&screenshot).capture()?;
    let display = DisplayGeometry::new(frame.width(), frame.height());
    log(&format!(
        "Loaded {} ({}x{}, profile {})",
        screenshot.display(),
        display.width,
        display.height,
        display.profile_key()
    ));

    let injector = make_injector(execute)?;
    let (sender, receiver) = solver::create_event_channel();

    let handle = solver::start_session(SessionRequest {
        source: Box::new(StaticFrameSource::new(frame)),
        injector,
        display,
        classifier,
        events: Some(sender),
    })?;
    log(&format!("Session started: {}", solver::last_status()));

    #[cfg(windows)]
    {
        if execute {
            spawn_stop_watcher();
        }
    }

    // Runs until the session thread drops its sender after the cooldown
    for event in receiver {
        report_event(&event);
    }

    let state = handle
        .join()
        .map_err(|_| anyhow!("Session thread panicked"))?;
    match state {
        SessionState::Error(msg) => Err(anyhow!(msg)),
        _ => Ok(()),
    }
}

/// Builds the configured classifier, loading templates when needed.
fn load_classifier(config: &SolverConfig) -> Arc<dyn LetterClassifier> {
    let templates = match config.classifier_strategy {
        ClassifierStrategy::Template => {
            let dir = paths::get_templates_dir();
            match load_templates(&dir, &config.foreground) {
                Ok(set) => {
                    log(&format!("Loaded {} templates from {}", set.len(), dir.display()));
                    Some(set)
                }
                Err(e) => {
                    log(&format!("Failed to load templates: {}", e));
                    None
                }
            }
        }
        ClassifierStrategy::Heuristic => None,
    };
    build_classifier(config, templates)
}

#[cfg(windows)]
fn make_injector(execute: bool) -> Result<Box<dyn KeyInjector>> {
    if execute {
        log("Keys will be sent to the focused window (Escape to stop)");
        Ok(Box::new(solver::SendInputInjector::new()))
    } else {
        Ok(Box::new(LogInjector::new()))
    }
}

#[cfg(not(windows))]
fn make_injector(execute: bool) -> Result<Box<dyn KeyInjector>> {
    if execute {
        return Err(anyhow!("--execute is only supported on Windows"));
    }
    Ok(Box::new(LogInjector::new()))
}

/// Polls Escape while the session runs and requests a stop when pressed.
#[cfg(windows)]
fn spawn_stop_watcher() {
    use std::time::Duration;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_ESCAPE};

    std::thread::spawn(|| {
        while solver::is_session_running() {
            let state = unsafe { GetAsyncKeyState(VK_ESCAPE.0 as i32) };
            if (state as u16) & 0x8000 != 0 {
                solver::request_stop();
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    });
}

fn report_event(event: &SolverEvent) {
    match event {
        SolverEvent::StateChanged { state, message } => {
            log(&format!("[{}] {}", state, message));
        }
        SolverEvent::GridDetected { grid, readings } => {
            let slowest = readings.iter().map(|r| r.elapsed_us).max().unwrap_or(0);
            log(&format!("Grid (slowest cell {}us):\n{}", slowest, grid));
        }
        SolverEvent::KeyPressed { request } => {
            log(&format!("Pressed {} (cell {})", request.symbol.key(), request.index));
        }
        SolverEvent::KeyFailed { request, error } => {
            log(&format!(
                "Key {} (cell {}) failed: {}",
                request.symbol.key(),
                request.index,
                error
            ));
        }
        SolverEvent::Reset => log("Status cleared"),
    }
}
