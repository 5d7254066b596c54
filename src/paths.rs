use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the per-session log directory: `<exe_dir>/logs/sessions/`
pub fn get_session_logs_dir() -> PathBuf {
    get_logs_dir().join("sessions")
}

/// Returns the glyph template directory: `<exe_dir>/resources/templates/`
pub fn get_templates_dir() -> PathBuf {
    get_exe_dir().join("resources").join("templates")
}

/// Returns the debug artifact directory: `<exe_dir>/debug/`
pub fn get_debug_dir() -> PathBuf {
    get_exe_dir().join("debug")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_session_logs_dir())?;
    std::fs::create_dir_all(get_templates_dir())?;
    Ok(())
}
