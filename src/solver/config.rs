//! Configuration types for the solver.
//!
//! Loads settings from config.json at startup. Provides grid geometry,
//! color thresholds, classifier selection and key timing.
//!
//! The process-wide configuration is only replaced through `update_config`.
//! Sessions hold an `Arc` snapshot taken when they start, so an update never
//! affects a session that is already running.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use crate::glyph::Symbol;

/// Global configuration, replaced wholesale by `update_config`.
static CONFIG: OnceLock<RwLock<Arc<SolverConfig>>> = OnceLock::new();

/// Grid geometry settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// "auto" (match display resolution), "custom" (use the values below
    /// verbatim) or a preset key such as "1920x1080"
    pub resolution_profile: String,
    /// Cell edge length in pixels (custom profile only)
    pub cell_size: u32,
    /// Gap between adjacent cells in pixels (custom profile only)
    pub cell_spacing: u32,
    /// Grid origin for the custom profile, or a nudge added to a preset origin
    pub offset_x: i32,
    pub offset_y: i32,
    /// Pixels trimmed from every cell edge to drop border artifacts
    pub edge_padding: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution_profile: "auto".to_string(),
            cell_size: 96,
            cell_spacing: 12,
            offset_x: 0,
            offset_y: 0,
            edge_padding: 4,
        }
    }
}

/// Color rule deciding whether a pixel belongs to a glyph.
///
/// Glyphs are bright cyan: strong green and blue, suppressed red. The
/// deviation test (max channel minus min channel) rejects the near-gray
/// anti-aliased pixels along cell borders.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForegroundRule {
    pub min_green: u8,
    pub min_blue: u8,
    pub max_red: u8,
    /// Minimum mean of R, G, B
    pub min_brightness: u8,
    /// Minimum spread between the strongest and weakest channel
    pub min_deviation: u8,
}

impl Default for ForegroundRule {
    fn default() -> Self {
        Self {
            min_green: 140,
            min_blue: 140,
            max_red: 120,
            min_brightness: 110,
            min_deviation: 60,
        }
    }
}

/// Thresholds for the puzzle presence check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceThresholds {
    /// Foreground fraction must lie within [min_foreground, max_foreground]
    pub min_foreground: f32,
    pub max_foreground: f32,
    pub min_background: f32,
    pub min_border: f32,
    /// Pixels with mean brightness at or below this count as dark background
    pub background_max_brightness: u8,
    /// Blue channel band for border lines
    pub border_min_blue: u8,
    pub border_max_blue: u8,
}

impl Default for PresenceThresholds {
    fn default() -> Self {
        Self {
            min_foreground: 0.015,
            max_foreground: 0.45,
            min_background: 0.30,
            min_border: 0.01,
            background_max_brightness: 55,
            border_min_blue: 80,
            border_max_blue: 200,
        }
    }
}

/// Inter-key delay settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyTiming {
    pub base_delay_ms: u64,
    /// Delay is drawn uniformly from base ± variance
    pub delay_variance_ms: u64,
    /// Floor applied after jitter
    pub min_key_delay_ms: u64,
}

impl Default for KeyTiming {
    fn default() -> Self {
        Self {
            base_delay_ms: 120,
            delay_variance_ms: 40,
            min_key_delay_ms: 40,
        }
    }
}

/// Which letter classifier a session uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStrategy {
    /// Decision tree over signature features
    #[default]
    Heuristic,
    /// Nearest match against reference glyph images
    Template,
}

/// Complete solver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub classifier_strategy: ClassifierStrategy,
    #[serde(default)]
    pub timing: KeyTiming,
    #[serde(default)]
    pub foreground: ForegroundRule,
    #[serde(default)]
    pub presence: PresenceThresholds,
    /// Cells with fewer foreground pixels than this are Unknown
    #[serde(default = "default_min_foreground_pixels")]
    pub min_foreground_pixels: u32,
    /// Center-mass share below which a glyph counts as looped
    #[serde(default = "default_hole_ratio")]
    pub hole_ratio: f32,
    /// Best template score below this yields Unknown
    #[serde(default = "default_min_template_score")]
    pub min_template_score: f32,
    /// More Unknown cells than this aborts the session before any key press
    #[serde(default = "default_max_unknown_cells")]
    pub max_unknown_cells: usize,
    /// How long a terminal status stays on display before resetting to idle
    #[serde(default = "default_status_cooldown_ms")]
    pub status_cooldown_ms: u64,
    /// Write grid/cell images and readings for every detection
    #[serde(default)]
    pub save_debug_images: bool,
    /// Replaces the built-in correction table when present
    #[serde(default)]
    pub corrections: Option<BTreeMap<Symbol, Symbol>>,
}

fn default_min_foreground_pixels() -> u32 {
    30
}

fn default_hole_ratio() -> f32 {
    0.15
}

fn default_min_template_score() -> f32 {
    0.40
}

fn default_max_unknown_cells() -> usize {
    5
}

fn default_status_cooldown_ms() -> u64 {
    1500
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            classifier_strategy: ClassifierStrategy::default(),
            timing: KeyTiming::default(),
            foreground: ForegroundRule::default(),
            presence: PresenceThresholds::default(),
            min_foreground_pixels: default_min_foreground_pixels(),
            hole_ratio: default_hole_ratio(),
            min_template_score: default_min_template_score(),
            max_unknown_cells: default_max_unknown_cells(),
            status_cooldown_ms: default_status_cooldown_ms(),
            save_debug_images: false,
            corrections: None,
        }
    }
}

impl SolverConfig {
    /// Rejects values that would make geometry or timing meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.grid.cell_size == 0 {
            return Err(anyhow!("grid.cell_size must be greater than zero"));
        }
        let extent = 3 * self.grid.cell_size as u64 + 2 * self.grid.cell_spacing as u64;
        if extent > u32::MAX as u64 {
            return Err(anyhow!(
                "grid of cell_size {} and cell_spacing {} is {} pixels wide, too large",
                self.grid.cell_size,
                self.grid.cell_spacing,
                extent
            ));
        }
        if self.timing.delay_variance_ms > 1000 {
            return Err(anyhow!(
                "timing.delay_variance_ms must be at most 1000 (got {})",
                self.timing.delay_variance_ms
            ));
        }

        let fractions = [
            ("presence.min_foreground", self.presence.min_foreground),
            ("presence.max_foreground", self.presence.max_foreground),
            ("presence.min_background", self.presence.min_background),
            ("presence.min_border", self.presence.min_border),
            ("hole_ratio", self.hole_ratio),
            ("min_template_score", self.min_template_score),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1] (got {})", name, value));
            }
        }

        if self.presence.min_foreground > self.presence.max_foreground {
            return Err(anyhow!(
                "presence.min_foreground ({}) exceeds presence.max_foreground ({})",
                self.presence.min_foreground,
                self.presence.max_foreground
            ));
        }
        if self.max_unknown_cells > 9 {
            return Err(anyhow!("max_unknown_cells must be at most 9"));
        }
        Ok(())
    }
}

/// Returns the default config path: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from a file, falling back to defaults on any problem.
pub fn load_config_from(config_path: &Path) -> SolverConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if !config_path.exists() {
        crate::log("config.json not found. Using default config.");
        return SolverConfig::default();
    }

    let contents = match fs::read_to_string(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            crate::log(&format!(
                "Failed to read config.json: {}. Using defaults.",
                e
            ));
            return SolverConfig::default();
        }
    };

    match serde_json::from_str::<SolverConfig>(&contents) {
        Ok(config) => match config.validate() {
            Ok(()) => {
                crate::log("Config loaded from config.json");
                config
            }
            Err(e) => {
                crate::log(&format!("Invalid config.json: {}. Using defaults.", e));
                SolverConfig::default()
            }
        },
        Err(e) => {
            crate::log(&format!(
                "Failed to parse config.json: {}. Using defaults.",
                e
            ));
            SolverConfig::default()
        }
    }
}

/// Writes a configuration as pretty-printed JSON.
pub fn save_config(config: &SolverConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn config_cell() -> &'static RwLock<Arc<SolverConfig>> {
    CONFIG.get_or_init(|| RwLock::new(Arc::new(SolverConfig::default())))
}

/// Loads config.json into the global configuration. Call once at startup.
///
/// A missing config.json is written out with the defaults so it can be edited.
pub fn init_config() {
    let path = default_config_path();
    let loaded = load_config_from(&path);
    if !path.exists() {
        match save_config(&loaded, &path) {
            Ok(()) => crate::log(&format!("Wrote default config to {}", path.display())),
            Err(e) => crate::log(&format!("Could not write default config: {:#}", e)),
        }
    }
    replace_config(Arc::new(loaded));
}

/// Returns a snapshot of the current configuration.
///
/// Defaults are returned if `init_config` was never called.
pub fn get_config() -> Arc<SolverConfig> {
    match config_cell().read() {
        Ok(guard) => Arc::clone(&*guard),
        Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
    }
}

/// Replaces the global configuration. Only sessions started afterwards see it.
pub fn update_config(config: SolverConfig) -> Result<()> {
    config.validate()?;
    replace_config(Arc::new(config));
    crate::log("Configuration updated");
    Ok(())
}

fn replace_config(config: Arc<SolverConfig>) {
    match config_cell().write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => {
            let mut guard = poisoned.into_inner();
            *guard = config;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_cell_size() {
        let mut config = SolverConfig::default();
        config.grid.cell_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_grid_wider_than_u32() {
        let mut config = SolverConfig::default();
        config.grid.cell_size = 1_500_000_000;
        assert!(config.validate().is_err());

        config.grid.cell_size = 1_000_000_000;
        config.grid.cell_spacing = 700_000_000;
        assert!(config.validate().is_err());

        config.grid.cell_spacing = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_foreground_band() {
        let mut config = SolverConfig::default();
        config.presence.min_foreground = 0.5;
        config.presence.max_foreground = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "grid": { "resolution_profile": "custom", "cell_size": 50 },
                        "classifier_strategy": "template",
                        "corrections": { "Q": "D" } }"#;
        let config: SolverConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.grid.resolution_profile, "custom");
        assert_eq!(config.grid.cell_size, 50);
        assert_eq!(config.grid.cell_spacing, 12);
        assert_eq!(config.classifier_strategy, ClassifierStrategy::Template);
        assert_eq!(config.max_unknown_cells, 5);
        assert_eq!(
            config.corrections.unwrap().get(&Symbol::Q),
            Some(&Symbol::D)
        );
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SolverConfig::default();
        config.timing.base_delay_ms = 80;
        config.save_debug_images = true;
        save_config(&config, &path).unwrap();

        let loaded = load_config_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_config_from(&path), SolverConfig::default());
    }

    #[test]
    fn test_update_config_does_not_touch_existing_snapshot() {
        let before = get_config();

        let mut changed = (*before).clone();
        changed.timing.base_delay_ms = before.timing.base_delay_ms + 1;
        update_config(changed.clone()).unwrap();

        let after = get_config();
        assert_eq!(after.timing.base_delay_ms, changed.timing.base_delay_ms);
        assert_ne!(before.timing.base_delay_ms, after.timing.base_delay_ms);

        // Restore for other tests sharing the global
        update_config((*before).clone()).unwrap();
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let mut bad = SolverConfig::default();
        bad.hole_ratio = 2.0;
        assert!(update_config(bad).is_err());
    }
}
