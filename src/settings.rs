use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use log::{debug, info, warn, error};

use crate::config;

/// User-specific settings that persist across runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    /// Coefficient applied to each class's production threshold to form the
    /// lower confidence bound when mining
    #[serde(default = "default_lower_threshold_coefficient")]
    pub lower_threshold_coefficient: f64,

    /// Normalized y cutoff; detections centred above it are dropped
    #[serde(default = "default_filter_horizon")]
    pub filter_horizon: f64,

    /// Apex of the top-corner exclusion wedges (<= 0 disables the wedge)
    #[serde(default = "default_wedge_apex_y")]
    pub wedge_apex_y: f64,

    /// Normalized padding added around patch crops
    #[serde(default = "default_patch_margin")]
    pub patch_margin: f64,

    /// Exported patch size in pixels
    #[serde(default = "default_patch_width")]
    pub patch_width: u32,

    #[serde(default = "default_patch_height")]
    pub patch_height: u32,

    /// Per-frame zoom percentage for transition sequences
    #[serde(default = "default_zoom_percent")]
    pub zoom_percent: f64,

    /// Intermediate frames generated per source image
    #[serde(default = "default_zoom_steps")]
    pub zoom_steps: u32,

    /// Executable used to edit labels
    #[serde(default = "default_labeler_command")]
    pub labeler_command: String,

    /// Dataset-browser UI address opened during review sessions
    #[serde(default = "default_viewer_url")]
    pub viewer_url: String,
}

fn default_lower_threshold_coefficient() -> f64 {
    config::DEFAULT_LOWER_THRESHOLD_COEFFICIENT
}

fn default_filter_horizon() -> f64 {
    config::DEFAULT_FILTER_HORIZON
}

fn default_wedge_apex_y() -> f64 {
    config::DEFAULT_WEDGE_APEX_Y
}

fn default_patch_margin() -> f64 {
    config::DEFAULT_PATCH_MARGIN
}

fn default_patch_width() -> u32 {
    config::DEFAULT_PATCH_WIDTH
}

fn default_patch_height() -> u32 {
    config::DEFAULT_PATCH_HEIGHT
}

fn default_zoom_percent() -> f64 {
    config::DEFAULT_ZOOM_PERCENT
}

fn default_zoom_steps() -> u32 {
    config::DEFAULT_ZOOM_STEPS
}

fn default_labeler_command() -> String {
    "open_labeling".to_string()
}

fn default_viewer_url() -> String {
    "http://localhost:5151".to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            lower_threshold_coefficient: config::DEFAULT_LOWER_THRESHOLD_COEFFICIENT,
            filter_horizon: config::DEFAULT_FILTER_HORIZON,
            wedge_apex_y: config::DEFAULT_WEDGE_APEX_Y,
            patch_margin: config::DEFAULT_PATCH_MARGIN,
            patch_width: config::DEFAULT_PATCH_WIDTH,
            patch_height: config::DEFAULT_PATCH_HEIGHT,
            zoom_percent: config::DEFAULT_ZOOM_PERCENT,
            zoom_steps: config::DEFAULT_ZOOM_STEPS,
            labeler_command: default_labeler_command(),
            viewer_url: default_viewer_url(),
        }
    }
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/BoxWrangle/settings.yaml
    /// On Linux: ~/.config/boxwrangle/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\BoxWrangle\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        let app_config_dir = config_dir.join("BoxWrangle");
        app_config_dir.join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&str>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p);
                PathBuf::from(p)
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            debug!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => {
                match serde_yaml::from_str::<UserSettings>(&contents) {
                    Ok(settings) => {
                        info!("Loaded settings from {:?}", path);
                        debug!("Settings: lower_coefficient={}, horizon={}, wedge_apex={}, labeler={}",
                            settings.lower_threshold_coefficient, settings.filter_horizon,
                            settings.wedge_apex_y, settings.labeler_command);
                        settings
                    }
                    Err(e) => {
                        error!("Failed to parse settings file at {:?}: {}", path, e);
                        warn!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Save settings to the YAML file while preserving comments
    #[allow(dead_code)]
    pub fn save(&self) -> Result<(), String> {
        let path = Self::settings_path();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        // If file exists, try to preserve comments by doing in-place value updates
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => {
                    let updated = self.update_yaml_values(&contents);
                    fs::write(&path, updated)
                        .map_err(|e| format!("Failed to write settings file: {}", e))?;
                    info!("Saved settings to {:?} (comments preserved)", path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to read existing settings file for comment preservation: {}", e);
                    // Fall through to create new file
                }
            }
        }

        // File doesn't exist or couldn't be read, create with comments
        let yaml = self.to_yaml_with_comments();
        fs::write(&path, yaml)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Update YAML values while preserving existing comments and structure
    fn update_yaml_values(&self, yaml_content: &str) -> String {
        let mut result = yaml_content.to_string();

        // Update each field using regex to replace the value while keeping comments
        result = Self::replace_yaml_value(&result, "lower_threshold_coefficient", &self.lower_threshold_coefficient.to_string());
        result = Self::replace_yaml_value(&result, "filter_horizon", &self.filter_horizon.to_string());
        result = Self::replace_yaml_value(&result, "wedge_apex_y", &self.wedge_apex_y.to_string());
        result = Self::replace_yaml_value(&result, "patch_margin", &self.patch_margin.to_string());
        result = Self::replace_yaml_value(&result, "patch_width", &self.patch_width.to_string());
        result = Self::replace_yaml_value(&result, "patch_height", &self.patch_height.to_string());
        result = Self::replace_yaml_value(&result, "zoom_percent", &self.zoom_percent.to_string());
        result = Self::replace_yaml_value(&result, "zoom_steps", &self.zoom_steps.to_string());
        result = Self::replace_yaml_value(&result, "labeler_command", &format!("\"{}\"", self.labeler_command));
        result = Self::replace_yaml_value(&result, "viewer_url", &format!("\"{}\"", self.viewer_url));

        result
    }

    /// Replace a YAML key's value while preserving the rest of the line
    fn replace_yaml_value(yaml: &str, key: &str, new_value: &str) -> String {
        let pattern = format!(r"(?m)^(\s*{}\s*:\s*).*$", regex::escape(key));
        let replacement = format!("${{1}}{}", new_value);

        // Use regex crate for replacement
        match regex::Regex::new(&pattern) {
            Ok(re) => re.replace_all(yaml, replacement.as_str()).to_string(),
            Err(e) => {
                warn!("Failed to create regex for key '{}': {}", key, e);
                yaml.to_string()
            }
        }
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        format!(
            r#"# BoxWrangle User Settings
# This file is loaded automatically on startup.
# Settings specified here override the built-in defaults; most values can
# also be overridden per run on the command line.

# Coefficient applied to each class's production threshold to form the lower
# confidence bound when mining training data
lower_threshold_coefficient: {}

# Normalized y cutoff; detections centred above it are treated as horizon
# artifacts and dropped (0.0 keeps everything)
filter_horizon: {}

# Apex of the top-corner exclusion wedges, normalized y.
# Values <= 0 disable the wedge entirely.
wedge_apex_y: {}

# Normalized padding added around each patch crop
patch_margin: {}

# Exported patch size in pixels
patch_width: {}
patch_height: {}

# Per-frame zoom percentage for transition sequences (0-100, exclusive)
zoom_percent: {}

# Intermediate frames generated per source image
zoom_steps: {}

# Executable used to edit labels
labeler_command: "{}"

# Dataset-browser UI address opened during review sessions
viewer_url: "{}"
"#,
            self.lower_threshold_coefficient,
            self.filter_horizon,
            self.wedge_apex_y,
            self.patch_margin,
            self.patch_width,
            self.patch_height,
            self.zoom_percent,
            self.zoom_steps,
            self.labeler_command,
            self.viewer_url
        )
    }
}
