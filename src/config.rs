use once_cell::sync::Lazy;
use crate::settings::UserSettings;

// Default values for configuration
// These serve as fallback values and can be used for "reset to defaults" functionality
pub const DEFAULT_LOWER_THRESHOLD_COEFFICIENT: f64 = 0.7;
pub const DEFAULT_FILTER_HORIZON: f64 = 0.0;
pub const DEFAULT_WEDGE_APEX_Y: f64 = -0.2;
pub const DEFAULT_PATCH_MARGIN: f64 = 0.01;
pub const DEFAULT_PATCH_WIDTH: u32 = 200;
pub const DEFAULT_PATCH_HEIGHT: u32 = 200;
pub const DEFAULT_ZOOM_PERCENT: f64 = 99.5;
pub const DEFAULT_ZOOM_STEPS: u32 = 20;

pub struct Config {
    pub lower_threshold_coefficient: f64,   // Lower confidence band coefficient for mining
    pub filter_horizon: f64,                // Normalized y cutoff for horizon filtering
    pub wedge_apex_y: f64,                  // Corner wedge apex (<= 0 disables)
    pub patch_margin: f64,                  // Normalized padding around patch crops
    pub patch_width: u32,                   // Exported patch width in pixels
    pub patch_height: u32,                  // Exported patch height in pixels
    pub zoom_percent: f64,                  // Per-frame zoom for transition sequences
    pub zoom_steps: u32,                    // Intermediate frames per source image
    pub labeler_command: String,            // Executable used to edit labels
    pub viewer_url: String,                 // Dataset-browser UI address
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    // Load settings from YAML file
    let settings = UserSettings::load(None);

    Config {
        lower_threshold_coefficient: settings.lower_threshold_coefficient,
        filter_horizon: settings.filter_horizon,
        wedge_apex_y: settings.wedge_apex_y,
        patch_margin: settings.patch_margin,
        patch_width: settings.patch_width,
        patch_height: settings.patch_height,
        zoom_percent: settings.zoom_percent,
        zoom_steps: settings.zoom_steps,
        labeler_command: settings.labeler_command,
        viewer_url: settings.viewer_url,
    }
});
