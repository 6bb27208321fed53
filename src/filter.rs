/// Geometric and confidence filtering of detections
///
/// The filter decides which detections from a model run qualify as training
/// data: a per-class confidence band, a horizon cutoff, a configurable
/// exclusion wedge anchored at the top image corners, and a per-file rule
/// for images containing nothing but excluded classes.
use std::collections::{HashMap, HashSet};

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::annotations::Detection;

/// Filter parameters, immutable per run.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Keep detections with `confidence >= class_threshold * lower`.
    pub lower_threshold_coefficient: f64,
    /// When set, also drop detections with `confidence > class_threshold * upper`.
    /// Used to mine hard mid-confidence examples instead of easy ones.
    pub upper_threshold_coefficient: Option<f64>,
    /// Drop detections whose center is above this normalized y value.
    pub horizon_y: f64,
    /// Apex of the top-corner exclusion wedges, normalized y. The wedge rule
    /// is experimental; an apex <= 0 disables it entirely.
    pub wedge_apex_y: f64,
    /// Classes that cannot carry an image on their own: a file whose
    /// surviving detections all belong to this set keeps nothing.
    pub excluded_class_ids: HashSet<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lower_threshold_coefficient: 0.7,
            upper_threshold_coefficient: None,
            horizon_y: 0.0,
            wedge_apex_y: -0.2,
            excluded_class_ids: HashSet::new(),
        }
    }
}

/// Wedge membership test: the point is inside the triangular dead-zone when
/// it lies above the line running from the top-left corner `(0,0)` or the
/// top-right corner `(1,0)` to the apex `(0.5, apex_y)`. In image
/// coordinates "above" means smaller y.
fn in_corner_wedge(x: f64, y: f64, apex_y: f64) -> bool {
    if apex_y <= 0.0 {
        // Both lines run along or above the top edge; the wedge is empty.
        return false;
    }
    let line_y = if x <= 0.5 {
        2.0 * apex_y * x
    } else {
        2.0 * apex_y * (1.0 - x)
    };
    y < line_y
}

fn passes_confidence_band(
    detection: &Detection,
    config: &FilterConfig,
    thresholds: &HashMap<usize, f64>,
) -> bool {
    let confidence = match detection.confidence {
        Some(c) => c,
        // Ground-truth files carry no confidence column; never drop those.
        None => return true,
    };
    let threshold = match thresholds.get(&detection.class_id) {
        Some(&t) => t,
        None => {
            debug!(
                "No production threshold for class {}; keeping detection",
                detection.class_id
            );
            return true;
        }
    };

    if confidence < threshold * config.lower_threshold_coefficient {
        return false;
    }
    if let Some(upper) = config.upper_threshold_coefficient {
        if confidence > threshold * upper {
            return false;
        }
    }
    true
}

fn passes_geometry(detection: &Detection, config: &FilterConfig) -> bool {
    if detection.y_center < config.horizon_y {
        return false;
    }
    if in_corner_wedge(detection.x_center, detection.y_center, config.wedge_apex_y) {
        return false;
    }
    true
}

/// Apply the filter to one image's detections, preserving file line order
/// among survivors.
///
/// The per-detection rules (confidence band, horizon, wedge) run first. The
/// excluded-class rule then applies per file: if at least one survivor has a
/// non-excluded class the file is kept in full, excluded-class boxes
/// included; if every survivor's class is excluded, nothing survives.
pub fn filter_detections(
    detections: &[Detection],
    config: &FilterConfig,
    thresholds: &HashMap<usize, f64>,
) -> Vec<Detection> {
    let survivors: Vec<Detection> = detections
        .iter()
        .filter(|d| passes_confidence_band(d, config, thresholds))
        .filter(|d| passes_geometry(d, config))
        .cloned()
        .collect();

    if !config.excluded_class_ids.is_empty()
        && !survivors.is_empty()
        && survivors
            .iter()
            .all(|d| config.excluded_class_ids.contains(&d.class_id))
    {
        return Vec::new();
    }
    survivors
}
