/// Training-data mining pipeline
///
/// Selectively copies images and filtered annotations out of a detection
/// run: load the per-class production thresholds, walk the annotations
/// directory, filter each file, then copy the survivors (and optionally
/// every hit-free image as a hard negative) to a fresh destination.
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::annotations::AnnotationFile;
use crate::classes::ClassList;
use crate::copier::{self, CopySummary};
use crate::file_io;
use crate::filter::{filter_detections, FilterConfig};
use crate::utils::timing::{ScopedTimer, TimingStats};

#[derive(Debug, Clone, Copy, Default)]
pub struct MineSummary {
    pub files_scanned: usize,
    pub files_with_survivors: usize,
    pub detections_total: usize,
    pub detections_kept: usize,
    pub lines_skipped: usize,
    pub copy: CopySummary,
}

/// Run the whole pipeline. `dst_dir` must not exist yet; the copier enforces
/// that before anything is written.
pub fn extract_training_data(
    src_images_dir: &Path,
    annotations_dir: &Path,
    dst_dir: &Path,
    classes_path: &Path,
    config: &FilterConfig,
    copy_all: bool,
) -> Result<MineSummary, String> {
    file_io::require_dir(src_images_dir, "Source images directory")?;
    file_io::require_dir(annotations_dir, "Annotations directory")?;
    let class_list = ClassList::from_file(classes_path)?;
    let thresholds = class_list.thresholds();

    info!(
        "Mining {} with lower coefficient {}, horizon {}, wedge apex {}",
        annotations_dir.display(),
        config.lower_threshold_coefficient,
        config.horizon_y,
        config.wedge_apex_y
    );

    let mut summary = MineSummary::default();
    let mut survivors = BTreeMap::new();
    let mut classes_without_threshold: HashSet<usize> = HashSet::new();
    let mut filter_stats = TimingStats::new("Filter annotations");

    for annotation_path in file_io::get_annotation_paths(annotations_dir)? {
        let file = match AnnotationFile::load(&annotation_path) {
            Ok(file) => file,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        summary.files_scanned += 1;
        summary.detections_total += file.detections.len();
        summary.lines_skipped += file.skipped_lines;

        for detection in &file.detections {
            if detection.confidence.is_some() && !thresholds.contains_key(&detection.class_id) {
                classes_without_threshold.insert(detection.class_id);
            }
        }

        let kept = {
            let _timer = ScopedTimer::new(&mut filter_stats);
            filter_detections(&file.detections, config, &thresholds)
        };
        summary.detections_kept += kept.len();
        if !kept.is_empty() {
            summary.files_with_survivors += 1;
            survivors.insert(file.stem, kept);
        }
    }

    if !classes_without_threshold.is_empty() {
        let mut ids: Vec<usize> = classes_without_threshold.into_iter().collect();
        ids.sort_unstable();
        warn!(
            "No production threshold in {} for class ids {:?}; their detections were kept",
            classes_path.display(),
            ids
        );
    }

    filter_stats.log_summary();
    info!(
        "Kept {}/{} detections across {}/{} files ({} malformed lines skipped)",
        summary.detections_kept,
        summary.detections_total,
        summary.files_with_survivors,
        summary.files_scanned,
        summary.lines_skipped
    );

    summary.copy = copier::copy_filtered(&survivors, src_images_dir, dst_dir, copy_all)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSES: &str = r#"{
        "0": {"name": "WS", "threshold": 0.5},
        "1": {"name": "CD", "threshold": 0.4}
    }"#;

    struct Fixture {
        _root: tempfile::TempDir,
        images: std::path::PathBuf,
        annotations: std::path::PathBuf,
        classes: std::path::PathBuf,
        dst: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        let annotations = root.path().join("annotations");
        std::fs::create_dir(&images).unwrap();
        std::fs::create_dir(&annotations).unwrap();
        let classes = root.path().join("classes.json");
        std::fs::write(&classes, CLASSES).unwrap();
        let dst = root.path().join("mined");
        Fixture {
            images,
            annotations,
            classes,
            dst,
            _root: root,
        }
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let fx = fixture();
        std::fs::write(fx.images.join("a.jpg"), b"img").unwrap();
        std::fs::write(fx.images.join("b.jpg"), b"img").unwrap();
        // a: one confident hit and one below the band (0.5 * 0.7 = 0.35).
        std::fs::write(fx.annotations.join("a.txt"), "0 0.5 0.5 0.1 0.1 0.9\n0 0.5 0.5 0.1 0.1 0.1\n")
            .unwrap();
        // b: nothing above the band.
        std::fs::write(fx.annotations.join("b.txt"), "1 0.5 0.5 0.1 0.1 0.05\n").unwrap();

        let summary = extract_training_data(
            &fx.images,
            &fx.annotations,
            &fx.dst,
            &fx.classes,
            &FilterConfig::default(),
            false,
        )
        .unwrap();

        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.detections_total, 3);
        assert_eq!(summary.detections_kept, 1);
        assert_eq!(summary.copy.images_copied, 1);
        assert!(fx.dst.join("a.jpg").exists());
        assert!(!fx.dst.join("b.jpg").exists());
        let written = std::fs::read_to_string(fx.dst.join("YOLO_darknet/a.txt")).unwrap();
        assert_eq!(written, "0 0.5 0.5 0.1 0.1 0.9\n");
    }

    #[test]
    fn test_copy_all_brings_hit_free_images() {
        let fx = fixture();
        std::fs::write(fx.images.join("hit.jpg"), b"img").unwrap();
        std::fs::write(fx.images.join("empty.jpg"), b"img").unwrap();
        std::fs::write(fx.annotations.join("hit.txt"), "0 0.5 0.5 0.1 0.1 0.9\n").unwrap();

        let summary = extract_training_data(
            &fx.images,
            &fx.annotations,
            &fx.dst,
            &fx.classes,
            &FilterConfig::default(),
            true,
        )
        .unwrap();

        assert_eq!(summary.copy.negatives_copied, 1);
        assert!(fx.dst.join("empty.jpg").exists());
        assert!(!fx.dst.join("YOLO_darknet/empty.txt").exists());
    }

    #[test]
    fn test_missing_annotations_dir_fails_fast() {
        let fx = fixture();
        let missing = fx.annotations.join("nope");
        let err = extract_training_data(
            &fx.images,
            &missing,
            &fx.dst,
            &fx.classes,
            &FilterConfig::default(),
            false,
        )
        .unwrap_err();
        assert!(err.contains("nope"));
        assert!(!fx.dst.exists());
    }
}
