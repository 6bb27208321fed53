/// Copying curated images and annotations to a fresh dataset directory
///
/// The destination must not exist yet: refusing to merge into a previous
/// extraction is the guard against silently mixing two runs.
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::annotations::{write_annotation_file, AnnotationFile, Detection};
use crate::file_io;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub images_copied: usize,
    pub annotations_written: usize,
    pub negatives_copied: usize,
}

/// Copy each image with surviving detections to `dst_dir` and write its
/// filtered annotation file under the destination annotations folder.
///
/// With `copy_all`, every image in `src_images_dir` without survivors is
/// also copied, without an annotation file, as a hard negative.
pub fn copy_filtered(
    survivors: &BTreeMap<String, Vec<Detection>>,
    src_images_dir: &Path,
    dst_dir: &Path,
    copy_all: bool,
) -> Result<CopySummary, String> {
    file_io::require_dir(src_images_dir, "Source images directory")?;
    if dst_dir.exists() {
        return Err(format!(
            "Destination directory already exists: {}",
            dst_dir.display()
        ));
    }

    let dst_annotations_dir = dst_dir.join(file_io::ANNOTATIONS_OUTPUT_FOLDER);
    std::fs::create_dir_all(&dst_annotations_dir)
        .map_err(|e| format!("Failed to create {}: {}", dst_annotations_dir.display(), e))?;

    let mut summary = CopySummary::default();
    for (stem, detections) in survivors {
        let image_path = match file_io::find_image_for_stem(src_images_dir, stem) {
            Some(path) => path,
            None => {
                warn!("No image found for stem {:?}; skipping", stem);
                continue;
            }
        };

        let image_name = image_path.file_name().unwrap_or_default();
        std::fs::copy(&image_path, dst_dir.join(image_name))
            .map_err(|e| format!("Failed to copy {}: {}", image_path.display(), e))?;
        summary.images_copied += 1;

        let annotation_path = dst_annotations_dir.join(format!("{}.txt", stem));
        write_annotation_file(&annotation_path, detections)
            .map_err(|e| format!("Failed to write {}: {}", annotation_path.display(), e))?;
        summary.annotations_written += 1;
    }

    if copy_all {
        for image_path in file_io::get_image_paths(src_images_dir) {
            let stem = image_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if survivors.contains_key(&stem) {
                continue;
            }
            let image_name = image_path.file_name().unwrap_or_default();
            std::fs::copy(&image_path, dst_dir.join(image_name))
                .map_err(|e| format!("Failed to copy {}: {}", image_path.display(), e))?;
            summary.negatives_copied += 1;
        }
    }

    info!(
        "Copied {} images and {} annotation files to {} ({} hard negatives)",
        summary.images_copied,
        summary.annotations_written,
        dst_dir.display(),
        summary.negatives_copied
    );
    Ok(summary)
}

/// Copy image + annotation pairs containing at least one detection of a
/// priority class, up to an optional sample size. Annotation files are
/// copied verbatim. Useful when a few classes need attention first.
pub fn sample_by_classes(
    classes: &HashSet<usize>,
    src_images_dir: &Path,
    dst_images_dir: &Path,
    sample_size: Option<usize>,
) -> Result<CopySummary, String> {
    file_io::require_dir(src_images_dir, "Source images directory")?;
    if dst_images_dir.exists() {
        return Err(format!(
            "Destination directory already exists: {}",
            dst_images_dir.display()
        ));
    }

    let src_annotations_dir = file_io::find_annotations_dir(src_images_dir);
    let mut hits = Vec::new();
    for annotation_path in file_io::get_annotation_paths(&src_annotations_dir)? {
        let file = match AnnotationFile::load(&annotation_path) {
            Ok(file) => file,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        if file
            .detections
            .iter()
            .any(|d| classes.contains(&d.class_id))
        {
            hits.push(file.stem);
        }
    }

    if let Some(limit) = sample_size {
        hits.truncate(limit);
    }

    let dst_annotations_dir = dst_images_dir.join(file_io::ANNOTATIONS_OUTPUT_FOLDER);
    std::fs::create_dir_all(&dst_annotations_dir)
        .map_err(|e| format!("Failed to create {}: {}", dst_annotations_dir.display(), e))?;

    let mut summary = CopySummary::default();
    for stem in &hits {
        let src_annotation = src_annotations_dir.join(format!("{}.txt", stem));
        std::fs::copy(&src_annotation, dst_annotations_dir.join(format!("{}.txt", stem)))
            .map_err(|e| format!("Failed to copy {}: {}", src_annotation.display(), e))?;
        summary.annotations_written += 1;

        let image_path = match file_io::find_image_for_stem(src_images_dir, stem) {
            Some(path) => path,
            None => {
                warn!("No image found for stem {:?}; annotation copied anyway", stem);
                continue;
            }
        };
        let image_name = image_path.file_name().unwrap_or_default();
        std::fs::copy(&image_path, dst_images_dir.join(image_name))
            .map_err(|e| format!("Failed to copy {}: {}", image_path.display(), e))?;
        summary.images_copied += 1;
    }

    info!(
        "Sampled {} images for classes {:?} into {}",
        summary.images_copied,
        classes,
        dst_images_dir.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::parse_line;

    fn write_image(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"not really a jpeg").unwrap();
    }

    fn survivors_for(stem: &str, lines: &[&str]) -> BTreeMap<String, Vec<Detection>> {
        let detections = lines.iter().map(|l| parse_line(l).unwrap()).collect();
        BTreeMap::from([(stem.to_string(), detections)])
    }

    #[test]
    fn test_copy_filtered_writes_images_and_annotations() {
        let src = tempfile::tempdir().unwrap();
        write_image(src.path(), "img_a.jpg");
        let root = tempfile::tempdir().unwrap();
        let dst = root.path().join("extraction");

        let survivors = survivors_for("img_a", &["0 0.5 0.5 0.1 0.1 0.9"]);
        let summary = copy_filtered(&survivors, src.path(), &dst, false).unwrap();

        assert_eq!(summary.images_copied, 1);
        assert_eq!(summary.annotations_written, 1);
        assert!(dst.join("img_a.jpg").exists());
        let written =
            std::fs::read_to_string(dst.join("YOLO_darknet").join("img_a.txt")).unwrap();
        assert_eq!(written, "0 0.5 0.5 0.1 0.1 0.9\n");
    }

    #[test]
    fn test_copy_filtered_refuses_existing_destination() {
        let src = tempfile::tempdir().unwrap();
        write_image(src.path(), "img_a.jpg");
        let dst = tempfile::tempdir().unwrap();

        let survivors = survivors_for("img_a", &["0 0.5 0.5 0.1 0.1 0.9"]);
        let err = copy_filtered(&survivors, src.path(), dst.path(), false).unwrap_err();
        assert!(err.contains("already exists"));
        // Nothing was written into the pre-existing directory.
        assert_eq!(std::fs::read_dir(dst.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_all_includes_hard_negatives_without_annotations() {
        let src = tempfile::tempdir().unwrap();
        write_image(src.path(), "hit.jpg");
        write_image(src.path(), "background.jpg");
        let root = tempfile::tempdir().unwrap();
        let dst = root.path().join("out");

        let survivors = survivors_for("hit", &["1 0.4 0.6 0.2 0.2 0.8"]);
        let summary = copy_filtered(&survivors, src.path(), &dst, true).unwrap();

        assert_eq!(summary.images_copied, 1);
        assert_eq!(summary.negatives_copied, 1);
        assert!(dst.join("background.jpg").exists());
        assert!(!dst.join("YOLO_darknet").join("background.txt").exists());
    }

    #[test]
    fn test_sample_by_classes_copies_hits_verbatim() {
        let src = tempfile::tempdir().unwrap();
        let labels = src.path().join("YOLO_darknet");
        std::fs::create_dir(&labels).unwrap();
        write_image(src.path(), "one.jpg");
        write_image(src.path(), "two.jpg");
        std::fs::write(labels.join("one.txt"), "3 0.5 0.5 0.1 0.1\n").unwrap();
        std::fs::write(labels.join("two.txt"), "7 0.5 0.5 0.1 0.1\n").unwrap();

        let root = tempfile::tempdir().unwrap();
        let dst = root.path().join("sampled");
        let summary =
            sample_by_classes(&HashSet::from([3]), src.path(), &dst, None).unwrap();

        assert_eq!(summary.images_copied, 1);
        assert!(dst.join("one.jpg").exists());
        assert!(!dst.join("two.jpg").exists());
        let copied = std::fs::read_to_string(dst.join("YOLO_darknet").join("one.txt")).unwrap();
        assert_eq!(copied, "3 0.5 0.5 0.1 0.1\n");
    }

    #[test]
    fn test_sample_by_classes_respects_sample_size() {
        let src = tempfile::tempdir().unwrap();
        let labels = src.path().join("labels");
        std::fs::create_dir(&labels).unwrap();
        for i in 0..5 {
            write_image(src.path(), &format!("img_{}.jpg", i));
            std::fs::write(labels.join(format!("img_{}.txt", i)), "2 0.5 0.5 0.1 0.1\n").unwrap();
        }

        let root = tempfile::tempdir().unwrap();
        let dst = root.path().join("sampled");
        let summary =
            sample_by_classes(&HashSet::from([2]), src.path(), &dst, Some(2)).unwrap();
        assert_eq!(summary.images_copied, 2);
    }
}
