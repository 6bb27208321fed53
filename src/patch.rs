/// Patch regions and patch export
///
/// A patch is a padded crop around one detection. Padding extends the box a
/// little to collect context without leaving the image; the pixel-space
/// region is always clipped to the image bounds. Exported crops feed the
/// external feature extractor; no embedding math happens here.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::annotations::{AnnotationFile, Detection};
use crate::file_io;

/// Pixel-space crop rectangle, clipped to `[0, width] x [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PatchRegion {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// A patch that clipped down to zero width or height. Callers must skip
    /// these and never hand them to downstream feature computation.
    pub fn is_empty(&self) -> bool {
        self.x1 == self.x2 || self.y1 == self.y2
    }
}

/// Compute the padded, clipped pixel region for one detection.
///
/// `x1 = clip(round((x_center - width/2 - margin) * image_width), 0, image_width)`,
/// symmetric for the other three edges. Holds `0 <= x1 <= x2 <= image_width`
/// and `0 <= y1 <= y2 <= image_height` for any input box, including boxes
/// fully outside [0,1] after padding. Pure function, no I/O.
pub fn extract_patch_region(
    detection: &Detection,
    image_width: u32,
    image_height: u32,
    margin: f64,
) -> PatchRegion {
    let w = image_width as f64;
    let h = image_height as f64;

    let clip = |value: f64, max: f64| value.round().clamp(0.0, max) as u32;

    let x1 = clip((detection.x_center - detection.width / 2.0 - margin) * w, w);
    let x2 = clip((detection.x_center + detection.width / 2.0 + margin) * w, w);
    let y1 = clip((detection.y_center - detection.height / 2.0 - margin) * h, h);
    let y2 = clip((detection.y_center + detection.height / 2.0 + margin) * h, h);

    PatchRegion {
        x1,
        y1,
        x2: x2.max(x1),
        y2: y2.max(y1),
    }
}

/// Options for batch patch export.
#[derive(Debug, Clone)]
pub struct PatchExportOptions {
    pub margin: f64,
    pub patch_width: u32,
    pub patch_height: u32,
    /// Restrict to these class ids; `None` exports every class.
    pub class_ids: Option<HashSet<usize>>,
    /// Cap on the number of annotation files visited.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchExportSummary {
    pub files_processed: usize,
    pub patches_written: usize,
    pub empty_skipped: usize,
    pub images_missing: usize,
    pub lines_skipped: usize,
}

impl PatchExportSummary {
    fn merge(mut self, other: Self) -> Self {
        self.files_processed += other.files_processed;
        self.patches_written += other.patches_written;
        self.empty_skipped += other.empty_skipped;
        self.images_missing += other.images_missing;
        self.lines_skipped += other.lines_skipped;
        self
    }
}

/// Walk an annotation directory and write one resized crop per qualifying
/// detection to `dst_dir`, named `<image_stem>_<seq>.jpg`.
///
/// The annotations directory defaults to the recognized folder search under
/// `images_root`. Fails fast when the destination already exists.
pub fn export_patches(
    images_root: &Path,
    annotations_dir: Option<&Path>,
    dst_dir: &Path,
    options: &PatchExportOptions,
) -> Result<PatchExportSummary, String> {
    file_io::require_dir(images_root, "Images root")?;
    let annotations_dir = match annotations_dir {
        Some(dir) => {
            file_io::require_dir(dir, "Annotations directory")?;
            dir.to_path_buf()
        }
        None => file_io::find_annotations_dir(images_root),
    };

    if dst_dir.exists() {
        return Err(format!(
            "Destination directory already exists: {}",
            dst_dir.display()
        ));
    }

    let mut annotation_paths = file_io::get_annotation_paths(&annotations_dir)?;
    if annotation_paths.is_empty() {
        warn!("No annotation files found in {}", annotations_dir.display());
    }
    if let Some(limit) = options.limit {
        annotation_paths.truncate(limit);
    }

    std::fs::create_dir_all(dst_dir)
        .map_err(|e| format!("Failed to create {}: {}", dst_dir.display(), e))?;

    let summary = annotation_paths
        .par_iter()
        .map(|path| export_patches_for_file(path, images_root, dst_dir, options))
        .reduce(PatchExportSummary::default, PatchExportSummary::merge);

    info!(
        "Exported {} patches from {} annotation files ({} empty skipped, {} images missing)",
        summary.patches_written,
        summary.files_processed,
        summary.empty_skipped,
        summary.images_missing
    );
    Ok(summary)
}

fn export_patches_for_file(
    annotation_path: &PathBuf,
    images_root: &Path,
    dst_dir: &Path,
    options: &PatchExportOptions,
) -> PatchExportSummary {
    let mut summary = PatchExportSummary::default();

    let file = match AnnotationFile::load(annotation_path) {
        Ok(file) => file,
        Err(e) => {
            warn!("{}", e);
            return summary;
        }
    };
    summary.files_processed = 1;
    summary.lines_skipped = file.skipped_lines;

    let image_path = match file_io::find_image_for_stem(images_root, &file.stem) {
        Some(path) => path,
        None => {
            summary.images_missing = 1;
            debug!("No image found for annotation stem {:?}", file.stem);
            return summary;
        }
    };

    let image = match file_io::load_image_oriented(&image_path) {
        Ok(image) => image,
        Err(e) => {
            warn!("{}", e);
            summary.images_missing = 1;
            return summary;
        }
    };
    let (img_w, img_h) = (image.width(), image.height());

    for (seq, detection) in file.detections.iter().enumerate() {
        if let Some(class_ids) = &options.class_ids {
            if !class_ids.contains(&detection.class_id) {
                continue;
            }
        }

        let region = extract_patch_region(detection, img_w, img_h, options.margin);
        if region.is_empty() {
            summary.empty_skipped += 1;
            debug!(
                "Skipping empty patch {}_{} ({}x{})",
                file.stem,
                seq,
                region.width(),
                region.height()
            );
            continue;
        }

        let crop = image
            .crop_imm(region.x1, region.y1, region.width(), region.height())
            .resize_exact(
                options.patch_width,
                options.patch_height,
                image::imageops::FilterType::Triangle,
            );

        let dst_path = dst_dir.join(format!("{}_{}.jpg", file.stem, seq));
        match image::DynamicImage::ImageRgb8(crop.to_rgb8()).save(&dst_path) {
            Ok(()) => summary.patches_written += 1,
            Err(e) => warn!("Failed to write patch {}: {}", dst_path.display(), e),
        }
    }

    summary
}
