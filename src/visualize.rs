/// Diagnostic rendering: bounding boxes on images and zoom-transition frames
///
/// Output trees follow the same guard as the copier: a destination that
/// already exists aborts the run before anything is written.
use std::collections::BTreeMap;
use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::file_io;

/// One row of a detection report: photo name, class id and the four corners
/// of the box polygon in normalized coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub photo_name: String,
    pub class_id: usize,
    pub polygon: [(f64, f64); 4],
}

/// Parse a space-separated detection report:
/// `<photo_name> <class_id> <x1> <y1> <x2> <y2> <x3> <y3> <x4> <y4>`.
/// Malformed rows are skipped with a warning, like annotation lines.
pub fn parse_report(path: &Path) -> Result<Vec<ReportRow>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read report {}: {}", path.display(), e))?;

    let mut rows = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_report_row(line) {
            Some(row) => rows.push(row),
            None => warn!(
                "Skipping malformed report row {} in {}: {:?}",
                idx + 1,
                path.display(),
                line
            ),
        }
    }
    Ok(rows)
}

fn parse_report_row(line: &str) -> Option<ReportRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 10 {
        return None;
    }
    let photo_name = fields[0].to_string();
    let class_id: usize = fields[1].parse().ok()?;
    let mut coords = [0.0f64; 8];
    for (i, raw) in fields[2..].iter().enumerate() {
        coords[i] = raw.parse().ok()?;
    }
    Some(ReportRow {
        photo_name,
        class_id,
        polygon: [
            (coords[0], coords[1]),
            (coords[2], coords[3]),
            (coords[4], coords[5]),
            (coords[6], coords[7]),
        ],
    })
}

/// Deterministic per-class color, wrapping over a small palette.
pub fn class_color(class_id: usize) -> Rgb<u8> {
    const PALETTE: [[u8; 3]; 10] = [
        [0, 255, 0],
        [255, 0, 0],
        [0, 128, 255],
        [255, 255, 0],
        [255, 0, 255],
        [0, 255, 255],
        [255, 128, 0],
        [128, 0, 255],
        [0, 255, 128],
        [255, 64, 64],
    ];
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draw a closed polygon given in normalized coordinates, roughly two
/// pixels thick.
pub fn draw_polygon(image: &mut RgbImage, polygon: &[(f64, f64); 4], color: Rgb<u8>) {
    let (width, height) = (image.width() as f64, image.height() as f64);
    let points: Vec<(f32, f32)> = polygon
        .iter()
        .map(|&(x, y)| ((x * width) as f32, (y * height) as f32))
        .collect();

    for i in 0..points.len() {
        let start = points[i];
        let end = points[(i + 1) % points.len()];
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_line_segment_mut(
                image,
                (start.0 + dx, start.1 + dy),
                (end.0 + dx, end.1 + dy),
                color,
            );
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawSummary {
    pub images_written: usize,
    pub boxes_drawn: usize,
}

/// Render every reported box onto a copy of its photo under `dst_root`,
/// color-coded by class. Photos without report rows are skipped.
pub fn draw_boxes_from_report(
    images_root: &Path,
    dst_root: &Path,
    report_path: &Path,
) -> Result<DrawSummary, String> {
    file_io::require_dir(images_root, "Images root")?;
    if dst_root.exists() {
        return Err(format!(
            "Destination directory already exists: {}",
            dst_root.display()
        ));
    }

    let rows = parse_report(report_path)?;
    let mut by_photo: BTreeMap<&str, Vec<&ReportRow>> = BTreeMap::new();
    for row in &rows {
        by_photo.entry(row.photo_name.as_str()).or_default().push(row);
    }
    info!("Report lists {} photos with boxes", by_photo.len());

    std::fs::create_dir_all(dst_root)
        .map_err(|e| format!("Failed to create {}: {}", dst_root.display(), e))?;

    let mut summary = DrawSummary::default();
    for image_path in file_io::get_image_paths_recursive(images_root) {
        let photo_name = image_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(photo_rows) = by_photo.get(photo_name.as_str()) else {
            continue;
        };

        let mut image = file_io::load_image_oriented(&image_path)?.to_rgb8();
        for row in photo_rows {
            draw_polygon(&mut image, &row.polygon, class_color(row.class_id));
            summary.boxes_drawn += 1;
        }

        let dst_path = dst_root.join(&photo_name);
        image
            .save(&dst_path)
            .map_err(|e| format!("Failed to write {}: {}", dst_path.display(), e))?;
        summary.images_written += 1;
    }

    info!(
        "Drew {} boxes across {} images into {}",
        summary.boxes_drawn,
        summary.images_written,
        dst_root.display()
    );
    Ok(summary)
}

fn scale_image(image: &DynamicImage, factor: f64) -> DynamicImage {
    let width = ((image.width() as f64 * factor) as u32).max(1);
    let height = ((image.height() as f64 * factor) as u32).max(1);
    image.resize_exact(width, height, image::imageops::FilterType::Triangle)
}

/// Center crop around a configurable vertical centre. Cropping never leaves
/// the image; a centre near the edges slides the window back inside.
fn crop_for_centre(image: &DynamicImage, dim: (u32, u32), y_centre: f64) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let crop_width = dim.0.min(width);
    let crop_height = dim.1.min(height);

    let min_x = (width as f64 / 2.0 - crop_width as f64 / 2.0).max(0.0) as u32;

    let mut min_y = (height as f64 * y_centre - crop_height as f64 / 2.0) as i64;
    if min_y < 0 {
        min_y = 0;
    }
    let mut max_y = min_y + crop_height as i64;
    if max_y > height as i64 {
        max_y = height as i64;
        min_y = max_y - crop_height as i64;
    }

    image.crop_imm(min_x, min_y.max(0) as u32, crop_width, crop_height)
}

/// Return an image the same size as the input that has been resized and
/// center-cropped, so features appear roughly `100 - zoom_pcnt` percent
/// larger. Features near the edges fall away.
pub fn zoom_image(image: &DynamicImage, zoom_pcnt: f64, y_centre: f64) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let factor = 100.0 / zoom_pcnt;
    let scaled = scale_image(image, factor);
    crop_for_centre(&scaled, (width, height), y_centre)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoomSequenceSummary {
    pub source_images: usize,
    pub frames_written: usize,
}

/// For every image under `img_root`, write the frame plus `steps`
/// progressively zoomed intermediates as a numbered sequence in `dst_dir`.
/// Frames are downscaled for a manageable output size; an external encoder
/// turns the sequence into a video.
pub fn write_zoom_sequence(
    img_root: &Path,
    dst_dir: &Path,
    zoom_pcnt: f64,
    steps: u32,
    y_centre: f64,
) -> Result<ZoomSequenceSummary, String> {
    file_io::require_dir(img_root, "Images root")?;
    if dst_dir.exists() {
        return Err(format!(
            "Destination directory already exists: {}",
            dst_dir.display()
        ));
    }
    if zoom_pcnt <= 0.0 || zoom_pcnt >= 100.0 {
        return Err(format!(
            "Zoom percentage must be in (0, 100), got {}",
            zoom_pcnt
        ));
    }

    std::fs::create_dir_all(dst_dir)
        .map_err(|e| format!("Failed to create {}: {}", dst_dir.display(), e))?;

    // Output frames shrink to 30% so long sequences stay manageable.
    const FRAME_SCALE: f64 = 0.3;

    let mut summary = ZoomSequenceSummary::default();
    let mut frame_index = 0usize;
    for image_path in file_io::get_image_paths_recursive(img_root) {
        let mut image = file_io::load_image_oriented(&image_path)?;
        summary.source_images += 1;

        write_frame(dst_dir, frame_index, &scale_image(&image, FRAME_SCALE))?;
        frame_index += 1;
        summary.frames_written += 1;

        for _ in 0..steps {
            image = zoom_image(&image, zoom_pcnt, y_centre);
            write_frame(dst_dir, frame_index, &scale_image(&image, FRAME_SCALE))?;
            frame_index += 1;
            summary.frames_written += 1;
        }
    }

    info!(
        "Wrote {} frames from {} images into {}",
        summary.frames_written,
        summary.source_images,
        dst_dir.display()
    );
    Ok(summary)
}

fn write_frame(dst_dir: &Path, index: usize, frame: &DynamicImage) -> Result<(), String> {
    let path = dst_dir.join(format!("frame_{:06}.jpg", index));
    image::DynamicImage::ImageRgb8(frame.to_rgb8())
        .save(&path)
        .map_err(|e| format!("Failed to write frame {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_skips_malformed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(
            &path,
            "p1.jpg 0 0.1 0.1 0.2 0.1 0.2 0.2 0.1 0.2\n\
             broken row\n\
             p2.jpg 3 0.4 0.4 0.6 0.4 0.6 0.6 0.4 0.6\n",
        )
        .unwrap();

        let rows = parse_report(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].photo_name, "p1.jpg");
        assert_eq!(rows[1].class_id, 3);
        assert_eq!(rows[1].polygon[2], (0.6, 0.6));
    }

    #[test]
    fn test_class_color_wraps() {
        assert_eq!(class_color(0), class_color(10));
        assert_ne!(class_color(0), class_color(1));
    }

    #[test]
    fn test_draw_polygon_touches_edge_pixels() {
        let mut image = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let polygon = [(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)];
        draw_polygon(&mut image, &polygon, Rgb([0, 255, 0]));
        // Top edge runs along y = 10.
        assert_eq!(*image.get_pixel(50, 10), Rgb([0, 255, 0]));
        // Interior stays untouched.
        assert_eq!(*image.get_pixel(50, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_zoom_image_keeps_dimensions_and_enlarges_centre() {
        // White 20x20 square centred in a black 100x100 image.
        let mut img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        for y in 40..60 {
            for x in 40..60 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let zoomed = zoom_image(&DynamicImage::ImageRgb8(img), 50.0, 0.5);
        assert_eq!((zoomed.width(), zoomed.height()), (100, 100));
        // At 2x the square spans roughly 30..70; this pixel was black before.
        let px = zoomed.to_rgb8().get_pixel(35, 50).0;
        assert!(px[0] > 128, "expected zoomed-in white, got {:?}", px);
    }

    #[test]
    fn test_zoom_respects_off_centre_vertical_focus() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([7, 7, 7])));
        // A centre near the top must not push the crop window out of bounds.
        let zoomed = zoom_image(&img, 90.0, 0.05);
        assert_eq!((zoomed.width(), zoomed.height()), (80, 60));
    }

    #[test]
    fn test_draw_boxes_refuses_existing_destination() {
        let images = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let report = images.path().join("report.txt");
        std::fs::write(&report, "").unwrap();

        let err = draw_boxes_from_report(images.path(), dst.path(), &report).unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[test]
    fn test_draw_boxes_writes_annotated_copies() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        std::fs::create_dir(&images).unwrap();
        let img = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        img.save(images.join("scene.png")).unwrap();

        let report = root.path().join("report.txt");
        std::fs::write(&report, "scene.png 0 0.2 0.2 0.8 0.2 0.8 0.8 0.2 0.8\nother.png 1 0 0 1 0 1 1 0 1\n")
            .unwrap();

        let dst = root.path().join("annotated");
        let summary = draw_boxes_from_report(&images, &dst, &report).unwrap();
        assert_eq!(summary.images_written, 1);
        assert_eq!(summary.boxes_drawn, 1);

        let out = image::open(dst.join("scene.png")).unwrap().to_rgb8();
        assert_eq!(*out.get_pixel(25, 10), class_color(0));
    }

    #[test]
    fn test_zoom_sequence_writes_expected_frame_count() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("stills");
        std::fs::create_dir(&images).unwrap();
        let img = RgbImage::from_pixel(60, 40, Rgb([9, 9, 9]));
        img.save(images.join("a.png")).unwrap();
        img.save(images.join("b.png")).unwrap();

        let dst = root.path().join("frames");
        let summary = write_zoom_sequence(&images, &dst, 99.5, 3, 0.5).unwrap();
        assert_eq!(summary.source_images, 2);
        assert_eq!(summary.frames_written, 8);
        assert!(dst.join("frame_000000.jpg").exists());
        assert!(dst.join("frame_000007.jpg").exists());
    }

    #[test]
    fn test_zoom_sequence_validates_percentage() {
        let images = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let dst = root.path().join("frames");
        assert!(write_zoom_sequence(images.path(), &dst, 100.0, 2, 0.5).is_err());
        assert!(write_zoom_sequence(images.path(), &dst, 0.0, 2, 0.5).is_err());
    }
}
