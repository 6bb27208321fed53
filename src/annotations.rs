/// YOLO darknet annotation files
///
/// One file per image, named `<image_stem>.txt`, one detection per line:
/// `<class_id> <x_center> <y_center> <width> <height> [<confidence>]`
/// with geometry normalized to [0,1]. Files are read-only to this tool;
/// filtered copies are written to new locations, never mutated in place.
use std::path::Path;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

/// One labeled or predicted bounding box.
///
/// `x_center ± width/2` may stick out of [0,1]; downstream consumers clip,
/// the parser does not reject.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: Option<f64>,
    /// Verbatim source line, so filtered files round-trip byte-identically.
    source_line: String,
}

impl Detection {
    #[allow(dead_code)]
    pub fn new(
        class_id: usize,
        x_center: f64,
        y_center: f64,
        width: f64,
        height: f64,
        confidence: Option<f64>,
    ) -> Self {
        let source_line = match confidence {
            Some(conf) => format!(
                "{} {} {} {} {} {}",
                class_id, x_center, y_center, width, height, conf
            ),
            None => format!("{} {} {} {} {}", class_id, x_center, y_center, width, height),
        };
        Self {
            class_id,
            x_center,
            y_center,
            width,
            height,
            confidence,
            source_line,
        }
    }

    /// The line this detection was read from (or synthesized as), without
    /// a trailing newline.
    pub fn source_line(&self) -> &str {
        &self.source_line
    }

    /// Top-left-corner box `[x, y, w, h]`, still normalized. This is the
    /// layout the dataset-browser framework expects.
    pub fn corner_box(&self) -> [f64; 4] {
        [
            self.x_center - self.width / 2.0,
            self.y_center - self.height / 2.0,
            self.width,
            self.height,
        ]
    }
}

/// Parse a single annotation line. Returns `None` for malformed lines
/// (wrong field count or non-numeric values).
pub fn parse_line(line: &str) -> Option<Detection> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 && fields.len() != 6 {
        return None;
    }

    let class_id: usize = fields[0].parse().ok()?;
    let x_center: f64 = fields[1].parse().ok()?;
    let y_center: f64 = fields[2].parse().ok()?;
    let width: f64 = fields[3].parse().ok()?;
    let height: f64 = fields[4].parse().ok()?;
    let confidence: Option<f64> = match fields.get(5) {
        Some(raw) => Some(raw.parse().ok()?),
        None => None,
    };

    Some(Detection {
        class_id,
        x_center,
        y_center,
        width,
        height,
        confidence,
        source_line: line.trim_end().to_string(),
    })
}

/// An annotation file in memory: the detections in file line order plus a
/// count of lines the parser had to skip.
#[derive(Debug, Clone)]
pub struct AnnotationFile {
    pub stem: String,
    pub detections: Vec<Detection>,
    pub skipped_lines: usize,
}

impl AnnotationFile {
    /// Load and parse an annotation file.
    ///
    /// Malformed lines are skipped with a warning; the rest of the file is
    /// still used. Only an unreadable file is an error.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read annotation file {}: {}", path.display(), e))?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut detections = Vec::new();
        let mut skipped_lines = 0;
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(detection) => detections.push(detection),
                None => {
                    skipped_lines += 1;
                    warn!(
                        "Skipping malformed line {} in {}: {:?}",
                        idx + 1,
                        path.display(),
                        line
                    );
                }
            }
        }

        Ok(Self {
            stem,
            detections,
            skipped_lines,
        })
    }
}

/// Write detections to a new annotation file, one source line per detection.
///
/// Re-reading the written file yields the same detection set, byte-identical
/// per line.
pub fn write_annotation_file(path: &Path, detections: &[Detection]) -> std::io::Result<()> {
    let mut content = String::new();
    for detection in detections {
        content.push_str(detection.source_line());
        content.push('\n');
    }
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_confidence() {
        let detection = parse_line("3 0.5 0.25 0.1 0.2 0.87").unwrap();
        assert_eq!(detection.class_id, 3);
        assert_eq!(detection.x_center, 0.5);
        assert_eq!(detection.y_center, 0.25);
        assert_eq!(detection.width, 0.1);
        assert_eq!(detection.height, 0.2);
        assert_eq!(detection.confidence, Some(0.87));
    }

    #[test]
    fn test_parse_line_without_confidence() {
        let detection = parse_line("0 0.1 0.2 0.3 0.4").unwrap();
        assert_eq!(detection.class_id, 0);
        assert_eq!(detection.confidence, None);
    }

    #[test]
    fn test_parse_line_malformed() {
        // Wrong field counts
        assert!(parse_line("1 0.5 0.5 0.1").is_none());
        assert!(parse_line("1 0.5 0.5 0.1 0.1 0.9 extra").is_none());
        // Non-numeric fields
        assert!(parse_line("x 0.5 0.5 0.1 0.1").is_none());
        assert!(parse_line("1 0.5 abc 0.1 0.1").is_none());
        // Fractional class id
        assert!(parse_line("1.5 0.5 0.5 0.1 0.1").is_none());
    }

    #[test]
    fn test_source_line_preserved_verbatim() {
        let raw = "7 0.123456 0.654321 0.050000 0.075000 0.912345";
        let detection = parse_line(raw).unwrap();
        assert_eq!(detection.source_line(), raw);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img_0001.txt");
        std::fs::write(&path, "0 0.5 0.5 0.1 0.1\nbogus line\n1 0.2 0.3 0.1 0.1 0.5\n").unwrap();

        let file = AnnotationFile::load(&path).unwrap();
        assert_eq!(file.stem, "img_0001");
        assert_eq!(file.detections.len(), 2);
        assert_eq!(file.skipped_lines, 1);
    }

    #[test]
    fn test_round_trip_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        let original = "0 0.50 0.50 0.10 0.10 0.91\n5 0.25 0.75 0.02 0.04 0.33\n";
        std::fs::write(&src, original).unwrap();

        let file = AnnotationFile::load(&src).unwrap();
        let dst = dir.path().join("b.txt");
        write_annotation_file(&dst, &file.detections).unwrap();

        let rewritten = std::fs::read_to_string(&dst).unwrap();
        assert_eq!(rewritten, original);
    }
}
