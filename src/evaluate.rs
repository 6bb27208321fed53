/// Scoring model predictions against ground truth, per class
///
/// Works at image granularity: a class is "present" in an image when any
/// annotation line carries it. The per-class precision/recall/F1/accuracy
/// over those binary vectors is the cheap health check run after each
/// training round; box-level evaluation belongs to the external framework.
use std::path::Path;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::classes::ClassList;
use crate::file_io;

/// Truth vs inferred class presence for one image.
#[derive(Debug, Clone)]
pub struct PhotoClassification {
    pub image_name: String,
    pub actual: Vec<bool>,
    pub inferred: Vec<bool>,
}

fn presence_from_file(path: &Path, num_classes: usize) -> Vec<bool> {
    let mut presence = vec![false; num_classes];
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return presence;
        }
    };
    for line in content.lines() {
        let Some(first) = line.split_whitespace().next() else {
            continue;
        };
        match first.parse::<usize>() {
            Ok(class_id) if class_id < num_classes => presence[class_id] = true,
            Ok(class_id) => debug!(
                "Class id {} out of range (num_classes = {}) in {}",
                class_id,
                num_classes,
                path.display()
            ),
            Err(_) => debug!("Non-numeric class id in {}", path.display()),
        }
    }
    presence
}

/// Build the truth/inferred presence matrix for every image under
/// `images_root`. A missing annotation file means nothing is present.
pub fn build_presence_matrix(
    images_root: &Path,
    truths_root: &Path,
    inferences_root: &Path,
    num_classes: usize,
) -> Result<Vec<PhotoClassification>, String> {
    file_io::require_dir(images_root, "Images root")?;
    file_io::require_dir(truths_root, "Ground truths directory")?;
    file_io::require_dir(inferences_root, "Inferences directory")?;

    let mut rows = Vec::new();
    for image_path in file_io::get_image_paths_recursive(images_root) {
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let truth_path = truths_root.join(format!("{}.txt", stem));
        let actual = if file_io::is_file(&truth_path) {
            presence_from_file(&truth_path, num_classes)
        } else {
            vec![false; num_classes]
        };

        let inference_path = inferences_root.join(format!("{}.txt", stem));
        let inferred = if file_io::is_file(&inference_path) {
            presence_from_file(&inference_path, num_classes)
        } else {
            vec![false; num_classes]
        };

        rows.push(PhotoClassification {
            image_name: image_path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            actual,
            inferred,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
}

/// Binary metrics for one class index over the matrix. Zero denominators
/// score 0.0 with a warning, matching the usual zero-division posture of
/// classification report tooling.
pub fn classification_metrics(rows: &[PhotoClassification], idx: usize) -> ClassMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    let mut tn = 0usize;
    for row in rows {
        match (row.actual[idx], row.inferred[idx]) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => tn += 1,
        }
    }

    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        warn!("No positive predictions for class index {}; precision set to 0.0", idx);
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        warn!("No positive ground truths for class index {}; recall set to 0.0", idx);
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let total = rows.len();
    let accuracy = if total > 0 {
        (tp + tn) as f64 / total as f64
    } else {
        0.0
    };

    ClassMetrics {
        precision,
        recall,
        f1,
        accuracy,
    }
}

fn render_metrics_table(results: &[(String, ClassMetrics)]) -> String {
    let name_width = results
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(5)
        .max("Class".len());

    let separator = format!(
        "+-{}-+------+------+------+\n",
        "-".repeat(name_width)
    );
    let mut table = String::new();
    table.push_str(&separator);
    table.push_str(&format!("| {:<width$} | P    | R    | F1   |\n", "Class", width = name_width));
    table.push_str(&separator);
    for (name, metrics) in results {
        table.push_str(&format!(
            "| {:<width$} | {:.2} | {:.2} | {:.2} |\n",
            name,
            metrics.precision,
            metrics.recall,
            metrics.f1,
            width = name_width
        ));
    }
    table.push_str(&separator);
    table
}

fn write_matrix_csv(rows: &[PhotoClassification], path: &Path) -> Result<(), String> {
    let mut csv = String::from("image,actual,inferred\n");
    for row in rows {
        let actual: String = row.actual.iter().map(|&b| if b { '1' } else { '0' }).collect();
        let inferred: String = row.inferred.iter().map(|&b| if b { '1' } else { '0' }).collect();
        csv.push_str(&format!("{},{},{}\n", row.image_name, actual, inferred));
    }
    std::fs::write(path, csv).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

/// Full evaluation run: presence matrix, per-class metrics, rendered table.
/// `print_first_n` limits the table to the lowest class ids; `dst_csv`
/// additionally writes the per-image matrix as `image,actual,inferred` bit
/// strings.
pub fn analyse_model_binary_metrics(
    images_root: &Path,
    truths_root: &Path,
    inferences_root: &Path,
    classes_path: &Path,
    print_first_n: Option<usize>,
    dst_csv: Option<&Path>,
) -> Result<String, String> {
    let class_list = ClassList::from_file(classes_path)?;
    let num_classes = class_list.len();

    let rows = build_presence_matrix(images_root, truths_root, inferences_root, num_classes)?;
    info!("Evaluated {} images over {} classes", rows.len(), num_classes);

    if let Some(csv_path) = dst_csv {
        write_matrix_csv(&rows, csv_path)?;
        info!("Wrote presence matrix to {}", csv_path.display());
    }

    let limit = print_first_n.unwrap_or(num_classes).min(num_classes);
    let mut results = Vec::new();
    for class_id in 0..limit {
        let name = class_list.name_or_unknown(class_id);
        results.push((name, classification_metrics(&rows, class_id)));
    }

    Ok(render_metrics_table(&results))
}
