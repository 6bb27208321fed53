/// Dataset registry for the external browser/evaluation framework
///
/// The browsing framework keeps a process-wide named-dataset store; here the
/// store is an explicit repository handle instead - callers pass a
/// `DatasetRegistry` opened on a storage root, never a module-level global.
/// One JSON document per dataset. Uniqueness/mistakenness scores and
/// `eval=tp/fp/fn` tags are computed by the external framework and imported
/// from its export; this module only stores and queries them.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::annotations::AnnotationFile;
use crate::classes::ClassList;
use crate::file_io;

/// Folder names that never count as subset folders when scanning a dataset
/// root.
const RESERVED_FOLDER_NAMES: [&str; 3] = ["labels", "YOLO_darknet", "PASCAL_VOC"];

/// One labeled or predicted box on a sample, in the corner-box layout the
/// browsing framework uses: `[top_left_x, top_left_y, width, height]`,
/// normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoxLabel {
    pub label: String,
    pub bounding_box: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Evaluation outcome ("tp"/"fp"/"fn") assigned by the external
    /// framework's detection evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub filepath: String,
    pub subset: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ground_truth: Vec<BoxLabel>,
    #[serde(default)]
    pub predictions: Vec<BoxLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniqueness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mistakenness: Option<f64>,
}

impl Sample {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub created_at: String,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Copy)]
pub struct DatasetStats {
    pub num_samples: usize,
    pub num_ground_truths: usize,
    pub num_predictions: usize,
}

impl Dataset {
    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            num_samples: self.samples.len(),
            num_ground_truths: self.samples.iter().map(|s| s.ground_truth.len()).sum(),
            num_predictions: self.samples.iter().map(|s| s.predictions.len()).sum(),
        }
    }
}

/// Repository handle over a directory of dataset documents.
pub struct DatasetRegistry {
    root: PathBuf,
}

impl DatasetRegistry {
    /// Platform data directory used when the caller does not supply a root.
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("boxwrangle")
            .join("datasets")
    }

    /// Open (and create if needed) a registry rooted at `root`.
    pub fn open(root: PathBuf) -> Result<Self, String> {
        std::fs::create_dir_all(&root)
            .map_err(|e| format!("Failed to create registry root {}: {}", root.display(), e))?;
        debug!("Dataset registry root: {}", root.display());
        Ok(Self { root })
    }

    fn dataset_path(&self, name: &str) -> Result<PathBuf, String> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(format!("Invalid dataset name: {:?}", name));
        }
        Ok(self.root.join(format!("{}.json", name)))
    }

    pub fn list_datasets(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.extension().and_then(|e| e.to_str()) == Some("json") {
                            path.file_stem().map(|s| s.to_string_lossy().to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[allow(dead_code)]
    pub fn exists(&self, name: &str) -> bool {
        self.dataset_path(name)
            .map(|p| file_io::is_file(&p))
            .unwrap_or(false)
    }

    pub fn load_dataset(&self, name: &str) -> Result<Dataset, String> {
        let path = self.dataset_path(name)?;
        if !file_io::is_file(&path) {
            return Err(format!("Dataset not found: {}", name));
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read dataset {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse dataset {}: {}", path.display(), e))
    }

    pub fn save_dataset(&self, dataset: &Dataset) -> Result<(), String> {
        let path = self.dataset_path(&dataset.name)?;
        let json = serde_json::to_string_pretty(dataset)
            .map_err(|e| format!("Failed to serialize dataset {}: {}", dataset.name, e))?;
        std::fs::write(&path, json)
            .map_err(|e| format!("Failed to write dataset {}: {}", path.display(), e))?;
        info!("Saved dataset {:?} to {}", dataset.name, path.display());
        Ok(())
    }

    /// Deleting a dataset that does not exist is not an error.
    pub fn delete_dataset(&self, name: &str) -> Result<(), String> {
        let path = self.dataset_path(name)?;
        if file_io::is_file(&path) {
            std::fs::remove_file(&path)
                .map_err(|e| format!("Failed to delete dataset {}: {}", path.display(), e))?;
            info!("Deleted dataset {:?}", name);
        } else {
            debug!("Dataset {:?} not present; nothing to delete", name);
        }
        Ok(())
    }
}

/// Where a dataset is built from: a root of subset folders, or a single
/// images folder treated as the sole subset. Exactly one must be given.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub dataset_root: Option<PathBuf>,
    pub images_root: Option<PathBuf>,
    /// Explicit ground-truth folder; otherwise each subset is searched for a
    /// recognized annotation folder.
    pub ground_truths_root: Option<PathBuf>,
    pub val_inferences_root: Option<PathBuf>,
    pub train_inferences_root: Option<PathBuf>,
    /// Subset whose samples get the "candidate" tag.
    pub candidate_subset: Option<String>,
}

fn subset_folders(options: &BuildOptions) -> Result<Vec<PathBuf>, String> {
    match (&options.dataset_root, &options.images_root) {
        (None, Some(images_root)) => {
            file_io::require_dir(images_root, "Images root")?;
            Ok(vec![images_root.clone()])
        }
        (Some(dataset_root), None) => {
            file_io::require_dir(dataset_root, "Dataset root")?;
            let mut folders: Vec<PathBuf> = std::fs::read_dir(dataset_root)
                .map_err(|e| format!("Failed to read {}: {}", dataset_root.display(), e))?
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .filter(|path| {
                    let name = path
                        .file_name()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default();
                    !RESERVED_FOLDER_NAMES.contains(&name.as_str()) && !name.starts_with('.')
                })
                .collect();
            folders.sort();
            Ok(folders)
        }
        _ => Err(
            "Provide exactly one of a dataset root (containing subset folders) or an images root"
                .to_string(),
        ),
    }
}

fn boxes_from_annotation_file(path: &Path, class_list: &ClassList) -> Vec<BoxLabel> {
    let file = match AnnotationFile::load(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("{}", e);
            return Vec::new();
        }
    };
    file.detections
        .iter()
        .map(|d| BoxLabel {
            label: class_list.name_or_unknown(d.class_id),
            bounding_box: d.corner_box(),
            confidence: d.confidence,
            eval: None,
        })
        .collect()
}

/// Scan the directory tree and assemble a dataset: ground truths per subset,
/// predictions from the val/train inference roots, and the
/// val/train/processed/candidate tags. Scores stay empty until imported.
pub fn build_dataset(
    name: &str,
    class_list: &ClassList,
    options: &BuildOptions,
) -> Result<Dataset, String> {
    let mut samples = Vec::new();

    for subset_folder in subset_folders(options)? {
        let ground_truths_folder = match &options.ground_truths_root {
            Some(root) => root.clone(),
            None => file_io::find_annotations_dir(&subset_folder),
        };
        let subset_name = subset_folder
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        for image_path in file_io::get_image_paths_recursive(&subset_folder) {
            let stem = image_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            let mut tags = Vec::new();
            let ground_truths_path = ground_truths_folder.join(format!("{}.txt", stem));
            let ground_truth = if file_io::is_file(&ground_truths_path) {
                boxes_from_annotation_file(&ground_truths_path, class_list)
            } else {
                debug!("Ground truth does not exist: {}", ground_truths_path.display());
                Vec::new()
            };

            let inferences_path = [
                (&options.val_inferences_root, "val"),
                (&options.train_inferences_root, "train"),
            ]
            .iter()
            .find_map(|(root, tag)| {
                root.as_ref().and_then(|root| {
                    let candidate = root.join(format!("{}.txt", stem));
                    if file_io::is_file(&candidate) {
                        Some((candidate, tag.to_string()))
                    } else {
                        None
                    }
                })
            });

            let predictions = match inferences_path {
                Some((path, split_tag)) => {
                    tags.push(split_tag);
                    tags.push("processed".to_string());
                    boxes_from_annotation_file(&path, class_list)
                }
                None => Vec::new(),
            };

            if options.candidate_subset.as_deref() == Some(subset_name.as_str()) {
                tags.push("candidate".to_string());
            }

            samples.push(Sample {
                filepath: image_path.to_string_lossy().to_string(),
                subset: subset_name.clone(),
                tags,
                ground_truth,
                predictions,
                uniqueness: None,
                mistakenness: None,
            });
        }
    }

    let dataset = Dataset {
        name: name.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        samples,
    };
    let stats = dataset.stats();
    info!(
        "Built dataset {:?}: {} samples, {} ground truths, {} predictions",
        name, stats.num_samples, stats.num_ground_truths, stats.num_predictions
    );
    Ok(dataset)
}

/// Exported scores from the external framework, matched to samples by
/// filepath. Eval outcomes are positional over each sample's boxes.
#[derive(Debug, Deserialize)]
pub struct ScoreExport {
    pub samples: Vec<ScoreExportSample>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreExportSample {
    pub filepath: String,
    #[serde(default)]
    pub uniqueness: Option<f64>,
    #[serde(default)]
    pub mistakenness: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prediction_eval: Vec<String>,
    #[serde(default)]
    pub ground_truth_eval: Vec<String>,
}

/// Merge an external score export into a dataset. Returns the number of
/// matched samples.
pub fn import_scores(dataset: &mut Dataset, path: &Path) -> Result<usize, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read score export {}: {}", path.display(), e))?;
    let export: ScoreExport = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse score export {}: {}", path.display(), e))?;

    let mut by_filepath: HashMap<&str, &ScoreExportSample> = HashMap::new();
    for sample in &export.samples {
        by_filepath.insert(sample.filepath.as_str(), sample);
    }

    let mut matched = 0;
    for sample in &mut dataset.samples {
        let Some(incoming) = by_filepath.get(sample.filepath.as_str()) else {
            continue;
        };
        matched += 1;
        if incoming.uniqueness.is_some() {
            sample.uniqueness = incoming.uniqueness;
        }
        if incoming.mistakenness.is_some() {
            sample.mistakenness = incoming.mistakenness;
        }
        for tag in &incoming.tags {
            if !sample.has_tag(tag) {
                sample.tags.push(tag.clone());
            }
        }
        apply_evals(&mut sample.predictions, &incoming.prediction_eval, &sample.filepath);
        apply_evals(&mut sample.ground_truth, &incoming.ground_truth_eval, &sample.filepath);
    }

    if matched < export.samples.len() {
        warn!(
            "{} of {} exported samples did not match any dataset filepath",
            export.samples.len() - matched,
            export.samples.len()
        );
    }
    info!("Imported scores for {} samples", matched);
    Ok(matched)
}

fn apply_evals(boxes: &mut [BoxLabel], evals: &[String], filepath: &str) {
    if evals.is_empty() {
        return;
    }
    if evals.len() != boxes.len() {
        warn!(
            "Eval count {} does not match box count {} for {}; skipping",
            evals.len(),
            boxes.len(),
            filepath
        );
        return;
    }
    for (label, eval) in boxes.iter_mut().zip(evals) {
        label.eval = Some(eval.clone());
    }
}

/// Selection parameters for [`extract_filenames_by_tag`].
#[derive(Debug, Clone)]
pub struct TagQuery {
    /// "mistakenness", "error", "eval_fp" or "eval_fn".
    pub tag: String,
    pub limit: usize,
    /// Only consider samples that went through the evaluation run.
    pub processed: bool,
    /// Sort descending (highest score first).
    pub reverse: bool,
    /// Keep only samples carrying this ground-truth label.
    pub label_filter: Option<String>,
}

impl Default for TagQuery {
    fn default() -> Self {
        Self {
            tag: "eval_fn".to_string(),
            limit: 25,
            processed: true,
            reverse: true,
            label_filter: None,
        }
    }
}

fn sort_by_score<'a, F>(samples: &mut Vec<&'a Sample>, reverse: bool, score: F)
where
    F: Fn(&Sample) -> Option<f64>,
{
    samples.sort_by(|a, b| {
        let sa = score(a).unwrap_or(f64::NEG_INFINITY);
        let sb = score(b).unwrap_or(f64::NEG_INFINITY);
        if reverse {
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}

fn has_eval(boxes: &[BoxLabel], value: &str) -> bool {
    boxes.iter().any(|b| b.eval.as_deref() == Some(value))
}

/// Select sample filepaths by tag, in the browsing framework's query shape.
///
/// The result is deduplicated and preserves the selection order; existence
/// checking is left to the labeling-tool launcher, which needs it anyway.
pub fn extract_filenames_by_tag(dataset: &Dataset, query: &TagQuery) -> Vec<PathBuf> {
    let mut samples: Vec<&Sample> = dataset.samples.iter().collect();

    if let Some(label) = &query.label_filter {
        samples.retain(|s| s.ground_truth.iter().any(|b| &b.label == label));
    }
    if query.processed {
        samples.retain(|s| s.has_tag("processed"));
    }

    let selected: Vec<&Sample> = match query.tag.as_str() {
        "mistakenness" => {
            sort_by_score(&mut samples, query.reverse, |s| s.mistakenness);
            samples.truncate(query.limit);
            samples
        }
        "error" => {
            samples.retain(|s| s.has_tag("error"));
            samples.truncate(query.limit);
            samples
        }
        "eval_fp" => {
            samples.retain(|s| has_eval(&s.predictions, "fp"));
            sort_by_score(&mut samples, query.reverse, |s| s.uniqueness);
            samples.truncate(query.limit);
            samples.sort_by(|a, b| a.filepath.cmp(&b.filepath));
            samples
        }
        "eval_fn" => {
            samples.retain(|s| has_eval(&s.ground_truth, "fn"));
            sort_by_score(&mut samples, query.reverse, |s| s.uniqueness);
            samples.truncate(query.limit);
            samples.sort_by(|a, b| a.filepath.cmp(&b.filepath));
            samples
        }
        "eval_tp" => {
            // Examining true positives has never earned its keep; refuse
            // rather than hand the labeler the whole dataset.
            warn!("Selecting by eval_tp is not supported; nothing selected");
            Vec::new()
        }
        other => {
            warn!("Unknown tag {:?}; selecting all samples", other);
            samples
        }
    };

    let mut seen = HashSet::new();
    selected
        .iter()
        .map(|s| PathBuf::from(&s.filepath))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(filepath: &str) -> Sample {
        Sample {
            filepath: filepath.to_string(),
            subset: "subset_1".to_string(),
            tags: vec!["processed".to_string()],
            ground_truth: Vec::new(),
            predictions: Vec::new(),
            uniqueness: None,
            mistakenness: None,
        }
    }

    fn boxed(label: &str, eval: Option<&str>) -> BoxLabel {
        BoxLabel {
            label: label.to_string(),
            bounding_box: [0.1, 0.1, 0.2, 0.2],
            confidence: None,
            eval: eval.map(|e| e.to_string()),
        }
    }

    fn dataset(samples: Vec<Sample>) -> Dataset {
        Dataset {
            name: "test".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            samples,
        }
    }

    #[test]
    fn test_registry_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let registry = DatasetRegistry::open(root.path().join("datasets")).unwrap();

        assert!(registry.list_datasets().is_empty());
        let ds = dataset(vec![sample("/data/a.jpg")]);
        registry.save_dataset(&ds).unwrap();

        assert_eq!(registry.list_datasets(), vec!["test"]);
        assert!(registry.exists("test"));
        let loaded = registry.load_dataset("test").unwrap();
        assert_eq!(loaded.samples.len(), 1);
        assert_eq!(loaded.samples[0].filepath, "/data/a.jpg");

        registry.delete_dataset("test").unwrap();
        assert!(!registry.exists("test"));
        // Deleting again is fine.
        registry.delete_dataset("test").unwrap();
    }

    #[test]
    fn test_load_missing_dataset_names_it() {
        let root = tempfile::tempdir().unwrap();
        let registry = DatasetRegistry::open(root.path().to_path_buf()).unwrap();
        let err = registry.load_dataset("nope").unwrap_err();
        assert!(err.contains("Dataset not found: nope"));
    }

    #[test]
    fn test_invalid_dataset_name_rejected() {
        let root = tempfile::tempdir().unwrap();
        let registry = DatasetRegistry::open(root.path().to_path_buf()).unwrap();
        assert!(registry.load_dataset("../escape").is_err());
    }

    #[test]
    fn test_build_dataset_scans_subsets_and_tags() {
        let root = tempfile::tempdir().unwrap();
        let subset = root.path().join("survey_2021");
        let labels = subset.join("labels");
        std::fs::create_dir_all(&labels).unwrap();
        std::fs::write(subset.join("a.jpg"), b"img").unwrap();
        std::fs::write(subset.join("b.jpg"), b"img").unwrap();
        std::fs::write(labels.join("a.txt"), "0 0.5 0.5 0.2 0.2\n").unwrap();

        let val_dir = root.path().join("val_inferences");
        std::fs::create_dir(&val_dir).unwrap();
        std::fs::write(val_dir.join("a.txt"), "0 0.5 0.5 0.2 0.2 0.8\n").unwrap();

        let class_list = ClassList::from_str(r#"{"0": {"name": "WS", "threshold": 0.4}}"#).unwrap();
        let options = BuildOptions {
            dataset_root: Some(root.path().to_path_buf()),
            val_inferences_root: Some(val_dir),
            candidate_subset: Some("survey_2021".to_string()),
            ..BuildOptions::default()
        };
        let ds = build_dataset("survey", &class_list, &options).unwrap();

        assert_eq!(ds.samples.len(), 2);
        let a = ds.samples.iter().find(|s| s.filepath.ends_with("a.jpg")).unwrap();
        assert_eq!(a.ground_truth.len(), 1);
        assert_eq!(a.ground_truth[0].label, "WS");
        assert_eq!(a.predictions.len(), 1);
        assert_eq!(a.predictions[0].confidence, Some(0.8));
        assert!(a.has_tag("val"));
        assert!(a.has_tag("processed"));
        assert!(a.has_tag("candidate"));

        let b = ds.samples.iter().find(|s| s.filepath.ends_with("b.jpg")).unwrap();
        assert!(b.ground_truth.is_empty());
        assert!(!b.has_tag("processed"));
    }

    #[test]
    fn test_build_dataset_requires_exactly_one_root() {
        let class_list = ClassList::from_str(r#"{"0": {"name": "WS", "threshold": 0.4}}"#).unwrap();
        assert!(build_dataset("x", &class_list, &BuildOptions::default()).is_err());
    }

    #[test]
    fn test_import_scores_matches_by_filepath() {
        let mut ds = dataset(vec![sample("/data/a.jpg"), sample("/data/b.jpg")]);
        ds.samples[0].predictions.push(boxed("WS", None));

        let export = r#"{
            "samples": [
                {"filepath": "/data/a.jpg", "uniqueness": 0.9, "mistakenness": 0.3,
                 "tags": ["error"], "prediction_eval": ["fp"]},
                {"filepath": "/data/unknown.jpg", "uniqueness": 0.1}
            ]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        std::fs::write(&path, export).unwrap();

        let matched = import_scores(&mut ds, &path).unwrap();
        assert_eq!(matched, 1);
        assert_eq!(ds.samples[0].uniqueness, Some(0.9));
        assert!(ds.samples[0].has_tag("error"));
        assert_eq!(ds.samples[0].predictions[0].eval.as_deref(), Some("fp"));
        assert_eq!(ds.samples[1].uniqueness, None);
    }

    #[test]
    fn test_query_mistakenness_sorts_and_limits() {
        let mut s1 = sample("/d/low.jpg");
        s1.mistakenness = Some(0.1);
        let mut s2 = sample("/d/high.jpg");
        s2.mistakenness = Some(0.9);
        let mut s3 = sample("/d/mid.jpg");
        s3.mistakenness = Some(0.5);
        let ds = dataset(vec![s1, s2, s3]);

        let query = TagQuery {
            tag: "mistakenness".to_string(),
            limit: 2,
            ..TagQuery::default()
        };
        let files = extract_filenames_by_tag(&ds, &query);
        assert_eq!(files, vec![PathBuf::from("/d/high.jpg"), PathBuf::from("/d/mid.jpg")]);
    }

    #[test]
    fn test_query_eval_fp_filters_sorts_then_orders_by_filepath() {
        let mut s1 = sample("/d/zebra.jpg");
        s1.predictions.push(boxed("WS", Some("fp")));
        s1.uniqueness = Some(0.2);
        let mut s2 = sample("/d/apple.jpg");
        s2.predictions.push(boxed("WS", Some("fp")));
        s2.uniqueness = Some(0.9);
        let mut s3 = sample("/d/tp_only.jpg");
        s3.predictions.push(boxed("WS", Some("tp")));
        let ds = dataset(vec![s1, s2, s3]);

        let query = TagQuery {
            tag: "eval_fp".to_string(),
            ..TagQuery::default()
        };
        let files = extract_filenames_by_tag(&ds, &query);
        // Both fp samples selected, final order is by filepath.
        assert_eq!(files, vec![PathBuf::from("/d/apple.jpg"), PathBuf::from("/d/zebra.jpg")]);
    }

    #[test]
    fn test_query_requires_processed_tag() {
        let mut unprocessed = sample("/d/raw.jpg");
        unprocessed.tags.clear();
        unprocessed.mistakenness = Some(1.0);
        let ds = dataset(vec![unprocessed]);

        let query = TagQuery {
            tag: "mistakenness".to_string(),
            ..TagQuery::default()
        };
        assert!(extract_filenames_by_tag(&ds, &query).is_empty());

        let relaxed = TagQuery {
            tag: "mistakenness".to_string(),
            processed: false,
            ..TagQuery::default()
        };
        assert_eq!(extract_filenames_by_tag(&ds, &relaxed).len(), 1);
    }

    #[test]
    fn test_query_label_filter() {
        let mut ws = sample("/d/ws.jpg");
        ws.ground_truth.push(boxed("WS", Some("fn")));
        let mut cd = sample("/d/cd.jpg");
        cd.ground_truth.push(boxed("CD", Some("fn")));
        let ds = dataset(vec![ws, cd]);

        let query = TagQuery {
            tag: "eval_fn".to_string(),
            label_filter: Some("WS".to_string()),
            ..TagQuery::default()
        };
        let files = extract_filenames_by_tag(&ds, &query);
        assert_eq!(files, vec![PathBuf::from("/d/ws.jpg")]);
    }

    #[test]
    fn test_query_eval_tp_selects_nothing() {
        let mut s = sample("/d/a.jpg");
        s.predictions.push(boxed("WS", Some("tp")));
        let ds = dataset(vec![s]);
        let query = TagQuery {
            tag: "eval_tp".to_string(),
            ..TagQuery::default()
        };
        assert!(extract_filenames_by_tag(&ds, &query).is_empty());
    }

    #[test]
    fn test_query_deduplicates_filepaths() {
        let mut s1 = sample("/d/dup.jpg");
        s1.mistakenness = Some(0.9);
        let mut s2 = sample("/d/dup.jpg");
        s2.mistakenness = Some(0.8);
        let ds = dataset(vec![s1, s2]);

        let query = TagQuery {
            tag: "mistakenness".to_string(),
            ..TagQuery::default()
        };
        assert_eq!(extract_filenames_by_tag(&ds, &query).len(), 1);
    }
}
