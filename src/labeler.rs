/// Launching the external labeling tool next to the dataset browser
///
/// The labeling editor is an external program: our only obligations are a
/// correct, deduplicated, existing-file-checked path list on its command
/// line and surfacing a non-zero exit. For the review workflow the tool
/// runs on a background thread so the browser UI can come up concurrently;
/// the thread is held by an explicit handle whose `join()` reports the
/// tool's failure instead of losing it.
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;
use std::thread;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::classes::ClassList;
use crate::registry::{extract_filenames_by_tag, DatasetRegistry, TagQuery};

/// Absolute, deduplicated, existing-files-only list for the tool's
/// `--files-list` argument. Selection order is preserved.
pub fn build_file_list(paths: &[PathBuf]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for path in paths {
        let absolute = match std::fs::canonicalize(path) {
            Ok(p) => p,
            Err(_) => {
                warn!("Dropping missing file from labeling list: {}", path.display());
                continue;
            }
        };
        let as_string = absolute.to_string_lossy().to_string();
        if seen.insert(as_string.clone()) {
            files.push(as_string);
        }
    }
    files
}

/// Run the labeling tool synchronously on a list of files. A non-zero exit
/// is an error to the caller.
pub fn edit_labels(program: &str, files: &[String], class_names: &[String]) -> Result<(), String> {
    if files.is_empty() {
        return Err("No files to label".to_string());
    }
    info!("Launching {} on {} files", program, files.len());

    let status = Command::new(program)
        .arg("--class-list")
        .args(class_names)
        .arg("--files-list")
        .args(files)
        .status()
        .map_err(|e| format!("Failed to launch labeling tool {:?}: {}", program, e))?;

    if !status.success() {
        return Err(format!(
            "Labeling tool {:?} exited with status {}",
            program, status
        ));
    }
    Ok(())
}

/// Handle to a labeling tool running on a background thread.
pub struct LabelerHandle {
    thread: thread::JoinHandle<Result<(), String>>,
}

impl LabelerHandle {
    /// Wait for the tool to finish and propagate its error, if any.
    pub fn join(self) -> Result<(), String> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err("Labeling thread panicked".to_string()),
        }
    }
}

pub fn spawn_labeler(program: String, files: Vec<String>, class_names: Vec<String>) -> LabelerHandle {
    let thread = thread::Builder::new()
        .name("labeler".to_string())
        .spawn(move || edit_labels(&program, &files, &class_names))
        .expect("Failed to spawn labeler thread");
    LabelerHandle { thread }
}

/// Review workflow: query a dataset for suspicious samples, open the
/// labeling tool on them, bring up the dataset-browser UI alongside, then
/// wait for the tool and surface its exit status.
pub fn find_errors(
    registry: &DatasetRegistry,
    dataset_label: &str,
    class_list: &ClassList,
    query: &TagQuery,
    labeler_program: &str,
    viewer_url: &str,
) -> Result<(), String> {
    let dataset = registry.load_dataset(dataset_label)?;
    let stats = dataset.stats();
    info!(
        "Dataset {:?}: {} samples, {} ground truths, {} predictions",
        dataset.name, stats.num_samples, stats.num_ground_truths, stats.num_predictions
    );

    let selected = extract_filenames_by_tag(&dataset, query);
    let files = build_file_list(&selected);
    if files.is_empty() {
        return Err(format!(
            "No existing files matched tag {:?} in dataset {:?}",
            query.tag, dataset_label
        ));
    }
    info!("Selected {} files for review (tag {:?})", files.len(), query.tag);

    let handle = spawn_labeler(
        labeler_program.to_string(),
        files,
        class_list.names_in_id_order(),
    );

    // The browser UI is independent of the labeler; failing to open it
    // should not tear the review session down.
    if let Err(e) = webbrowser::open(viewer_url) {
        warn!("Could not open dataset browser at {}: {:?}", viewer_url, e);
    } else {
        info!("Opened dataset browser at {}", viewer_url);
    }

    handle.join()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_file_list_checks_existence_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.jpg");
        std::fs::write(&existing, b"img").unwrap();
        let missing = dir.path().join("gone.jpg");

        let files = build_file_list(&[existing.clone(), missing, existing.clone()]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.jpg"));
        assert!(PathBuf::from(&files[0]).is_absolute());
    }

    #[test]
    fn test_edit_labels_requires_files() {
        let err = edit_labels("true", &[], &[]).unwrap_err();
        assert!(err.contains("No files"));
    }

    #[test]
    #[cfg(unix)]
    fn test_edit_labels_surfaces_nonzero_exit() {
        let files = vec!["/tmp/whatever.jpg".to_string()];
        assert!(edit_labels("false", &files, &[]).is_err());
        assert!(edit_labels("true", &files, &[]).is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_spawned_labeler_error_propagates_through_join() {
        let files = vec!["/tmp/whatever.jpg".to_string()];
        let handle = spawn_labeler("false".to_string(), files.clone(), vec![]);
        assert!(handle.join().is_err());

        let handle = spawn_labeler("true".to_string(), files, vec![]);
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_missing_launcher_program_is_an_error() {
        let files = vec!["/tmp/whatever.jpg".to_string()];
        assert!(edit_labels("definitely-not-a-real-program-xyz", &files, &[]).is_err());
    }
}
