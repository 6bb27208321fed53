mod annotations;
mod build_info;
mod classes;
mod config;
mod copier;
mod evaluate;
mod file_io;
mod filter;
mod labeler;
mod mine;
mod patch;
mod registry;
mod settings;
mod utils;
mod visualize;

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[allow(unused_imports)]
use log::{Level, trace, debug, info, warn, error};

use crate::classes::ClassList;
use crate::config::CONFIG;
use crate::registry::{BuildOptions, DatasetRegistry, TagQuery};

const APP_NAME: &str = "boxwrangle";

#[derive(Parser)]
#[command(
    name = "boxwrangle",
    version = Box::leak(build_info::BuildInfo::display_version().into_boxed_str()) as &str,
    about = "Curation utilities for YOLO-style object detection datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Selectively copy images and filtered annotations out of a detection run
    Mine {
        /// Directory holding the source images
        src_images_dir: PathBuf,
        /// Directory holding the detection annotation files
        annotations_dir: PathBuf,
        /// Destination directory (must not exist yet)
        dst_dir: PathBuf,
        /// Class list JSON with per-class production thresholds
        classes_json: PathBuf,
        /// Coefficient on the per-class threshold forming the lower confidence bound
        #[arg(long, default_value_t = CONFIG.lower_threshold_coefficient)]
        lower_coefficient: f64,
        /// Optional coefficient forming an upper confidence bound, for mining
        /// hard mid-confidence examples
        #[arg(long)]
        upper_coefficient: Option<f64>,
        /// Drop detections centred above this normalized y value
        #[arg(long, default_value_t = CONFIG.filter_horizon)]
        horizon: f64,
        /// Apex of the top-corner exclusion wedges (<= 0 disables)
        #[arg(long, default_value_t = CONFIG.wedge_apex_y)]
        wedge_apex: f64,
        /// Class ids that cannot carry an image on their own (repeatable)
        #[arg(long = "exclude-class", value_name = "CLASS_ID")]
        exclude_classes: Vec<usize>,
        /// Also copy every hit-free image as an unlabeled hard negative
        #[arg(long)]
        copy_all: bool,
    },

    /// Copy image + annotation pairs containing at least one priority class
    Sample {
        src_images_dir: PathBuf,
        /// Destination directory (must not exist yet)
        dst_dir: PathBuf,
        /// Priority class ids (repeatable, at least one)
        #[arg(long = "class", value_name = "CLASS_ID", required = true)]
        classes: Vec<usize>,
        /// Cap on the number of sampled images
        #[arg(long)]
        sample_size: Option<usize>,
    },

    /// Export padded patch crops for the external feature extractor
    Patches {
        images_root: PathBuf,
        /// Destination directory (must not exist yet)
        dst_dir: PathBuf,
        /// Annotations directory; defaults to the recognized folder search
        #[arg(long)]
        annotations_dir: Option<PathBuf>,
        /// Restrict to these class ids (repeatable)
        #[arg(long = "class", value_name = "CLASS_ID")]
        classes: Vec<usize>,
        /// Cap on the number of annotation files visited
        #[arg(long)]
        limit: Option<usize>,
        /// Normalized padding around each crop
        #[arg(long, default_value_t = CONFIG.patch_margin)]
        margin: f64,
        #[arg(long, default_value_t = CONFIG.patch_width)]
        width: u32,
        #[arg(long, default_value_t = CONFIG.patch_height)]
        height: u32,
    },

    /// Draw reported bounding boxes onto copies of their photos
    Draw {
        images_root: PathBuf,
        /// Destination directory (must not exist yet)
        dst_root: PathBuf,
        /// Space-separated detection report (photo name, class id, 4 corners)
        report: PathBuf,
    },

    /// Write zoom-transition frame sequences for a directory of stills
    ZoomFrames {
        images_root: PathBuf,
        /// Destination directory (must not exist yet)
        dst_dir: PathBuf,
        /// Per-frame zoom percentage, in (0, 100)
        #[arg(long, default_value_t = CONFIG.zoom_percent)]
        zoom_percent: f64,
        /// Intermediate frames per source image
        #[arg(long, default_value_t = CONFIG.zoom_steps)]
        steps: u32,
        /// Vertical focus of the zoom, normalized
        #[arg(long, default_value_t = 0.5)]
        y_centre: f64,
    },

    /// Score predictions against ground truth, per class
    Evaluate {
        images_root: PathBuf,
        truths_root: PathBuf,
        inferences_root: PathBuf,
        classes_json: PathBuf,
        /// Only report the first N class ids
        #[arg(long)]
        first_n: Option<usize>,
        /// Also write the per-image presence matrix as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Build a dataset document from a directory tree and register it
    Index {
        /// Dataset name in the registry
        name: String,
        classes_json: PathBuf,
        /// Root containing subset folders (mutually exclusive with --images-root)
        #[arg(long, conflicts_with = "images_root")]
        dataset_root: Option<PathBuf>,
        /// Single images folder treated as the sole subset
        #[arg(long)]
        images_root: Option<PathBuf>,
        /// Explicit ground-truth folder; otherwise each subset is searched
        #[arg(long)]
        ground_truths_root: Option<PathBuf>,
        #[arg(long)]
        val_inferences_root: Option<PathBuf>,
        #[arg(long)]
        train_inferences_root: Option<PathBuf>,
        /// Subset whose samples get the "candidate" tag
        #[arg(long)]
        candidate_subset: Option<String>,
        #[arg(long)]
        registry_root: Option<PathBuf>,
    },

    /// List registered datasets
    Datasets {
        #[arg(long)]
        registry_root: Option<PathBuf>,
    },

    /// Delete a registered dataset
    DeleteDataset {
        name: String,
        #[arg(long)]
        registry_root: Option<PathBuf>,
    },

    /// Merge a score export from the external framework into a dataset
    ImportScores {
        name: String,
        /// Score export JSON produced by the external framework
        scores_json: PathBuf,
        #[arg(long)]
        registry_root: Option<PathBuf>,
    },

    /// Open the labeling tool on suspicious samples, with the dataset browser alongside
    FindErrors {
        name: String,
        classes_json: PathBuf,
        /// Selection tag: mistakenness, error, eval_fp or eval_fn
        #[arg(long, default_value = "eval_fn")]
        tag: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
        /// Keep only samples carrying this ground-truth label
        #[arg(long)]
        label_filter: Option<String>,
        /// Also consider samples that were never evaluated
        #[arg(long)]
        include_unprocessed: bool,
        /// Executable used to edit labels
        #[arg(long, default_value_t = CONFIG.labeler_command.clone())]
        labeler: String,
        /// Dataset-browser UI address to open
        #[arg(long, default_value_t = CONFIG.viewer_url.clone())]
        viewer_url: String,
        #[arg(long)]
        registry_root: Option<PathBuf>,
    },
}

fn open_registry(registry_root: Option<PathBuf>) -> Result<DatasetRegistry, String> {
    DatasetRegistry::open(registry_root.unwrap_or_else(DatasetRegistry::default_root))
}

fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Mine {
            src_images_dir,
            annotations_dir,
            dst_dir,
            classes_json,
            lower_coefficient,
            upper_coefficient,
            horizon,
            wedge_apex,
            exclude_classes,
            copy_all,
        } => {
            let config = filter::FilterConfig {
                lower_threshold_coefficient: lower_coefficient,
                upper_threshold_coefficient: upper_coefficient,
                horizon_y: horizon,
                wedge_apex_y: wedge_apex,
                excluded_class_ids: exclude_classes.into_iter().collect(),
            };
            mine::extract_training_data(
                &src_images_dir,
                &annotations_dir,
                &dst_dir,
                &classes_json,
                &config,
                copy_all,
            )?;
            Ok(())
        }

        Command::Sample {
            src_images_dir,
            dst_dir,
            classes,
            sample_size,
        } => {
            let classes: HashSet<usize> = classes.into_iter().collect();
            copier::sample_by_classes(&classes, &src_images_dir, &dst_dir, sample_size)?;
            Ok(())
        }

        Command::Patches {
            images_root,
            dst_dir,
            annotations_dir,
            classes,
            limit,
            margin,
            width,
            height,
        } => {
            let options = patch::PatchExportOptions {
                margin,
                patch_width: width,
                patch_height: height,
                class_ids: if classes.is_empty() {
                    None
                } else {
                    Some(classes.into_iter().collect())
                },
                limit,
            };
            patch::export_patches(&images_root, annotations_dir.as_deref(), &dst_dir, &options)?;
            Ok(())
        }

        Command::Draw {
            images_root,
            dst_root,
            report,
        } => {
            visualize::draw_boxes_from_report(&images_root, &dst_root, &report)?;
            Ok(())
        }

        Command::ZoomFrames {
            images_root,
            dst_dir,
            zoom_percent,
            steps,
            y_centre,
        } => {
            visualize::write_zoom_sequence(&images_root, &dst_dir, zoom_percent, steps, y_centre)?;
            Ok(())
        }

        Command::Evaluate {
            images_root,
            truths_root,
            inferences_root,
            classes_json,
            first_n,
            csv,
        } => {
            let table = evaluate::analyse_model_binary_metrics(
                &images_root,
                &truths_root,
                &inferences_root,
                &classes_json,
                first_n,
                csv.as_deref(),
            )?;
            println!("{}", table);
            Ok(())
        }

        Command::Index {
            name,
            classes_json,
            dataset_root,
            images_root,
            ground_truths_root,
            val_inferences_root,
            train_inferences_root,
            candidate_subset,
            registry_root,
        } => {
            let class_list = ClassList::from_file(&classes_json)?;
            let options = BuildOptions {
                dataset_root,
                images_root,
                ground_truths_root,
                val_inferences_root,
                train_inferences_root,
                candidate_subset,
            };
            let dataset = registry::build_dataset(&name, &class_list, &options)?;
            open_registry(registry_root)?.save_dataset(&dataset)?;
            Ok(())
        }

        Command::Datasets { registry_root } => {
            let names = open_registry(registry_root)?.list_datasets();
            if names.is_empty() {
                println!("No datasets registered");
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
            Ok(())
        }

        Command::DeleteDataset {
            name,
            registry_root,
        } => open_registry(registry_root)?.delete_dataset(&name),

        Command::ImportScores {
            name,
            scores_json,
            registry_root,
        } => {
            let registry = open_registry(registry_root)?;
            let mut dataset = registry.load_dataset(&name)?;
            registry::import_scores(&mut dataset, &scores_json)?;
            registry.save_dataset(&dataset)
        }

        Command::FindErrors {
            name,
            classes_json,
            tag,
            limit,
            label_filter,
            include_unprocessed,
            labeler,
            viewer_url,
            registry_root,
        } => {
            let registry = open_registry(registry_root)?;
            let class_list = ClassList::from_file(&classes_json)?;
            let query = TagQuery {
                tag,
                limit,
                processed: !include_unprocessed,
                reverse: true,
                label_filter,
            };
            labeler::find_errors(&registry, &name, &class_list, &query, &labeler, &viewer_url)
        }
    }
}

fn main() {
    let log_buffer = file_io::setup_logger(APP_NAME);
    file_io::setup_panic_hook(APP_NAME, log_buffer);

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        error!("{}", e);
        std::process::exit(1);
    }
}
