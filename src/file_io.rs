use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::ffi::OsStr;

#[allow(unused_imports)]
use log::{Level, debug, info, warn, error};

use std::panic;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;
use env_logger::fmt::Color;
use log::{LevelFilter, Metadata, Record};
use backtrace::Backtrace;
use image::{DynamicImage, ImageDecoder, ImageReader};

/// Recognized annotation folder names, in preference order. When both exist
/// in a subset folder the first match wins.
pub const ANNOTATION_FOLDER_NAMES: [&str; 2] = ["labels", "YOLO_darknet"];

/// Folder name filtered annotations are written under in a destination tree.
pub const ANNOTATIONS_OUTPUT_FOLDER: &str = "YOLO_darknet";

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.is_file()).unwrap_or(false)
}

pub fn is_directory(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.is_dir()).unwrap_or(false)
}

/// Fail fast with an error naming the missing path.
pub fn require_dir(path: &Path, what: &str) -> Result<(), String> {
    if !is_directory(path) {
        return Err(format!("{} does not exist: {}", what, path.display()));
    }
    Ok(())
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn get_image_paths(directory_path: &Path) -> Vec<PathBuf> {
    let mut image_paths: Vec<PathBuf> = Vec::new();

    if let Ok(paths) = fs::read_dir(directory_path) {
        for entry in paths.flatten() {
            if has_image_extension(&entry.path()) {
                image_paths.push(entry.path());
            }
        }
    }

    // Sort paths like Nautilus file viewer. `image_paths.sort()` does not work as expected
    alphanumeric_sort::sort_path_slice(&mut image_paths);
    image_paths
}

/// Recursive variant of [`get_image_paths`], sorted the same way.
pub fn get_image_paths_recursive(root: &Path) -> Vec<PathBuf> {
    let mut image_paths = Vec::new();
    collect_images(root, &mut image_paths);
    alphanumeric_sort::sort_path_slice(&mut image_paths);
    image_paths
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_images(&path, out);
            } else if has_image_extension(&path) {
                out.push(path);
            }
        }
    }
}

/// Locate the image for an annotation stem, trying each recognized image
/// extension in order.
pub fn find_image_for_stem(images_dir: &Path, stem: &str) -> Option<PathBuf> {
    for ext in IMAGE_EXTENSIONS {
        let candidate = images_dir.join(format!("{}.{}", stem, ext));
        if is_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Find the annotations root within a subset folder.
///
/// Searches the recognized folder names in preference order; if none exists
/// the annotations are assumed to sit side by side with the images and the
/// subset folder itself is returned.
pub fn find_annotations_dir(subset_folder: &Path) -> PathBuf {
    for name in ANNOTATION_FOLDER_NAMES {
        let candidate = subset_folder.join(name);
        if is_directory(&candidate) {
            return candidate;
        }
    }
    subset_folder.to_path_buf()
}

/// Sorted list of the annotation `.txt` files in a directory.
pub fn get_annotation_paths(annotations_dir: &Path) -> Result<Vec<PathBuf>, String> {
    require_dir(annotations_dir, "Annotations directory")?;
    let mut paths: Vec<PathBuf> = fs::read_dir(annotations_dir)
        .map_err(|e| format!("Failed to read {}: {}", annotations_dir.display(), e))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(OsStr::to_str) == Some("txt"))
        .collect();
    alphanumeric_sort::sort_path_slice(&mut paths);
    Ok(paths)
}

/// Decode an image from disk with its EXIF orientation applied.
///
/// Falls back to a plain decode for formats that do not expose a decoder
/// interface.
pub fn load_image_oriented(path: &Path) -> Result<DynamicImage, String> {
    let reader = ImageReader::open(path)
        .map_err(|e| format!("Failed to open image {}: {}", path.display(), e))?
        .with_guessed_format()
        .map_err(|e| format!("Failed to guess format of {}: {}", path.display(), e))?;

    match reader.into_decoder() {
        Ok(mut decoder) => {
            let orientation = decoder
                .orientation()
                .unwrap_or(image::metadata::Orientation::NoTransforms);
            let mut img = DynamicImage::from_decoder(decoder)
                .map_err(|e| format!("Failed to decode image {}: {}", path.display(), e))?;
            if orientation != image::metadata::Orientation::NoTransforms {
                debug!("Applying EXIF orientation {:?} to {}", orientation, path.display());
                img.apply_orientation(orientation);
            }
            Ok(img)
        }
        Err(_) => image::open(path)
            .map_err(|e| format!("Failed to decode image {}: {}", path.display(), e)),
    }
}

const MAX_LOG_LINES: usize = 1000;

struct BufferLogger {
    log_buffer: Arc<Mutex<VecDeque<String>>>,
}

impl BufferLogger {
    fn new() -> Self {
        Self {
            log_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES))),
        }
    }

    fn log_to_buffer(&self, message: &str, target: &str) {
        if target.starts_with("boxwrangle") {
            let mut buffer = self.log_buffer.lock().unwrap();
            if buffer.len() == MAX_LOG_LINES {
                buffer.pop_front();
            }
            buffer.push_back(message.to_string());
        }
    }

    fn get_shared_buffer(&self) -> Arc<Mutex<VecDeque<String>>> {
        Arc::clone(&self.log_buffer)
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("boxwrangle") && metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("{:<5} {}", record.level(), record.args());
            self.log_to_buffer(&message, record.target());
        }
    }

    fn flush(&self) {}
}

struct CompositeLogger {
    console_logger: env_logger::Logger,
    buffer_logger: BufferLogger,
}

impl log::Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_logger.enabled(metadata) || self.buffer_logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console_logger.enabled(record.metadata()) {
            self.console_logger.log(record);
        }
        if self.buffer_logger.enabled(record.metadata()) {
            self.buffer_logger.log(record);
        }
    }

    fn flush(&self) {
        self.console_logger.flush();
        self.buffer_logger.flush();
    }
}

pub fn setup_logger(_app_name: &str) -> Arc<Mutex<VecDeque<String>>> {
    let buffer_logger = BufferLogger::new();
    let shared_buffer = buffer_logger.get_shared_buffer();

    let mut builder = env_logger::Builder::new();
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else if cfg!(debug_assertions) {
        builder.filter(Some("boxwrangle"), LevelFilter::Debug);
    } else {
        builder.filter(Some("boxwrangle"), LevelFilter::Info);
    }

    builder.filter(None, LevelFilter::Off);

    builder.format(|buf, record| {
        let mut style = buf.style();
        match record.level() {
            Level::Error => style.set_color(Color::Red),
            Level::Warn => style.set_color(Color::Yellow),
            Level::Info => style.set_color(Color::Green),
            Level::Debug => style.set_color(Color::Blue),
            Level::Trace => style.set_color(Color::White),
        };
        writeln!(buf, "{:<5} {}", style.value(record.level()), record.args())
    });

    let console_logger = builder.build();

    let composite_logger = CompositeLogger {
        console_logger,
        buffer_logger,
    };

    log::set_boxed_logger(Box::new(composite_logger)).expect("Failed to set logger");
    log::set_max_level(LevelFilter::Trace);

    shared_buffer
}

pub fn get_log_directory(app_name: &str) -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(app_name).join("logs")
}

pub fn setup_panic_hook(app_name: &str, log_buffer: Arc<Mutex<VecDeque<String>>>) {
    let log_file_path = get_log_directory(app_name).join("panic.log");
    std::fs::create_dir_all(log_file_path.parent().unwrap()).expect("Failed to create log directory");

    panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::new();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_file_path)
            .expect("Failed to open panic log file");

        writeln!(file, "Panic occurred: {}", info).expect("Failed to write panic info");
        writeln!(file, "Backtrace:\n{:?}\n", backtrace).expect("Failed to write backtrace");

        writeln!(file, "Last {} log entries:\n", MAX_LOG_LINES).expect("Failed to write log header");

        let buffer = log_buffer.lock().unwrap();
        for log in buffer.iter() {
            writeln!(file, "{}", log).expect("Failed to write log entry");
        }

        eprintln!("\n\nPanic occurred: {}", info);
        eprintln!("A crash log has been written to: {}", log_file_path.display());
    }));
}
