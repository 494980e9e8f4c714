// Label list handling for the classification model

use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Load class labels from a newline-separated file, falling back to
/// synthetic `class_<i>` names when the file is absent or unreadable.
pub fn load_labels(path: &str, default_count: usize) -> Vec<String> {
    if Path::new(path).exists() {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let labels: Vec<String> = contents
                    .lines()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
                    .collect();
                if !labels.is_empty() {
                    info!("Loaded {} class labels from {}", labels.len(), path);
                    return labels;
                }
                warn!("Labels file {} is empty, using synthetic labels", path);
            }
            Err(e) => {
                warn!("Failed to read labels file {}: {}, using synthetic labels", path, e);
            }
        }
    } else {
        warn!("Labels file not found at {}, using synthetic labels", path);
    }

    (0..default_count).map(|i| format!("class_{}", i)).collect()
}

/// Map a raw model index to its label, substituting a synthetic name when
/// the index falls outside the known list.
pub fn label_for_index(labels: &[String], index: usize) -> String {
    labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("unknown_class_{}", index))
}
