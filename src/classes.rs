/// Class list file parser
///
/// The class list is an external collaborator file (JSON) mapping class ids
/// to class names and per-class production confidence thresholds. It is
/// treated as opaque input: parsed, never produced.
use std::collections::HashMap;
use std::path::Path;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassInfo {
    pub name: String,
    /// Minimum probability threshold used in production for this class.
    pub threshold: f64,
}

/// The parsed class list, keyed by class id.
#[derive(Debug, Clone)]
pub struct ClassList {
    classes: HashMap<usize, ClassInfo>,
}

impl ClassList {
    /// Parse a class list JSON file: `{"<class_id>": {"name": ..., "threshold": ...}, ...}`
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read class list file {}: {}", path.display(), e))?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, String> {
        let raw: HashMap<String, ClassInfo> = serde_json::from_str(content)
            .map_err(|e| format!("Failed to parse class list JSON: {}", e))?;

        let mut classes = HashMap::new();
        for (key, info) in raw {
            let id: usize = key
                .parse()
                .map_err(|_| format!("Class list key is not an integer id: {:?}", key))?;
            classes.insert(id, info);
        }
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    #[allow(dead_code)]
    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.classes.get(&class_id).map(|c| c.name.as_str())
    }

    /// Class name for display, with an "Unknown" fallback for ids the
    /// collaborator file does not know about.
    pub fn name_or_unknown(&self, class_id: usize) -> String {
        self.classes
            .get(&class_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Unknown ({})", class_id))
    }

    #[allow(dead_code)]
    pub fn threshold(&self, class_id: usize) -> Option<f64> {
        self.classes.get(&class_id).map(|c| c.threshold)
    }

    /// `class_id -> production threshold` for the geometric filter.
    pub fn thresholds(&self) -> HashMap<usize, f64> {
        self.classes
            .iter()
            .map(|(&id, info)| (id, info.threshold))
            .collect()
    }

    /// Class names ordered by class id, as the external labeling tool
    /// expects them on its command line.
    pub fn names_in_id_order(&self) -> Vec<String> {
        let mut ids: Vec<usize> = self.classes.keys().copied().collect();
        ids.sort_unstable();
        ids.iter()
            .map(|id| self.classes[id].name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "0": {"name": "WS", "threshold": 0.35},
        "1": {"name": "CD", "threshold": 0.5},
        "12": {"name": "LT", "threshold": 0.4}
    }"#;

    #[test]
    fn test_parse_class_list() {
        let classes = ClassList::from_str(SAMPLE).unwrap();
        assert_eq!(classes.len(), 3);
        assert_eq!(classes.name(1), Some("CD"));
        assert_eq!(classes.threshold(12), Some(0.4));
        assert_eq!(classes.threshold(99), None);
    }

    #[test]
    fn test_names_in_id_order() {
        let classes = ClassList::from_str(SAMPLE).unwrap();
        assert_eq!(classes.names_in_id_order(), vec!["WS", "CD", "LT"]);
    }

    #[test]
    fn test_unknown_fallback() {
        let classes = ClassList::from_str(SAMPLE).unwrap();
        assert_eq!(classes.name_or_unknown(7), "Unknown (7)");
    }

    #[test]
    fn test_non_integer_key_rejected() {
        assert!(ClassList::from_str(r#"{"abc": {"name": "X", "threshold": 0.1}}"#).is_err());
    }
}
