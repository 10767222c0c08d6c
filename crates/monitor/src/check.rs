//! Pre-flight check of model and sound files

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::settings::MonitorSettings;

/// One file the monitor looks for at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub description: String,
    pub path: PathBuf,
    pub found: bool,
    /// A missing required file prevents camera sessions
    pub required: bool,
}

impl CheckItem {
    fn new(description: impl Into<String>, path: &Path, required: bool) -> Self {
        Self {
            description: description.into(),
            path: path.to_path_buf(),
            found: path.is_file(),
            required,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.required && !self.found
    }
}

/// Look up every configured file
pub fn run_checks(settings: &MonitorSettings) -> Vec<CheckItem> {
    let mut items = vec![CheckItem::new("Region detector", &settings.models.region_detector, true)];

    for (i, path) in settings.models.eye_classifiers.iter().enumerate() {
        items.push(CheckItem::new(format!("Eye classifier candidate {}", i + 1), path, false));
    }

    items.push(CheckItem::new("Drowsiness alarm sound", &settings.alerts.drowsiness_cue, false));
    items.push(CheckItem::new("Absence alarm sound", &settings.alerts.absence_cue, false));
    items
}

/// Print the check table. Returns `true` when nothing required is missing.
pub fn report(items: &[CheckItem], mut writer: impl Write) -> std::io::Result<bool> {
    for item in items {
        let mark = match (item.found, item.required) {
            (true, _) => "ok",
            (false, true) => "MISSING",
            (false, false) => "missing (optional)",
        };
        writeln!(writer, "{:<28} {:<20} {}", item.description, mark, item.path.display())?;
    }

    let classifier_found = items
        .iter()
        .any(|item| item.description.starts_with("Eye classifier") && item.found);
    if !classifier_found {
        writeln!(writer, "No eye classifier found; the detection-dropout heuristic will be used")?;
    }

    let ready = !items.iter().any(CheckItem::is_blocking);
    writeln!(writer, "{}", if ready { "Ready" } else { "Not ready" })?;
    Ok(ready)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_detector_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = MonitorSettings::default();
        settings.models.region_detector = dir.path().join("detector.onnx");
        settings.models.eye_classifiers = vec![dir.path().join("cnn.onnx")];

        let items = run_checks(&settings);
        assert_eq!(items.len(), 4);

        let mut out = Vec::new();
        assert!(!report(&items, &mut out).unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("MISSING"));
        assert!(text.contains("detection-dropout heuristic"));
    }

    #[test]
    fn test_optional_files_do_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let detector = dir.path().join("detector.onnx");
        std::fs::write(&detector, b"onnx").unwrap();

        let mut settings = MonitorSettings::default();
        settings.models.region_detector = detector;
        settings.models.eye_classifiers.clear();
        settings.alerts.drowsiness_cue = dir.path().join("alarm2.wav");

        let mut out = Vec::new();
        assert!(report(&run_checks(&settings), &mut out).unwrap());
    }
}
