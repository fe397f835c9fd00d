use serde::{Deserialize, Serialize};
use std::fmt;

/// Category badge attached to manifest entries, derived from the file
/// extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    Tabular,
    Structured,
    Spreadsheet,
    Text,
    Archive,
    Imaging,
    Generic,
    Folder,
}

impl FileClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FileClass::Tabular => "tabular",
            FileClass::Structured => "structured",
            FileClass::Spreadsheet => "spreadsheet",
            FileClass::Text => "text",
            FileClass::Archive => "archive",
            FileClass::Imaging => "imaging",
            FileClass::Generic => "generic",
            FileClass::Folder => "folder",
        }
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed extension table, constructed once and never mutated.
const EXTENSION_CLASSES: [(&str, FileClass); 9] = [
    ("csv", FileClass::Tabular),
    ("tsv", FileClass::Tabular),
    ("json", FileClass::Structured),
    ("xlsx", FileClass::Spreadsheet),
    ("xls", FileClass::Spreadsheet),
    ("md", FileClass::Text),
    ("txt", FileClass::Text),
    ("zip", FileClass::Archive),
    ("dcm", FileClass::Imaging),
];

/// Classifies a file name by its lowercase extension; unmatched names and
/// extension-less names are generic.
#[must_use]
pub fn classify_path(name: &str) -> FileClass {
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => return FileClass::Generic,
    };
    EXTENSION_CLASSES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map_or(FileClass::Generic, |(_, class)| *class)
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One node of the stored file manifest tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileNode {
    pub label: String,
    pub classification: FileClass,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
    /// Display hint carried only by root-level directories.
    #[serde(default, skip_serializing_if = "is_false")]
    pub collapsed: bool,
}

impl FileNode {
    #[must_use]
    pub fn file(label: impl Into<String>, classification: FileClass) -> Self {
        Self {
            label: label.into(),
            classification,
            children: Vec::new(),
            collapsed: false,
        }
    }

    #[must_use]
    pub fn folder(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            classification: FileClass::Folder,
            children: Vec::new(),
            collapsed: false,
        }
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.classification == FileClass::Folder
    }
}
