//! Manifest builder: turns a flat recursive listing into the classified
//! tree stored with the published record.

use datapress_model::{classify_path, FileClass, FileNode, ObjectEntry};

/// Builds the classified tree from a raw listing.
///
/// Entries are ordered shallow-first so parents land before children;
/// within a depth the order is lexicographic, which also fixes sibling
/// order in the output. Entries whose path collapses to nothing are
/// dropped.
#[must_use]
pub fn build_tree(entries: &[ObjectEntry]) -> Vec<FileNode> {
    let mut ordered: Vec<&ObjectEntry> = entries
        .iter()
        .filter(|entry| depth_of(&entry.path) > 0)
        .collect();
    ordered.sort_by(|a, b| {
        depth_of(&a.path)
            .cmp(&depth_of(&b.path))
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut roots: Vec<FileNode> = Vec::new();
    for entry in ordered {
        insert_entry(&mut roots, entry);
    }
    roots
}

fn depth_of(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

fn insert_entry(roots: &mut Vec<FileNode>, entry: &ObjectEntry) {
    let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
    let mut level = roots;
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        let root_level = i == 0;
        let idx = match level.iter().position(|node| node.label == *segment) {
            Some(idx) => idx,
            None => {
                let node = if last && !entry.is_directory {
                    FileNode::file(*segment, classify_path(&entry.path))
                } else {
                    let mut folder = FileNode::folder(*segment);
                    folder.collapsed = root_level;
                    folder
                };
                level.push(node);
                level.len() - 1
            }
        };
        let node = &mut level[idx];
        if last {
            if entry.is_directory {
                node.classification = FileClass::Folder;
                if root_level {
                    node.collapsed = true;
                }
            } else if node.children.is_empty() {
                // Later duplicates win, but never at the cost of a
                // populated folder.
                node.classification = classify_path(&entry.path);
                node.collapsed = false;
            }
        } else if !node.is_folder() {
            node.classification = FileClass::Folder;
            if root_level {
                node.collapsed = true;
            }
        }
        level = &mut level[idx].children;
    }
}
