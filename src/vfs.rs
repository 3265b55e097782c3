// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Synthetic read-only filesystem served to intruders.
//!
//! [`VirtualFilesystem`] is two lookup tables (directory listings and file
//! contents) plus a set of protected paths that always read as denied. It is
//! built once from [`FilesystemConfig`] at startup and shared across all
//! sessions behind an `Arc`. Paths are opaque strings: nothing here
//! normalises `..` or trailing slashes.

use std::collections::{HashMap, HashSet};

use crate::config::FilesystemConfig;

/// Immutable directory/file tables backing `ls`, `cd` and `cat`.
#[derive(Debug, Clone)]
pub struct VirtualFilesystem {
    directories: HashMap<String, Vec<String>>,
    files: HashMap<String, String>,
    protected: HashSet<String>,
    denial_message: String,
}

impl VirtualFilesystem {
    pub fn from_config(config: &FilesystemConfig) -> Self {
        Self {
            directories: config.directories.iter()
                .map(|(path, children)| (path.clone(), children.clone()))
                .collect(),
            files: config.files.iter()
                .map(|(path, content)| (path.clone(), content.clone()))
                .collect(),
            protected: config.protected.iter().cloned().collect(),
            denial_message: config.denial_message.clone(),
        }
    }

    /// Children of `path` in configured order. Unknown paths list as empty.
    pub fn list_directory(&self, path: &str) -> &[String] {
        self.directories.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `path` is a known directory key (the only valid `cd` targets).
    pub fn is_directory(&self, path: &str) -> bool {
        self.directories.contains_key(path)
    }

    /// Configured content for `path`, or `None` when the table has no entry.
    pub fn read_file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Protected paths answer `cat` with a denial even if content exists.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.contains(path)
    }

    /// What `cat` prints for protected or unknown files.
    pub fn denial_message(&self) -> &str {
        &self.denial_message
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn default_fs() -> VirtualFilesystem {
        VirtualFilesystem::from_config(&FilesystemConfig::default())
    }

    #[test]
    fn test_root_listing_keeps_configured_order() {
        let fs = default_fs();
        assert_eq!(fs.list_directory("/"), ["bin", "etc", "home", "var"]);
    }

    #[test]
    fn test_unknown_directory_lists_empty() {
        let fs = default_fs();
        assert!(fs.list_directory("/nonexistent").is_empty());
        assert!(!fs.is_directory("/nonexistent"));
    }

    #[test]
    fn test_paths_are_opaque() {
        let fs = default_fs();
        assert!(fs.is_directory("/home"));
        assert!(!fs.is_directory("/home/"));
        assert!(!fs.is_directory("/home/admin/.."));
    }

    #[test]
    fn test_read_file_hit_and_miss() {
        let fs = default_fs();
        assert_eq!(fs.read_file("/home/admin/notes.txt"), Some("TODO: rotate SSH keys"));
        assert_eq!(fs.read_file("/etc/hostname"), None);
    }

    #[test]
    fn test_shadow_is_protected() {
        let fs = default_fs();
        assert!(fs.is_protected("/etc/shadow"));
        assert!(!fs.is_protected("/etc/passwd"));
    }

    #[test]
    fn test_custom_tables() {
        let config = FilesystemConfig {
            protected: vec![],
            denial_message: "Permission denied".to_string(),
            directories: BTreeMap::from([("/opt".to_string(), vec!["app".to_string()])]),
            files: BTreeMap::from([("/opt/app".to_string(), "binary".to_string())]),
        };
        let fs = VirtualFilesystem::from_config(&config);
        assert_eq!(fs.directory_count(), 1);
        assert_eq!(fs.file_count(), 1);
        assert_eq!(fs.list_directory("/opt"), ["app"]);
        assert!(fs.list_directory("/").is_empty());
    }
}
