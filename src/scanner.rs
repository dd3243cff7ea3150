//! Directory scanner.
//!
//! Walks a source tree and lazily yields the files whose extension is
//! wanted. Excluded directories (`vendor`, `node_modules`, ...) are pruned
//! from the walk itself, so nothing beneath them is ever opened.

use std::collections::HashSet;
use std::path::{Component, Path};

use walkdir::{DirEntry, WalkDir};

use crate::models::SourceFile;

/// Scan settings, normalised for matching.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    excluded: HashSet<String>,
    extensions: HashSet<String>,
}

impl ScanFilter {
    /// Extensions may be given with or without the leading dot.
    pub fn new<E, X>(excluded_subtrees: E, extensions: X) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        X: IntoIterator,
        X::Item: AsRef<str>,
    {
        Self {
            excluded: excluded_subtrees
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
            extensions: extensions
                .into_iter()
                .map(|s| s.as_ref().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    /// True if any component of `relative` names an excluded subtree.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .map(|n| self.excluded.contains(n))
                .unwrap_or(false),
            _ => false,
        })
    }

    pub fn wants_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(e))
            .unwrap_or(false)
    }
}

/// Lazy walk over eligible files. Created by [`scan`].
pub struct Scan {
    root: std::path::PathBuf,
    filter: ScanFilter,
    walker: walkdir::FilterEntry<walkdir::IntoIter, Box<dyn FnMut(&DirEntry) -> bool + Send>>,
}

/// Start walking `root`.
///
/// Entries are visited in file-name order within each directory. Nothing
/// is read until the iterator is advanced.
pub fn scan(root: &Path, filter: ScanFilter) -> Scan {
    let prune_root = root.to_path_buf();
    let prune_filter = filter.clone();
    let prune: Box<dyn FnMut(&DirEntry) -> bool + Send> = Box::new(move |entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let relative = entry.path().strip_prefix(&prune_root).unwrap_or(entry.path());
        if prune_filter.is_excluded(relative) {
            tracing::debug!(path = %entry.path().display(), "skipping excluded directory");
            return false;
        }
        true
    });

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(prune);

    Scan {
        root: root.to_path_buf(),
        filter,
        walker,
    }
}

impl Iterator for Scan {
    type Item = SourceFile;

    fn next(&mut self) -> Option<SourceFile> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot walk entry, skipping");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if self.filter.is_excluded(relative) {
                tracing::debug!(path = %path.display(), "skipping excluded path");
                continue;
            }
            if !self.filter.wants_extension(path) {
                continue;
            }

            match std::fs::read_to_string(path) {
                Ok(content) => {
                    return Some(SourceFile {
                        path: path.to_path_buf(),
                        content,
                    })
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read file, skipping");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("app/models")).unwrap();
        fs::create_dir_all(root.join("vendor/gems")).unwrap();
        fs::create_dir_all(root.join("lib/node_modules/pkg")).unwrap();
        fs::write(root.join("app/models/user.rb"), "class User; end\n").unwrap();
        fs::write(root.join("app/models/user.py"), "class User: pass\n").unwrap();
        fs::write(root.join("a.rb"), "puts 1\n").unwrap();
        fs::write(root.join("vendor/gems/gem.rb"), "module Gem; end\n").unwrap();
        fs::write(root.join("lib/node_modules/pkg/x.rb"), "x = 1\n").unwrap();
        tmp
    }

    fn names(tmp: &TempDir, filter: ScanFilter) -> Vec<String> {
        scan(tmp.path(), filter)
            .map(|f| {
                f.path
                    .strip_prefix(tmp.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn yields_only_wanted_extensions() {
        let tmp = tree();
        let found = names(&tmp, ScanFilter::new(["vendor", "node_modules"], [".rb"]));
        assert_eq!(found, vec!["a.rb", "app/models/user.rb"]);
    }

    #[test]
    fn extension_without_dot_matches() {
        let tmp = tree();
        let found = names(&tmp, ScanFilter::new(["vendor", "node_modules"], ["py"]));
        assert_eq!(found, vec!["app/models/user.py"]);
    }

    #[test]
    fn excluded_subtrees_never_yielded() {
        let tmp = tree();
        let found = names(&tmp, ScanFilter::new(["vendor", "node_modules"], [".rb"]));
        assert!(found.iter().all(|p| !p.contains("vendor")));
        assert!(found.iter().all(|p| !p.contains("node_modules")));
    }

    #[test]
    fn exclusion_matches_whole_components_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("builder")).unwrap();
        fs::write(tmp.path().join("builder/b.rb"), "b").unwrap();
        let found = names(&tmp, ScanFilter::new(["build"], [".rb"]));
        assert_eq!(found, vec!["builder/b.rb"]);
    }

    #[test]
    fn yields_full_content() {
        let tmp = tree();
        let files: Vec<SourceFile> =
            scan(tmp.path(), ScanFilter::new(Vec::<String>::new(), [".rb"])).collect();
        let a = files.iter().find(|f| f.path.ends_with("a.rb")).unwrap();
        assert_eq!(a.content, "puts 1\n");
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn non_utf8_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.rb"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        fs::write(tmp.path().join("good.rb"), "ok").unwrap();
        let found = names(&tmp, ScanFilter::new(Vec::<String>::new(), [".rb"]));
        assert_eq!(found, vec!["good.rb"]);
    }

    #[test]
    fn is_lazy_and_rewalks() {
        let tmp = tree();
        let filter = ScanFilter::new(["vendor", "node_modules"], [".rb"]);
        let mut first = scan(tmp.path(), filter.clone());
        assert!(first.next().is_some());
        fs::write(tmp.path().join("z.rb"), "late").unwrap();
        assert_eq!(scan(tmp.path(), filter).count(), 3);
    }
}
