//! Builds a menu tree from a directory: subdirectories become groups, files
//! become items.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;
use crate::model::{BuildReport, Diagnostic, MenuItem, MenuNode, MenuTree, TreeSource};
use crate::resolver::{ActionResolver, FsEntry};

pub struct MenuTreeBuilder<'a> {
    resolver: ActionResolver<'a>,
}

#[derive(Default)]
struct Walk {
    /// Canonical paths of the directories currently being walked, root first.
    ancestors: Vec<PathBuf>,
    processed: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> MenuTreeBuilder<'a> {
    pub fn new(resolver: ActionResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Fails only when `root` is not a directory. Entries that cannot be
    /// resolved are left out and listed in the report.
    pub fn build(&self, root: &Path, root_name: Option<&str>) -> Result<BuildReport, CatalogError> {
        if !root.is_dir() {
            return Err(CatalogError::DirectoryNotFound(root.to_path_buf()));
        }
        let name = root_name
            .map(str::to_string)
            .unwrap_or_else(|| final_segment(root));

        let mut walk = Walk::default();
        walk.ancestors
            .push(root.canonicalize().unwrap_or_else(|_| root.to_path_buf()));
        let entries = sorted_entries(root)?;
        let node = self.build_node(root, name, entries, &mut walk);

        let report = BuildReport {
            tree: MenuTree::new(node, TreeSource::Directory(root.to_path_buf())),
            processed: walk.processed,
            diagnostics: walk.diagnostics,
        };
        tracing::info!("built menu from {}: {}", root.display(), report.summary());
        Ok(report)
    }

    fn build_node(
        &self,
        dir: &Path,
        name: String,
        entries: Vec<PathBuf>,
        walk: &mut Walk,
    ) -> MenuNode {
        let mut node = MenuNode::new(name);
        for path in entries {
            if path.is_dir() {
                if let Some(group) = self.build_subdirectory(&path, walk) {
                    if let Err(err) = node.push_group(group) {
                        skip(walk, &path, err);
                    }
                }
            } else if path.is_file() {
                walk.processed += 1;
                let entry = FsEntry::new(&path);
                match self.resolver.resolve(&entry) {
                    Ok(action) => {
                        if let Err(err) = node.push_item(MenuItem::new(entry.name(), action)) {
                            skip(walk, &path, err);
                        }
                    }
                    Err(err) => skip(walk, &path, err),
                }
            } else {
                tracing::debug!("ignoring {} in {}", path.display(), dir.display());
            }
        }
        node
    }

    fn build_subdirectory(&self, dir: &Path, walk: &mut Walk) -> Option<MenuNode> {
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        if walk.ancestors.contains(&canonical) {
            let diagnostic = Diagnostic::warning(
                dir.display().to_string(),
                "links back to an enclosing directory",
            );
            tracing::warn!("{diagnostic}");
            walk.diagnostics.push(diagnostic);
            return None;
        }
        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(err) => {
                let diagnostic = Diagnostic::warning(dir.display().to_string(), err);
                tracing::warn!("{diagnostic}");
                walk.diagnostics.push(diagnostic);
                Vec::new()
            }
        };
        walk.ancestors.push(canonical);
        let node = self.build_node(dir, final_segment(dir), entries, walk);
        walk.ancestors.pop();
        Some(node)
    }
}

fn skip(walk: &mut Walk, path: &Path, reason: impl std::fmt::Display) {
    let diagnostic = Diagnostic::skipped(path.display().to_string(), reason);
    tracing::warn!("skipping {diagnostic}");
    walk.diagnostics.push(diagnostic);
}

/// Directory listing sorted by file name, so builds are deterministic.
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(entries)
}

fn final_segment(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
