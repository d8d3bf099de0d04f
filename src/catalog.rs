//! CSV catalog: rows of `App` keys mapped to program paths or display names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::model::{
    Action, ActionKind, BuildReport, Diagnostic, MenuItem, MenuNode, MenuTree, TreeSource,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "App")]
    pub app: String,
    #[serde(rename = "AppPath", default)]
    pub app_path: Option<String>,
    #[serde(rename = "AppFullName", default)]
    pub app_full_name: Option<String>,
}

impl CatalogRow {
    fn display_name(&self) -> &str {
        self.app_full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.app)
    }

    fn program(&self) -> Option<&str> {
        self.app_path.as_deref().filter(|path| !path.is_empty())
    }
}

/// When a catalog row's program path is resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    /// `AppPath` is embedded in the action at build time.
    #[default]
    Direct,
    /// The action names the key and catalog; the path is looked up when the
    /// item is invoked, so the CSV can change without rebuilding the menu.
    Lookup,
}

pub fn build_from_csv(
    path: &Path,
    mode: CatalogMode,
    root_name: Option<&str>,
) -> Result<BuildReport, CatalogError> {
    let rows = read_rows(path)?;
    let name = root_name.map(str::to_string).unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "Catalog".into())
    });
    let catalog = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let mut processed = 0;
    let mut diagnostics = Vec::new();
    // last row per key, ignoring case, at the position of the first
    let mut kept: Vec<(u64, CatalogRow)> = Vec::new();
    for (line, row) in rows {
        processed += 1;
        let row = match row {
            Ok(row) if !row.app.is_empty() => row,
            Ok(_) => {
                diagnostics.push(Diagnostic::skipped(format!("line {line}"), "empty App key"));
                continue;
            }
            Err(err) => {
                diagnostics.push(Diagnostic::skipped(format!("line {line}"), err));
                continue;
            }
        };
        match kept
            .iter_mut()
            .find(|(_, existing)| existing.app.eq_ignore_ascii_case(&row.app))
        {
            Some(slot) => {
                diagnostics.push(Diagnostic::warning(
                    row.app.clone(),
                    format!("duplicate key on line {line} replaces the earlier one"),
                ));
                *slot = (line, row);
            }
            None => kept.push((line, row)),
        }
    }

    let mut root = MenuNode::new(name);
    for (line, row) in kept {
        let item = match mode {
            CatalogMode::Direct => {
                let Some(program) = row.program() else {
                    diagnostics.push(Diagnostic::skipped(row.app.clone(), "no AppPath"));
                    continue;
                };
                MenuItem::new(
                    row.app.clone(),
                    Action::new(ActionKind::RunProcess, program).with_source_extension("csv"),
                )
            }
            CatalogMode::Lookup => MenuItem::new(
                row.display_name(),
                Action::new(ActionKind::LaunchByName, catalog.to_string_lossy())
                    .with_arguments(row.app.clone())
                    .with_source_extension("csv"),
            ),
        };
        let item_name = item.name.clone();
        if let Err(err) = root.push_item(item) {
            diagnostics.push(Diagnostic::skipped(item_name, format!("line {line}: {err}")));
        }
    }

    for diagnostic in &diagnostics {
        tracing::warn!("{}: {diagnostic}", path.display());
    }
    let report = BuildReport {
        tree: MenuTree::new(root, TreeSource::Csv(path.to_path_buf())),
        processed,
        diagnostics,
    };
    tracing::info!("built menu from {}: {}", path.display(), report.summary());
    Ok(report)
}

/// Every row, duplicates included, stably sorted by key ignoring case.
pub fn list_catalog(path: &Path) -> Result<Vec<CatalogRow>, CatalogError> {
    let mut rows = Vec::new();
    for (line, row) in read_rows(path)? {
        match row {
            Ok(row) => rows.push(row),
            Err(err) => tracing::warn!("{} line {line}: {err}", path.display()),
        }
    }
    rows.sort_by_key(|row| row.app.to_lowercase());
    Ok(rows)
}

/// The last row whose key matches, ignoring case.
pub fn find_catalog_entry(path: &Path, key: &str) -> Result<Option<CatalogRow>, CatalogError> {
    let found = read_rows(path)?
        .into_iter()
        .filter_map(|(_, row)| row.ok())
        .filter(|row| row.app.eq_ignore_ascii_case(key))
        .last();
    Ok(found)
}

/// Resolves a key to the program recorded for it right now.
pub fn lookup_program(path: &Path, key: &str) -> Result<String, CatalogError> {
    find_catalog_entry(path, key)?
        .and_then(|row| row.program().map(str::to_string))
        .ok_or_else(|| CatalogError::UnknownCatalogKey {
            key: key.to_string(),
            catalog: PathBuf::from(path),
        })
}

type Rows = Vec<(u64, Result<CatalogRow, csv::Error>)>;

/// Rows paired with their line number in the file.
fn read_rows(path: &Path) -> Result<Rows, CatalogError> {
    if !path.is_file() {
        return Err(CatalogError::FileNotFound(path.to_path_buf()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                rows.push((line, record.deserialize(Some(&headers))));
            }
            Err(err) => {
                let line = err.position().map(|pos| pos.line()).unwrap_or_default();
                rows.push((line, Err(err)));
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiagnosticKind;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn direct_mode_embeds_paths() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(
            &dir,
            "apps.csv",
            concat!(
                "App,AppPath\n",
                "notepad,C:\\Windows\\notepad.exe\n",
                "calc, C:\\Windows\\calc.exe \n",
                "broken,\n",
            ),
        );
        let report = build_from_csv(&csv, CatalogMode::Direct, None).unwrap();
        let root = &report.tree.root;
        assert_eq!(root.name(), "apps");
        assert_eq!(root.items().len(), 2);
        assert_eq!(root.item("calc").unwrap().action.program(), "C:\\Windows\\calc.exe");
        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn lookup_mode_defers_resolution() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(
            &dir,
            "apps.csv",
            "App,AppPath,AppFullName\ned,/usr/bin/ed,Line Editor\n",
        );
        let report = build_from_csv(&csv, CatalogMode::Lookup, Some("Apps")).unwrap();
        let item = report.tree.root.item("Line Editor").unwrap();
        assert_eq!(item.action.kind(), ActionKind::LaunchByName);
        assert_eq!(item.action.arguments(), Some("ed"));

        // the catalog changes after the menu was built
        fs::write(&csv, "App,AppPath,AppFullName\ned,/opt/ed/bin/ed,Line Editor\n").unwrap();
        let catalog = Path::new(item.action.program());
        assert_eq!(lookup_program(catalog, "ed").unwrap(), "/opt/ed/bin/ed");
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(
            &dir,
            "apps.csv",
            "App,AppPath\nzip,/old/zip\nAwk,/usr/bin/awk\nzip,/new/zip\n",
        );
        let report = build_from_csv(&csv, CatalogMode::Direct, None).unwrap();
        assert_eq!(report.tree.root.items().len(), 2);
        assert_eq!(report.tree.root.item("zip").unwrap().action.program(), "/new/zip");
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Warning && d.subject == "zip"));

        let found = find_catalog_entry(&csv, "ZIP").unwrap().unwrap();
        assert_eq!(found.app_path.as_deref(), Some("/new/zip"));

        let keys: Vec<String> = list_catalog(&csv)
            .unwrap()
            .into_iter()
            .map(|row| row.app)
            .collect();
        assert_eq!(keys, vec!["Awk", "zip", "zip"]);
    }

    #[test]
    fn missing_file_aborts() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("none.csv");
        let err = build_from_csv(&missing, CatalogMode::Direct, None).unwrap_err();
        assert!(matches!(err, CatalogError::FileNotFound(_)));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(&dir, "apps.csv", "App,AppPath\nvim,/usr/bin/vim\n");
        let err = lookup_program(&csv, "emacs").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownCatalogKey { .. }));
    }

    #[test]
    fn lookup_duplicates_are_keyed_by_app() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(
            &dir,
            "apps.csv",
            "App,AppPath,AppFullName\ned,/bin/ed,Old Editor\nED,/usr/bin/ed,Line Editor\n",
        );
        let report = build_from_csv(&csv, CatalogMode::Lookup, None).unwrap();
        let root = &report.tree.root;
        assert_eq!(root.items().len(), 1);
        assert_eq!(root.items()[0].name, "Line Editor");
        assert_eq!(root.items()[0].action.arguments(), Some("ED"));
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Warning && d.subject == "ED"));
    }
}
