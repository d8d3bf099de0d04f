//! Persistence of menus into a namespaced key/value store.
//!
//! Each item becomes one value holding its action record, plus an optional
//! `<name>_ShKey` value holding its shortcut key. The format is flat: nested
//! groups are flattened on export.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, StoreError};
use crate::model::{Action, BuildReport, Diagnostic, MenuItem, MenuNode, MenuTree, TreeSource};

pub const SHORTCUT_SUFFIX: &str = "_ShKey";

/// A hierarchy of namespaces, each holding named string values.
pub trait KeyValueStore {
    fn namespace_exists(&self, namespace: &str) -> Result<bool, StoreError>;
    fn create_namespace(&mut self, namespace: &str) -> Result<(), StoreError>;
    fn value_names(&self, namespace: &str) -> Result<Vec<String>, StoreError>;
    fn get_value(&self, namespace: &str, name: &str) -> Result<Option<String>, StoreError>;
    fn set_value(&mut self, namespace: &str, name: &str, value: &str) -> Result<(), StoreError>;
    fn delete_value(&mut self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

fn namespace_segments(namespace: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = namespace.split(['/', '\\']).collect();
    if segments
        .iter()
        .any(|segment| segment.trim().is_empty() || *segment == "." || *segment == "..")
    {
        return Err(StoreError::InvalidNamespace(namespace.to_string()));
    }
    Ok(segments)
}

fn canonical_namespace(namespace: &str) -> Result<String, StoreError> {
    Ok(namespace_segments(namespace)?.join("/"))
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values_mut(&mut self, namespace: &str) -> Result<&mut BTreeMap<String, String>, StoreError> {
        let key = canonical_namespace(namespace)?;
        self.namespaces
            .get_mut(&key)
            .ok_or_else(|| StoreError::InvalidNamespace(namespace.to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn namespace_exists(&self, namespace: &str) -> Result<bool, StoreError> {
        Ok(self.namespaces.contains_key(&canonical_namespace(namespace)?))
    }

    fn create_namespace(&mut self, namespace: &str) -> Result<(), StoreError> {
        self.namespaces
            .entry(canonical_namespace(namespace)?)
            .or_default();
        Ok(())
    }

    fn value_names(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .namespaces
            .get(&canonical_namespace(namespace)?)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn get_value(&self, namespace: &str, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .namespaces
            .get(&canonical_namespace(namespace)?)
            .and_then(|values| values.get(name).cloned()))
    }

    fn set_value(&mut self, namespace: &str, name: &str, value: &str) -> Result<(), StoreError> {
        self.values_mut(namespace)?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete_value(&mut self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.values_mut(namespace)?.remove(name);
        Ok(())
    }
}

/// One JSON object file per namespace under `root`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_file(&self, namespace: &str) -> Result<PathBuf, StoreError> {
        let segments = namespace_segments(namespace)?;
        let mut path = self.root.clone();
        if let Some((last, parents)) = segments.split_last() {
            for segment in parents {
                path.push(segment);
            }
            path.push(format!("{last}.json"));
        }
        Ok(path)
    }

    fn load(&self, namespace: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let path = self.namespace_file(namespace)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let values = serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
            namespace: namespace.to_string(),
            source,
        })?;
        Ok(Some(values))
    }

    fn save(&self, namespace: &str, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let path = self.namespace_file(namespace)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(values).map_err(|source| StoreError::Corrupt {
            namespace: namespace.to_string(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load_existing(&self, namespace: &str) -> Result<BTreeMap<String, String>, StoreError> {
        self.load(namespace)?
            .ok_or_else(|| StoreError::InvalidNamespace(namespace.to_string()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn namespace_exists(&self, namespace: &str) -> Result<bool, StoreError> {
        Ok(self.namespace_file(namespace)?.is_file())
    }

    fn create_namespace(&mut self, namespace: &str) -> Result<(), StoreError> {
        if self.load(namespace)?.is_none() {
            self.save(namespace, &BTreeMap::new())?;
        }
        Ok(())
    }

    fn value_names(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .load(namespace)?
            .map(|values| values.into_keys().collect())
            .unwrap_or_default())
    }

    fn get_value(&self, namespace: &str, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .load(namespace)?
            .and_then(|mut values| values.remove(name)))
    }

    fn set_value(&mut self, namespace: &str, name: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.load_existing(namespace)?;
        values.insert(name.to_string(), value.to_string());
        self.save(namespace, &values)
    }

    fn delete_value(&mut self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut values = self.load_existing(namespace)?;
        if values.remove(name).is_some() {
            self.save(namespace, &values)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExportReport {
    pub written: usize,
    pub diagnostics: Vec<Diagnostic>,
}

fn shortcut_name(name: &str) -> String {
    format!("{name}{SHORTCUT_SUFFIX}")
}

fn is_shortcut_name(name: &str) -> bool {
    name.len() >= SHORTCUT_SUFFIX.len()
        && name
            .get(name.len() - SHORTCUT_SUFFIX.len()..)
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(SHORTCUT_SUFFIX))
}

pub struct MenuStore<S> {
    backend: S,
}

impl<S: KeyValueStore> MenuStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_inner(self) -> S {
        self.backend
    }

    /// Writes every item of `tree`, flattening nested groups.
    pub fn export_tree(
        &mut self,
        namespace: &str,
        tree: &MenuTree,
        overwrite: bool,
    ) -> Result<ExportReport, CatalogError> {
        let items: Vec<MenuItem> = tree.flatten().into_iter().cloned().collect();
        self.export(namespace, &items, overwrite)
    }

    /// With `overwrite`, existing values are cleared first (best effort);
    /// otherwise the items are merged into what is already there.
    pub fn export(
        &mut self,
        namespace: &str,
        items: &[MenuItem],
        overwrite: bool,
    ) -> Result<ExportReport, CatalogError> {
        if let Some(item) = items.iter().find(|item| is_shortcut_name(&item.name)) {
            return Err(CatalogError::ReservedNameCollision(item.name.clone()));
        }
        let write_error = |written: usize, source: StoreError| CatalogError::StoreWrite {
            namespace: namespace.to_string(),
            written,
            source,
        };

        let mut report = ExportReport::default();
        let exists = self
            .backend
            .namespace_exists(namespace)
            .map_err(|err| write_error(0, err))?;
        if !exists {
            self.backend
                .create_namespace(namespace)
                .map_err(|err| write_error(0, err))?;
        } else if overwrite {
            self.clear(namespace, &mut report.diagnostics);
        }

        // case-insensitive duplicates: the last one wins, in the first one's slot
        let mut unique: Vec<&MenuItem> = Vec::new();
        for item in items {
            match unique
                .iter_mut()
                .find(|kept| kept.name.eq_ignore_ascii_case(&item.name))
            {
                Some(slot) => {
                    report.diagnostics.push(Diagnostic::warning(
                        item.name.clone(),
                        "duplicate name after flattening; later entry kept",
                    ));
                    *slot = item;
                }
                None => unique.push(item),
            }
        }
        let existing = if exists && !overwrite {
            self.backend.value_names(namespace).unwrap_or_else(|err| {
                report
                    .diagnostics
                    .push(Diagnostic::warning(namespace, err));
                Vec::new()
            })
        } else {
            Vec::new()
        };

        for item in unique {
            self.remove_case_variants(namespace, &item.name, &existing, &mut report.diagnostics);
            let record = item
                .action
                .to_record()
                .map_err(|source| {
                    write_error(
                        report.written,
                        StoreError::Corrupt {
                            namespace: namespace.to_string(),
                            source,
                        },
                    )
                })?;
            self.backend
                .set_value(namespace, &item.name, &record)
                .map_err(|err| write_error(report.written, err))?;
            let shortcut = shortcut_name(&item.name);
            match &item.shortcut_key {
                Some(key) => self
                    .backend
                    .set_value(namespace, &shortcut, key)
                    .map_err(|err| write_error(report.written, err))?,
                None => {
                    if let Err(err) = self.backend.delete_value(namespace, &shortcut) {
                        report
                            .diagnostics
                            .push(Diagnostic::warning(shortcut, err));
                    }
                }
            }
            tracing::debug!("stored {} in {namespace}", item.name);
            report.written += 1;
        }

        for diagnostic in &report.diagnostics {
            tracing::warn!("export to {namespace}: {diagnostic}");
        }
        tracing::info!("exported {} entries to {namespace}", report.written);
        Ok(report)
    }

    /// Deletes stored names that differ from `name` (or its shortcut) only
    /// by case, so a merge cannot leave two spellings of one entry behind.
    fn remove_case_variants(
        &mut self,
        namespace: &str,
        name: &str,
        existing: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let shortcut = shortcut_name(name);
        let variants = existing.iter().filter(|stored| {
            (stored.eq_ignore_ascii_case(name) && *stored != name)
                || (stored.eq_ignore_ascii_case(&shortcut) && **stored != shortcut)
        });
        for stored in variants {
            if let Err(err) = self.backend.delete_value(namespace, stored) {
                diagnostics.push(Diagnostic::warning(stored.clone(), err));
            }
        }
    }

    fn clear(&mut self, namespace: &str, diagnostics: &mut Vec<Diagnostic>) {
        let names = match self.backend.value_names(namespace) {
            Ok(names) => names,
            Err(err) => {
                diagnostics.push(Diagnostic::warning(namespace, err));
                return;
            }
        };
        for name in names {
            if let Err(err) = self.backend.delete_value(namespace, &name) {
                diagnostics.push(Diagnostic::warning(name, err));
            }
        }
    }

    /// Reads a namespace back as one flat group named after its last segment.
    pub fn import(&self, namespace: &str) -> Result<BuildReport, CatalogError> {
        let read_error = |source: StoreError| CatalogError::StoreRead {
            namespace: namespace.to_string(),
            source,
        };
        if !self.backend.namespace_exists(namespace).map_err(read_error)? {
            return Err(CatalogError::NamespaceNotFound(namespace.to_string()));
        }
        let group_name = namespace
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(namespace)
            .to_string();

        let mut root = MenuNode::new(group_name);
        let mut processed = 0;
        let mut diagnostics = Vec::new();
        let names = self.backend.value_names(namespace).map_err(read_error)?;
        for name in names.into_iter().filter(|name| !is_shortcut_name(name)) {
            processed += 1;
            let record = self
                .backend
                .get_value(namespace, &name)
                .map_err(read_error)?
                .unwrap_or_default();
            if record.trim().is_empty() {
                diagnostics.push(Diagnostic::skipped(name, "empty action record"));
                continue;
            }
            let action = match Action::from_record(&record) {
                Ok(action) => action,
                Err(err) => {
                    diagnostics.push(Diagnostic::skipped(name, err));
                    continue;
                }
            };
            let shortcut = self
                .backend
                .get_value(namespace, &shortcut_name(&name))
                .map_err(read_error)?
                .unwrap_or_default();
            let item = MenuItem::new(name.clone(), action).with_shortcut(shortcut);
            if let Err(err) = root.push_item(item) {
                diagnostics.push(Diagnostic::skipped(name, err));
            }
        }

        for diagnostic in &diagnostics {
            tracing::warn!("import from {namespace}: {diagnostic}");
        }
        let report = BuildReport {
            tree: MenuTree::new(root, TreeSource::Store(namespace.to_string())),
            processed,
            diagnostics,
        };
        tracing::info!("imported menu from {namespace}: {}", report.summary());
        Ok(report)
    }
}
