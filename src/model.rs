//! The menu tree: actions, items, groups and the build report that carries
//! them between sources, the store and the presenter.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DuplicateName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    RunProcess,
    RunProcessElevatedArgs,
    OpenDocument,
    OpenUrl,
    EditInHost,
    /// Deferred lookup: `program` is a CSV catalog, `arguments` the key.
    LaunchByName,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::RunProcess => "run",
            ActionKind::RunProcessElevatedArgs => "run elevated",
            ActionKind::OpenDocument => "open document",
            ActionKind::OpenUrl => "open url",
            ActionKind::EditInHost => "edit",
            ActionKind::LaunchByName => "launch by name",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowStyle {
    #[default]
    Default,
    Normal,
}

impl WindowStyle {
    fn is_default(&self) -> bool {
        *self == WindowStyle::Default
    }
}

/// What program to run with what arguments. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    kind: ActionKind,
    program: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<String>,
    #[serde(default, skip_serializing_if = "WindowStyle::is_default")]
    window: WindowStyle,
    #[serde(default)]
    source_extension: String,
}

impl Action {
    pub fn new(kind: ActionKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            arguments: None,
            window: WindowStyle::Default,
            source_extension: String::new(),
        }
    }

    /// Empty argument strings are stored as `None`.
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        let arguments = arguments.into();
        self.arguments = (!arguments.is_empty()).then_some(arguments);
        self
    }

    pub fn with_window(mut self, window: WindowStyle) -> Self {
        self.window = window;
        self
    }

    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref()
    }

    pub fn window(&self) -> WindowStyle {
        self.window
    }

    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// One-line structured record used by the store.
    pub fn to_record(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_record(record: &str) -> serde_json::Result<Self> {
        serde_json::from_str(record)
    }

    /// Human readable command line, used for display only.
    pub fn command_line(&self) -> String {
        match &self.arguments {
            Some(arguments) => format!("{} {}", self.program, arguments),
            None => self.program.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub name: String,
    pub action: Action,
    pub shortcut_key: Option<String>,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            action,
            shortcut_key: None,
        }
    }

    pub fn with_shortcut(mut self, shortcut: impl Into<String>) -> Self {
        let shortcut = shortcut.into();
        self.shortcut_key = (!shortcut.is_empty()).then_some(shortcut);
        self
    }
}

/// A group. Child names are unique across groups and items together,
/// compared ASCII case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MenuNode {
    name: String,
    groups: Vec<MenuNode>,
    items: Vec<MenuItem>,
}

impl MenuNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[MenuNode] {
        &self.groups
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.items.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.group(name).is_some() || self.item(name).is_some()
    }

    pub fn group(&self, name: &str) -> Option<&MenuNode> {
        self.groups
            .iter()
            .find(|group| group.name.eq_ignore_ascii_case(name))
    }

    pub fn item(&self, name: &str) -> Option<&MenuItem> {
        self.items
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    pub fn push_item(&mut self, item: MenuItem) -> Result<(), DuplicateName> {
        if self.contains_name(&item.name) {
            return Err(self.duplicate(&item.name));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn push_group(&mut self, group: MenuNode) -> Result<(), DuplicateName> {
        if self.contains_name(&group.name) {
            return Err(self.duplicate(&group.name));
        }
        self.groups.push(group);
        Ok(())
    }

    /// Swaps an item of the same name in place, keeping its position.
    /// Returns the previous item, or pushes and returns `None` when there
    /// was none. A group of that name is still a collision.
    pub fn replace_item(&mut self, item: MenuItem) -> Result<Option<MenuItem>, DuplicateName> {
        if let Some(slot) = self
            .items
            .iter_mut()
            .find(|existing| existing.name.eq_ignore_ascii_case(&item.name))
        {
            return Ok(Some(std::mem::replace(slot, item)));
        }
        self.push_item(item).map(|_| None)
    }

    /// Every item in this subtree, depth-first, own items before groups.
    pub fn flatten(&self) -> Vec<&MenuItem> {
        let mut out: Vec<&MenuItem> = self.items.iter().collect();
        for group in &self.groups {
            out.extend(group.flatten());
        }
        out
    }

    pub fn item_count(&self) -> usize {
        self.items.len() + self.groups.iter().map(MenuNode::item_count).sum::<usize>()
    }

    fn duplicate(&self, name: &str) -> DuplicateName {
        DuplicateName {
            name: name.to_string(),
            group: self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeSource {
    Directory(PathBuf),
    Csv(PathBuf),
    Store(String),
    Presenter(String),
}

impl fmt::Display for TreeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSource::Directory(path) => write!(f, "directory {}", path.display()),
            TreeSource::Csv(path) => write!(f, "csv {}", path.display()),
            TreeSource::Store(namespace) => write!(f, "store {namespace}"),
            TreeSource::Presenter(group) => write!(f, "menu {group}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuTree {
    pub root: MenuNode,
    pub source: TreeSource,
}

impl MenuTree {
    pub fn new(root: MenuNode, source: TreeSource) -> Self {
        Self { root, source }
    }

    pub fn flatten(&self) -> Vec<&MenuItem> {
        self.root.flatten()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The entry was left out of the result.
    Skipped,
    /// Something best-effort failed; the result is still complete.
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub subject: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn skipped(subject: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            subject: subject.into(),
            kind: DiagnosticKind::Skipped,
            message: message.to_string(),
        }
    }

    pub fn warning(subject: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            subject: subject.into(),
            kind: DiagnosticKind::Warning,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// The result of every build or import.
#[derive(Clone, Debug)]
pub struct BuildReport {
    pub tree: MenuTree,
    pub processed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    pub fn skipped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.kind == DiagnosticKind::Skipped)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} entries processed, {} skipped",
            self.processed,
            self.skipped()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exe(path: &str) -> Action {
        Action::new(ActionKind::RunProcess, path).with_source_extension("exe")
    }

    #[test]
    fn names_are_unique_across_groups_and_items() {
        let mut node = MenuNode::new("Tools");
        node.push_item(MenuItem::new("build", exe("/bin/build"))).unwrap();
        assert!(node.push_group(MenuNode::new("Build")).is_err());
        assert!(node.push_item(MenuItem::new("BUILD", exe("/bin/other"))).is_err());
        node.push_group(MenuNode::new("extras")).unwrap();
        let err = node
            .push_item(MenuItem::new("extras", exe("/bin/extras")))
            .unwrap_err();
        assert_eq!(err.group, "Tools");
        assert_eq!(node.items().len(), 1);
        assert_eq!(node.groups().len(), 1);
    }

    #[test]
    fn replace_item_keeps_position() {
        let mut node = MenuNode::new("root");
        node.push_item(MenuItem::new("a", exe("/a"))).unwrap();
        node.push_item(MenuItem::new("b", exe("/b"))).unwrap();
        let previous = node.replace_item(MenuItem::new("a", exe("/a2"))).unwrap();
        assert_eq!(previous.unwrap().action.program(), "/a");
        assert_eq!(node.items()[0].action.program(), "/a2");
        assert!(node.replace_item(MenuItem::new("c", exe("/c"))).unwrap().is_none());
        assert_eq!(node.items().len(), 3);
    }

    #[test]
    fn flatten_walks_nested_groups() {
        let mut inner = MenuNode::new("inner");
        inner.push_item(MenuItem::new("deep", exe("/deep"))).unwrap();
        let mut root = MenuNode::new("root");
        root.push_item(MenuItem::new("top", exe("/top"))).unwrap();
        root.push_group(inner).unwrap();
        let names: Vec<&str> = root.flatten().iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["top", "deep"]);
        assert_eq!(root.item_count(), 2);
    }

    #[test]
    fn record_round_trip_is_textually_identical() {
        let action = Action::new(ActionKind::RunProcess, "C:\\Program Files\\Tool\\tool.exe")
            .with_arguments("--title \\\"hello world\\\"")
            .with_window(WindowStyle::Normal)
            .with_source_extension("lnk");
        let record = action.to_record().unwrap();
        let decoded = Action::from_record(&record).unwrap();
        assert_eq!(decoded, action);
        assert_eq!(decoded.to_record().unwrap(), record);
    }

    #[test]
    fn empty_arguments_are_none() {
        let action = exe("/bin/true").with_arguments("");
        assert_eq!(action.arguments(), None);
        assert!(!action.to_record().unwrap().contains("arguments"));
    }

    #[test]
    fn report_summary_counts_only_skips() {
        let report = BuildReport {
            tree: MenuTree::new(MenuNode::new("x"), TreeSource::Store("x".into())),
            processed: 4,
            diagnostics: vec![
                Diagnostic::skipped("a.txt", "unsupported"),
                Diagnostic::warning("store", "delete failed"),
            ],
        };
        assert_eq!(report.summary(), "4 entries processed, 1 skipped");
    }
}
