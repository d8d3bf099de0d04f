//! The live menu: a `Presenter` owns rendered groups and items. Trees are
//! installed into it idempotently and can be extracted back out.

use crate::error::{CatalogError, PresenterError};
use crate::model::{Action, Diagnostic, MenuItem, MenuNode, MenuTree, TreeSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupHandle(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle(pub usize);

/// The host menu widget tree.
pub trait Presenter {
    fn root(&self) -> GroupHandle;
    fn add_group(&mut self, parent: GroupHandle, name: &str) -> Result<GroupHandle, PresenterError>;
    fn add_item(
        &mut self,
        parent: GroupHandle,
        name: &str,
        action: &Action,
        shortcut: Option<&str>,
    ) -> Result<ItemHandle, PresenterError>;
    fn remove(&mut self, item: ItemHandle) -> Result<(), PresenterError>;
    fn list_children(&self, group: GroupHandle) -> Vec<ItemHandle>;
    fn list_groups(&self, group: GroupHandle) -> Vec<GroupHandle>;
    fn group_name(&self, group: GroupHandle) -> Option<String>;
    fn item_name(&self, item: ItemHandle) -> Option<String>;
    fn item_action(&self, item: ItemHandle) -> Option<Action>;
    fn item_shortcut(&self, item: ItemHandle) -> Option<String>;
}

/// Where to install or extract from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParentRef {
    Root,
    /// A top-level group, matched by name ignoring ASCII case.
    ByName(String),
    ByHandle(GroupHandle),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstallMode {
    /// An item whose name is already present is left alone.
    #[default]
    KeepExisting,
    /// The existing item is removed and the new one added.
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    Added(ItemHandle),
    Replaced(ItemHandle),
    Kept(ItemHandle),
    /// A group already owns the name.
    Conflict,
}

#[derive(Clone, Debug, Default)]
pub struct InstallReport {
    pub added: usize,
    pub replaced: usize,
    pub kept: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl InstallReport {
    fn record(&mut self, name: &str, outcome: InstallOutcome) {
        match outcome {
            InstallOutcome::Added(_) => self.added += 1,
            InstallOutcome::Replaced(_) => self.replaced += 1,
            InstallOutcome::Kept(_) => {
                self.kept += 1;
                self.diagnostics
                    .push(Diagnostic::warning(name, "already in the menu, kept existing"));
            }
            InstallOutcome::Conflict => self
                .diagnostics
                .push(Diagnostic::skipped(name, "a group with this name already exists")),
        }
    }
}

fn find_group<P: Presenter + ?Sized>(
    presenter: &P,
    parent: GroupHandle,
    name: &str,
) -> Option<GroupHandle> {
    presenter.list_groups(parent).into_iter().find(|group| {
        presenter
            .group_name(*group)
            .is_some_and(|existing| existing.eq_ignore_ascii_case(name))
    })
}

fn find_item<P: Presenter + ?Sized>(
    presenter: &P,
    parent: GroupHandle,
    name: &str,
) -> Option<ItemHandle> {
    presenter.list_children(parent).into_iter().find(|item| {
        presenter
            .item_name(*item)
            .is_some_and(|existing| existing.eq_ignore_ascii_case(name))
    })
}

fn find_or_add_group<P: Presenter + ?Sized>(
    presenter: &mut P,
    parent: GroupHandle,
    name: &str,
) -> Result<GroupHandle, PresenterError> {
    match find_group(presenter, parent, name) {
        Some(group) => Ok(group),
        None => presenter.add_group(parent, name),
    }
}

/// Resolves `parent` once to a concrete group. `ByName` creates the
/// top-level group when `create` is set.
pub fn resolve_parent<P: Presenter + ?Sized>(
    presenter: &mut P,
    parent: &ParentRef,
    create: bool,
) -> Result<GroupHandle, CatalogError> {
    let root = presenter.root();
    match parent {
        ParentRef::Root => Ok(root),
        ParentRef::ByHandle(handle) => {
            if presenter.group_name(*handle).is_none() {
                return Err(PresenterError::UnknownGroup(handle.0).into());
            }
            Ok(*handle)
        }
        ParentRef::ByName(name) => match find_group(presenter, root, name) {
            Some(group) => Ok(group),
            None if create => Ok(presenter.add_group(root, name)?),
            None => Err(CatalogError::GroupNotFound(name.clone())),
        },
    }
}

pub fn install_item<P: Presenter + ?Sized>(
    presenter: &mut P,
    parent: GroupHandle,
    item: &MenuItem,
    mode: InstallMode,
) -> Result<InstallOutcome, CatalogError> {
    if find_group(presenter, parent, &item.name).is_some() {
        tracing::warn!("cannot add item {}: a group has that name", item.name);
        return Ok(InstallOutcome::Conflict);
    }
    let shortcut = item.shortcut_key.as_deref();
    match find_item(presenter, parent, &item.name) {
        Some(existing) if mode == InstallMode::KeepExisting => {
            tracing::debug!("{} is already installed", item.name);
            Ok(InstallOutcome::Kept(existing))
        }
        Some(existing) => {
            presenter.remove(existing)?;
            let handle = presenter.add_item(parent, &item.name, &item.action, shortcut)?;
            Ok(InstallOutcome::Replaced(handle))
        }
        None => {
            let handle = presenter.add_item(parent, &item.name, &item.action, shortcut)?;
            Ok(InstallOutcome::Added(handle))
        }
    }
}

/// Installs `tree` as a group named after its root under `parent`, reusing
/// groups that already exist.
pub fn install_tree<P: Presenter + ?Sized>(
    presenter: &mut P,
    parent: &ParentRef,
    tree: &MenuTree,
    mode: InstallMode,
) -> Result<InstallReport, CatalogError> {
    let parent = resolve_parent(presenter, parent, true)?;
    let mut report = InstallReport::default();
    install_node(presenter, parent, &tree.root, mode, &mut report)?;
    tracing::info!(
        "installed {} ({}): {} added, {} replaced, {} kept",
        tree.root.name(),
        tree.source,
        report.added,
        report.replaced,
        report.kept
    );
    Ok(report)
}

fn install_node<P: Presenter + ?Sized>(
    presenter: &mut P,
    parent: GroupHandle,
    node: &MenuNode,
    mode: InstallMode,
    report: &mut InstallReport,
) -> Result<(), CatalogError> {
    if find_item(presenter, parent, node.name()).is_some() {
        report.diagnostics.push(Diagnostic::skipped(
            node.name(),
            "an item with this name already exists",
        ));
        return Ok(());
    }
    let group = find_or_add_group(presenter, parent, node.name())?;
    for item in node.items() {
        let outcome = install_item(presenter, group, item, mode)?;
        report.record(&item.name, outcome);
    }
    for child in node.groups() {
        install_node(presenter, group, child, mode, report)?;
    }
    Ok(())
}

/// Reads the live groups and items under `parent` back into a tree.
pub fn extract_tree<P: Presenter + ?Sized>(
    presenter: &mut P,
    parent: &ParentRef,
) -> Result<MenuTree, CatalogError> {
    let group = resolve_parent(presenter, parent, false)?;
    let name = presenter.group_name(group).unwrap_or_default();
    let root = extract_node(presenter, group, name.clone());
    Ok(MenuTree::new(root, TreeSource::Presenter(name)))
}

fn extract_node<P: Presenter + ?Sized>(
    presenter: &P,
    group: GroupHandle,
    name: String,
) -> MenuNode {
    let mut node = MenuNode::new(name);
    for item in presenter.list_children(group) {
        let (Some(name), Some(action)) = (presenter.item_name(item), presenter.item_action(item))
        else {
            continue;
        };
        let mut menu_item = MenuItem::new(name, action);
        menu_item.shortcut_key = presenter.item_shortcut(item);
        if let Err(err) = node.push_item(menu_item) {
            tracing::warn!("extract: {err}");
        }
    }
    for child in presenter.list_groups(group) {
        let child_name = presenter.group_name(child).unwrap_or_default();
        if let Err(err) = node.push_group(extract_node(presenter, child, child_name)) {
            tracing::warn!("extract: {err}");
        }
    }
    node
}

#[derive(Clone, Debug)]
struct GroupSlot {
    name: String,
    groups: Vec<GroupHandle>,
    items: Vec<ItemHandle>,
}

#[derive(Clone, Debug)]
struct ItemSlot {
    name: String,
    action: Action,
    shortcut: Option<String>,
    parent: GroupHandle,
}

/// In-process presenter: an arena of groups and items kept in insertion
/// order. Handle 0 is the root group.
#[derive(Clone, Debug)]
pub struct MemoryPresenter {
    groups: Vec<GroupSlot>,
    items: Vec<Option<ItemSlot>>,
}

impl Default for MemoryPresenter {
    fn default() -> Self {
        Self::new("Menu")
    }
}

impl MemoryPresenter {
    pub fn new(root_name: &str) -> Self {
        Self {
            groups: vec![GroupSlot {
                name: root_name.to_string(),
                groups: Vec::new(),
                items: Vec::new(),
            }],
            items: Vec::new(),
        }
    }

    fn group_slot_mut(&mut self, group: GroupHandle) -> Result<&mut GroupSlot, PresenterError> {
        self.groups
            .get_mut(group.0)
            .ok_or(PresenterError::UnknownGroup(group.0))
    }

    pub fn item_parent(&self, item: ItemHandle) -> Option<GroupHandle> {
        self.items.get(item.0)?.as_ref().map(|slot| slot.parent)
    }
}

impl Presenter for MemoryPresenter {
    fn root(&self) -> GroupHandle {
        GroupHandle(0)
    }

    fn add_group(
        &mut self,
        parent: GroupHandle,
        name: &str,
    ) -> Result<GroupHandle, PresenterError> {
        let handle = GroupHandle(self.groups.len());
        self.group_slot_mut(parent)?.groups.push(handle);
        self.groups.push(GroupSlot {
            name: name.to_string(),
            groups: Vec::new(),
            items: Vec::new(),
        });
        Ok(handle)
    }

    fn add_item(
        &mut self,
        parent: GroupHandle,
        name: &str,
        action: &Action,
        shortcut: Option<&str>,
    ) -> Result<ItemHandle, PresenterError> {
        let handle = ItemHandle(self.items.len());
        self.group_slot_mut(parent)?.items.push(handle);
        self.items.push(Some(ItemSlot {
            name: name.to_string(),
            action: action.clone(),
            shortcut: shortcut.map(str::to_string),
            parent,
        }));
        Ok(handle)
    }

    fn remove(&mut self, item: ItemHandle) -> Result<(), PresenterError> {
        let slot = self
            .items
            .get_mut(item.0)
            .and_then(Option::take)
            .ok_or(PresenterError::UnknownItem(item.0))?;
        self.group_slot_mut(slot.parent)?
            .items
            .retain(|existing| *existing != item);
        Ok(())
    }

    fn list_children(&self, group: GroupHandle) -> Vec<ItemHandle> {
        self.groups
            .get(group.0)
            .map(|slot| slot.items.clone())
            .unwrap_or_default()
    }

    fn list_groups(&self, group: GroupHandle) -> Vec<GroupHandle> {
        self.groups
            .get(group.0)
            .map(|slot| slot.groups.clone())
            .unwrap_or_default()
    }

    fn group_name(&self, group: GroupHandle) -> Option<String> {
        self.groups.get(group.0).map(|slot| slot.name.clone())
    }

    fn item_name(&self, item: ItemHandle) -> Option<String> {
        self.items.get(item.0)?.as_ref().map(|slot| slot.name.clone())
    }

    fn item_action(&self, item: ItemHandle) -> Option<Action> {
        self.items.get(item.0)?.as_ref().map(|slot| slot.action.clone())
    }

    fn item_shortcut(&self, item: ItemHandle) -> Option<String> {
        self.items.get(item.0)?.as_ref()?.shortcut.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActionKind;
    use std::path::PathBuf;

    fn run(program: &str) -> Action {
        Action::new(ActionKind::RunProcess, program)
    }

    fn tree() -> MenuTree {
        let mut sub = MenuNode::new("sub");
        sub.push_item(MenuItem::new("b", run("/b"))).unwrap();
        let mut root = MenuNode::new("Tools");
        root.push_item(MenuItem::new("a", run("/a")).with_shortcut("Ctrl+Alt+A"))
            .unwrap();
        root.push_group(sub).unwrap();
        MenuTree::new(root, TreeSource::Directory(PathBuf::from("/tools")))
    }

    #[test]
    fn installing_twice_without_replace_keeps_one() {
        let mut presenter = MemoryPresenter::default();
        let root = presenter.root();
        let first = MenuItem::new("tool", run("/first"));
        let second = MenuItem::new("tool", run("/second"));

        assert!(matches!(
            install_item(&mut presenter, root, &first, InstallMode::KeepExisting).unwrap(),
            InstallOutcome::Added(_)
        ));
        assert!(matches!(
            install_item(&mut presenter, root, &second, InstallMode::KeepExisting).unwrap(),
            InstallOutcome::Kept(_)
        ));
        let children = presenter.list_children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(presenter.item_action(children[0]).unwrap().program(), "/first");
    }

    #[test]
    fn installing_twice_with_replace_keeps_the_second() {
        let mut presenter = MemoryPresenter::default();
        let root = presenter.root();
        let first = MenuItem::new("tool", run("/first"));
        install_item(&mut presenter, root, &first, InstallMode::Replace).unwrap();
        let outcome = install_item(
            &mut presenter,
            root,
            &MenuItem::new("tool", run("/second")),
            InstallMode::Replace,
        )
        .unwrap();
        assert!(matches!(outcome, InstallOutcome::Replaced(_)));
        let children = presenter.list_children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(presenter.item_action(children[0]).unwrap().program(), "/second");
    }

    #[test]
    fn repeated_tree_install_does_not_duplicate() {
        let mut presenter = MemoryPresenter::default();
        let keep = InstallMode::KeepExisting;
        let first = install_tree(&mut presenter, &ParentRef::Root, &tree(), keep).unwrap();
        assert_eq!(first.added, 2);
        let second = install_tree(&mut presenter, &ParentRef::Root, &tree(), keep).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.kept, 2);

        let root = presenter.root();
        assert_eq!(presenter.list_groups(root).len(), 1);
        let extracted = extract_tree(&mut presenter, &ParentRef::ByName("tools".into())).unwrap();
        assert_eq!(extracted.root, tree().root);
    }

    #[test]
    fn by_name_parent_is_created_on_install_only() {
        let mut presenter = MemoryPresenter::default();
        let err = extract_tree(&mut presenter, &ParentRef::ByName("Add-ons".into())).unwrap_err();
        assert!(matches!(err, CatalogError::GroupNotFound(_)));

        install_tree(
            &mut presenter,
            &ParentRef::ByName("Add-ons".into()),
            &tree(),
            InstallMode::KeepExisting,
        )
        .unwrap();
        let extracted = extract_tree(&mut presenter, &ParentRef::ByName("Add-ons".into())).unwrap();
        assert_eq!(extracted.root.name(), "Add-ons");
        assert!(extracted.root.group("Tools").is_some());
        assert_eq!(extracted.source, TreeSource::Presenter("Add-ons".into()));
    }

    #[test]
    fn item_cannot_shadow_a_group() {
        let mut presenter = MemoryPresenter::default();
        let root = presenter.root();
        presenter.add_group(root, "shared").unwrap();
        let outcome = install_item(
            &mut presenter,
            root,
            &MenuItem::new("Shared", run("/x")),
            InstallMode::Replace,
        )
        .unwrap();
        assert_eq!(outcome, InstallOutcome::Conflict);
        assert!(presenter.list_children(root).is_empty());
    }

    #[test]
    fn unknown_handles_are_errors() {
        let mut presenter = MemoryPresenter::default();
        assert!(presenter.remove(ItemHandle(7)).is_err());
        let err = extract_tree(&mut presenter, &ParentRef::ByHandle(GroupHandle(9))).unwrap_err();
        assert!(matches!(err, CatalogError::Presenter(PresenterError::UnknownGroup(9))));
    }
}
