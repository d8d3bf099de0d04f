//! Menu catalog engine.
//!
//! Builds hierarchical menus of launchable actions from:
//! - directory trees of shortcuts, scripts, executables and documents
//! - CSV catalogs (direct paths or deferred lookup by name)
//! - namespaces of a key/value store
//!
//! and installs them idempotently into a [`Presenter`], persists them with
//! [`MenuStore`], and launches their actions.

pub mod builder;
pub mod catalog;
pub mod config;
pub mod launch;
pub mod model;
pub mod presenter;
pub mod resolver;
pub mod store;

mod error;

pub use builder::MenuTreeBuilder;
pub use catalog::{build_from_csv, find_catalog_entry, list_catalog, CatalogMode, CatalogRow};
pub use error::{CatalogError, DuplicateName, PresenterError, ResolveError, StoreError};
pub use launch::{LaunchRequest, Launcher, ProcessLauncher, SystemLauncher};
pub use model::{
    Action, ActionKind, BuildReport, Diagnostic, DiagnosticKind, MenuItem, MenuNode, MenuTree,
    TreeSource, WindowStyle,
};
pub use presenter::{
    extract_tree, install_item, install_tree, GroupHandle, InstallMode, InstallOutcome,
    InstallReport, ItemHandle, MemoryPresenter, ParentRef, Presenter,
};
pub use resolver::{
    ActionResolver, FsEntry, HostCommands, ShortcutParser, ShortcutTarget,
    UnavailableShortcutParser,
};
pub use store::{ExportReport, JsonFileStore, KeyValueStore, MemoryStore, MenuStore};
