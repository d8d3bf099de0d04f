mod theme;
mod ui;

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

use menu_catalog::config::{AppPaths, Settings};
use menu_catalog::{
    extract_tree, install_tree, ActionResolver, GroupHandle, InstallMode, ItemHandle,
    JsonFileStore, Launcher, MemoryPresenter, MenuStore, ParentRef, Presenter, SystemLauncher,
    UnavailableShortcutParser,
};

use crate::theme::Theme;
use crate::ui::FooterAction;

fn main() -> Result<()> {
    let paths = AppPaths::new()?;
    init_logging(&paths)?;
    let mut app = AppState::new(paths)?;
    run_app(&mut app)
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(paths: &AppPaths) -> Result<()> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(&paths.log_file)
        .with_context(|| format!("opening {}", paths.log_file.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_app(app: &mut AppState) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let result = event_loop(&mut terminal, app);

    restore_terminal(&mut terminal)?;
    result
}

fn event_loop<B>(terminal: &mut Terminal<B>, app: &mut AppState) -> Result<()>
where
    B: ratatui::backend::Backend + Write,
{
    let tick_rate = Duration::from_millis(200);
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key),
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    app.handle_mouse(mouse, size);
                }
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            };
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn restore_terminal<B>(terminal: &mut Terminal<B>) -> Result<()>
where
    B: ratatui::backend::Backend + Write,
{
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DisplayEntry {
    Group { handle: GroupHandle, depth: usize },
    Item { handle: ItemHandle, depth: usize },
}

struct InfoPopup {
    name: String,
    group: String,
    kind: String,
    program: String,
    arguments: Option<String>,
    shortcut: Option<String>,
}

enum PopupState {
    Info(InfoPopup),
    Message(String),
}

struct AppState {
    presenter: MemoryPresenter,
    expanded: HashSet<GroupHandle>,
    display_entries: Vec<DisplayEntry>,
    current_index: usize,
    should_quit: bool,
    status_message: Option<String>,
    build_summary: String,
    settings: Settings,
    store: MenuStore<JsonFileStore>,
    processes: SystemLauncher,
    theme: Theme,
    title: String,
    active_popup: Option<PopupState>,
}

impl AppState {
    fn new(paths: AppPaths) -> Result<Self> {
        let settings = Settings::load(&paths.settings_file)?;
        let theme = Theme::load(&paths.theme_file)?;
        let title = settings
            .title
            .clone()
            .unwrap_or_else(|| "Menu Catalog".into());
        let processes = SystemLauncher::new(settings.host.elevation_command.clone());
        let mut app = AppState {
            presenter: MemoryPresenter::new(&title),
            expanded: HashSet::new(),
            display_entries: Vec::new(),
            current_index: 0,
            should_quit: false,
            status_message: None,
            build_summary: String::new(),
            store: MenuStore::new(JsonFileStore::new(&paths.store_dir)),
            processes,
            settings,
            theme,
            title,
            active_popup: None,
        };
        app.install_sources(InstallMode::KeepExisting);
        Ok(app)
    }

    /// Builds every configured source and installs it under the root. A
    /// source that fails to build is logged and left out.
    fn install_sources(&mut self, mode: InstallMode) {
        let shortcuts = UnavailableShortcutParser;
        let mut processed = 0;
        let mut skipped = 0;
        let mut failures = Vec::new();
        for source in &self.settings.sources {
            let resolver = ActionResolver::new(&self.settings.host, &shortcuts);
            let report = match source.build(resolver, &self.store) {
                Ok(report) => report,
                Err(err) => {
                    tracing::warn!("{}: {err}", source.describe());
                    failures.push(format!("{}: {err}", source.describe()));
                    continue;
                }
            };
            processed += report.processed;
            skipped += report.skipped();
            if let Err(err) =
                install_tree(&mut self.presenter, &ParentRef::Root, &report.tree, mode)
            {
                tracing::warn!("installing {}: {err}", source.describe());
                failures.push(format!("{}: {err}", source.describe()));
            }
        }
        // top-level groups start open
        let root = self.presenter.root();
        self.expanded.extend(self.presenter.list_groups(root));
        self.build_summary = format!("{processed} entries processed, {skipped} skipped");
        if !failures.is_empty() {
            self.active_popup = Some(PopupState::Message(format!(
                "Some sources could not be loaded:\n{}",
                failures.join("\n")
            )));
        }
        self.rebuild_display();
    }

    fn rebuild_display(&mut self) {
        self.display_entries.clear();
        let root = self.presenter.root();
        self.push_group_entries(root, 0);
        if self.current_index >= self.display_entries.len() {
            self.current_index = self.display_entries.len().saturating_sub(1);
        }
    }

    fn push_group_entries(&mut self, group: GroupHandle, depth: usize) {
        for child in self.presenter.list_groups(group) {
            self.display_entries.push(DisplayEntry::Group {
                handle: child,
                depth,
            });
            if self.expanded.contains(&child) {
                self.push_group_entries(child, depth + 1);
            }
        }
        for item in self.presenter.list_children(group) {
            self.display_entries.push(DisplayEntry::Item {
                handle: item,
                depth,
            });
        }
    }

    /// First visible entry when `height` rows fit, keeping the selection on
    /// screen.
    fn scroll_offset(&self, height: usize) -> usize {
        if height == 0 {
            return 0;
        }
        (self.current_index + 1).saturating_sub(height)
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.active_popup.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.active_popup = None;
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection_down(),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection_up(),
            KeyCode::Enter => self.activate_current_entry(),
            KeyCode::Char(' ') => self.toggle_group(),
            KeyCode::Char('i') => self.show_info_popup(),
            KeyCode::Char('d') => self.remove_selected_item(),
            KeyCode::Char('r') => self.rebuild(),
            KeyCode::Char('x') => self.export_live_menu(),
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, terminal_area: Rect) {
        if self.active_popup.is_some()
            || !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left))
        {
            return;
        }
        let areas = ui::areas(terminal_area);
        if let Some(entry_index) = self.entry_at_position(mouse.column, mouse.row, areas.body) {
            self.current_index = entry_index;
            self.activate_current_entry();
            return;
        }
        if mouse.row == areas.footer.y {
            if let Some(action) = ui::footer_action_at(mouse.column, areas.footer, &self.theme) {
                self.execute_footer_action(action);
            }
        }
    }

    fn entry_at_position(&self, column: u16, row: u16, body: Rect) -> Option<usize> {
        if column < body.x
            || column >= body.x + body.width
            || row < body.y
            || row >= body.y + body.height
        {
            return None;
        }
        let index = self.scroll_offset(body.height as usize) + (row - body.y) as usize;
        (index < self.display_entries.len()).then_some(index)
    }

    fn execute_footer_action(&mut self, action: FooterAction) {
        match action {
            FooterAction::Quit => self.should_quit = true,
            FooterAction::Execute => self.activate_current_entry(),
            FooterAction::Info => self.show_info_popup(),
            FooterAction::Remove => self.remove_selected_item(),
            FooterAction::Rebuild => self.rebuild(),
            FooterAction::Export => self.export_live_menu(),
        }
    }

    fn move_selection_up(&mut self) {
        if self.display_entries.is_empty() {
            return;
        }
        if self.current_index == 0 {
            self.current_index = self.display_entries.len() - 1;
        } else {
            self.current_index -= 1;
        }
    }

    fn move_selection_down(&mut self) {
        if self.display_entries.is_empty() {
            return;
        }
        self.current_index = (self.current_index + 1) % self.display_entries.len();
    }

    fn activate_current_entry(&mut self) {
        match self.display_entries.get(self.current_index).copied() {
            Some(DisplayEntry::Group { .. }) => self.toggle_group(),
            Some(DisplayEntry::Item { handle, .. }) => self.launch_item(handle),
            None => {}
        }
    }

    fn toggle_group(&mut self) {
        if let Some(DisplayEntry::Group { handle, .. }) =
            self.display_entries.get(self.current_index).copied()
        {
            if !self.expanded.remove(&handle) {
                self.expanded.insert(handle);
            }
            self.rebuild_display();
        }
    }

    fn selected_item(&self) -> Option<ItemHandle> {
        match self.display_entries.get(self.current_index) {
            Some(DisplayEntry::Item { handle, .. }) => Some(*handle),
            _ => None,
        }
    }

    fn launch_item(&mut self, handle: ItemHandle) {
        let (Some(name), Some(action)) = (
            self.presenter.item_name(handle),
            self.presenter.item_action(handle),
        ) else {
            return;
        };
        match Launcher::new(&self.processes).invoke(&action) {
            Ok(pid) => self.set_status(Some(format!("Started {name} (pid {pid})"))),
            Err(err) => {
                tracing::warn!("launching {name}: {err}");
                self.set_status(Some(format!("Could not start {name}")));
                self.active_popup = Some(PopupState::Message(format!("{name}: {err}")));
            }
        }
    }

    fn show_info_popup(&mut self) {
        let Some(handle) = self.selected_item() else {
            return;
        };
        let (Some(name), Some(action)) = (
            self.presenter.item_name(handle),
            self.presenter.item_action(handle),
        ) else {
            return;
        };
        let group = self
            .presenter
            .item_parent(handle)
            .and_then(|parent| self.presenter.group_name(parent))
            .unwrap_or_default();
        self.active_popup = Some(PopupState::Info(InfoPopup {
            name,
            group,
            kind: action.kind().to_string(),
            program: action.program().to_string(),
            arguments: action.arguments().map(str::to_string),
            shortcut: self.presenter.item_shortcut(handle),
        }));
    }

    fn remove_selected_item(&mut self) {
        let Some(handle) = self.selected_item() else {
            return;
        };
        let name = self.presenter.item_name(handle).unwrap_or_default();
        match self.presenter.remove(handle) {
            Ok(()) => {
                self.rebuild_display();
                self.set_status(Some(format!("Removed {name}")));
            }
            Err(err) => self.set_status(Some(format!("Remove failed: {err}"))),
        }
    }

    /// Re-reads the sources and re-installs them over the live menu.
    fn rebuild(&mut self) {
        self.install_sources(InstallMode::Replace);
        self.set_status(Some("Menu rebuilt".into()));
    }

    fn export_live_menu(&mut self) {
        let namespace = self.settings.export_namespace.clone();
        let exported = extract_tree(&mut self.presenter, &ParentRef::Root)
            .and_then(|tree| self.store.export_tree(&namespace, &tree, true));
        match exported {
            Ok(report) => {
                let mut message = format!("Exported {} entries to {namespace}", report.written);
                if !report.diagnostics.is_empty() {
                    message.push_str(&format!(" ({} warnings)", report.diagnostics.len()));
                }
                self.set_status(Some(message));
            }
            Err(err) => {
                tracing::warn!("export to {namespace}: {err}");
                self.active_popup = Some(PopupState::Message(format!("Export failed: {err}")));
            }
        }
    }

    fn set_status(&mut self, message: Option<String>) {
        self.status_message = message;
    }

    fn status_text(&self) -> String {
        let total = self.display_entries.len();
        let current = if total == 0 {
            0
        } else {
            self.current_index + 1
        };
        let mut text = format!("Entry {current}/{total} | {}", self.build_summary);
        if let Some(msg) = &self.status_message {
            text.push_str(" | ");
            text.push_str(msg);
        }
        text
    }
}
