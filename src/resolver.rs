//! Turns one file-system entry into an [`Action`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::model::{Action, ActionKind, WindowStyle};

/// Host-side commands the resolver points actions at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostCommands {
    #[serde(default = "default_script_editor")]
    pub script_editor: String,
    #[serde(default = "default_url_handler")]
    pub url_handler: String,
    /// Probed in order when opening documents; first existing wins.
    #[serde(default = "default_browser_candidates")]
    pub browser_candidates: Vec<PathBuf>,
    #[serde(default = "default_elevation_command")]
    pub elevation_command: Option<String>,
}

impl Default for HostCommands {
    fn default() -> Self {
        Self {
            script_editor: default_script_editor(),
            url_handler: default_url_handler(),
            browser_candidates: default_browser_candidates(),
            elevation_command: default_elevation_command(),
        }
    }
}

/// Launches are detached from any terminal, so scripts open in the
/// desktop's graphical handler rather than `$EDITOR`.
fn default_script_editor() -> String {
    if cfg!(windows) {
        "notepad.exe".into()
    } else {
        default_url_handler()
    }
}

fn default_url_handler() -> String {
    if cfg!(windows) {
        "explorer.exe".into()
    } else if cfg!(target_os = "macos") {
        "open".into()
    } else {
        "xdg-open".into()
    }
}

fn default_browser_candidates() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

fn default_elevation_command() -> Option<String> {
    if cfg!(windows) {
        None
    } else {
        Some("sudo".into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortcutTarget {
    pub target: String,
    pub arguments: String,
}

/// Reads a `.lnk`-style shortcut. The binary format is not parsed here.
pub trait ShortcutParser {
    fn parse(&self, path: &Path) -> anyhow::Result<ShortcutTarget>;
}

/// Used when the host offers no shortcut reader: every `.lnk` is skipped.
pub struct UnavailableShortcutParser;

impl ShortcutParser for UnavailableShortcutParser {
    fn parse(&self, _path: &Path) -> anyhow::Result<ShortcutTarget> {
        anyhow::bail!("no shortcut reader is available on this host")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEntry {
    path: PathBuf,
    name: String,
}

impl FsEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name without extension; becomes the menu item name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

pub struct ActionResolver<'a> {
    host: &'a HostCommands,
    shortcuts: &'a dyn ShortcutParser,
}

impl<'a> ActionResolver<'a> {
    pub fn new(host: &'a HostCommands, shortcuts: &'a dyn ShortcutParser) -> Self {
        Self { host, shortcuts }
    }

    pub fn resolve(&self, entry: &FsEntry) -> Result<Action, ResolveError> {
        let extension = entry.extension().unwrap_or_default();
        let full_path = entry.path().to_string_lossy().to_string();
        let action = match extension.as_str() {
            "lnk" => {
                let shortcut =
                    self.shortcuts
                        .parse(entry.path())
                        .map_err(|err| ResolveError::Shortcut {
                            path: entry.path().to_path_buf(),
                            reason: err.to_string(),
                        })?;
                Action::new(ActionKind::RunProcess, shortcut.target)
                    .with_arguments(escape_quotes(&shortcut.arguments))
            }
            "ps1" => Action::new(ActionKind::EditInHost, self.host.script_editor.clone())
                .with_arguments(quote_argument(&full_path)),
            "bat" | "cmd" => {
                Action::new(ActionKind::RunProcess, full_path).with_window(WindowStyle::Normal)
            }
            "exe" => Action::new(ActionKind::RunProcess, full_path),
            "pdf" => {
                let browser = self
                    .host
                    .browser_candidates
                    .iter()
                    .find(|candidate| candidate.exists())
                    .ok_or_else(|| ResolveError::BrowserNotFound(entry.path().to_path_buf()))?;
                Action::new(ActionKind::OpenDocument, browser.to_string_lossy())
                    .with_arguments(file_uri(entry.path()))
            }
            "url" => {
                let url = read_url_file(entry.path())?;
                Action::new(ActionKind::OpenUrl, self.host.url_handler.clone()).with_arguments(url)
            }
            _ => return Err(ResolveError::UnsupportedExtension(extension.clone())),
        };
        tracing::debug!(
            "resolved {} to {} {}",
            entry.path().display(),
            action.kind(),
            action.command_line()
        );
        Ok(action.with_source_extension(extension))
    }
}

/// First `URL=` line of an internet shortcut, prefix stripped.
fn read_url_file(path: &Path) -> Result<String, ResolveError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    text.lines()
        .find_map(|line| {
            let prefix = line.get(..4)?;
            prefix
                .eq_ignore_ascii_case("URL=")
                .then(|| line[4..].trim().to_string())
        })
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ResolveError::MalformedUrlFile(path.to_path_buf()))
}

pub fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Wraps a single argument in double quotes so embedded spaces survive.
pub fn quote_argument(value: &str) -> String {
    format!("\"{}\"", escape_quotes(value))
}

/// `file://` URI with forward slashes and percent-escaped segments.
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded = raw
        .split('/')
        .enumerate()
        .map(|(index, segment)| {
            if index == 0 && is_drive(segment) {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    if encoded.starts_with("//") {
        format!("file:{encoded}")
    } else if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct MapShortcuts(HashMap<PathBuf, ShortcutTarget>);

    impl ShortcutParser for MapShortcuts {
        fn parse(&self, path: &Path) -> anyhow::Result<ShortcutTarget> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("not a shortcut"))
        }
    }

    fn host_with_browser(browser: Option<PathBuf>) -> HostCommands {
        HostCommands {
            script_editor: "psedit".into(),
            url_handler: "url-open".into(),
            browser_candidates: browser.into_iter().collect(),
            elevation_command: None,
        }
    }

    fn touch(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn resolves_every_supported_extension() {
        let dir = TempDir::new().unwrap();
        let browser = touch(&dir, "browser", "");
        let host = host_with_browser(Some(browser));
        let lnk = touch(&dir, "tool.lnk", "");
        let shortcuts = MapShortcuts(HashMap::from([(
            lnk.clone(),
            ShortcutTarget {
                target: "/opt/tool/tool".into(),
                arguments: "--fast".into(),
            },
        )]));
        let resolver = ActionResolver::new(&host, &shortcuts);

        let files = [
            lnk,
            touch(&dir, "script.ps1", ""),
            touch(&dir, "job.bat", ""),
            touch(&dir, "job2.CMD", ""),
            touch(&dir, "app.exe", ""),
            touch(&dir, "manual.pdf", ""),
            touch(&dir, "site.url", "[InternetShortcut]\nURL=https://example.com\n"),
        ];
        for file in files {
            let action = resolver.resolve(&FsEntry::new(&file)).unwrap();
            assert!(!action.program().is_empty(), "{}", file.display());
        }
    }

    #[test]
    fn unsupported_extension_fails() {
        let host = host_with_browser(None);
        let resolver = ActionResolver::new(&host, &UnavailableShortcutParser);
        let err = resolver
            .resolve(&FsEntry::new("/data/notes.xyz"))
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedExtension(ext) if ext == "xyz"));
    }

    #[test]
    fn url_file_yields_open_url() {
        let dir = TempDir::new().unwrap();
        let host = host_with_browser(None);
        let resolver = ActionResolver::new(&host, &UnavailableShortcutParser);

        let good = touch(&dir, "site.url", "[InternetShortcut]\r\nURL=https://example.com\r\n");
        let action = resolver.resolve(&FsEntry::new(&good)).unwrap();
        assert_eq!(action.kind(), ActionKind::OpenUrl);
        assert_eq!(action.program(), "url-open");
        assert_eq!(action.arguments(), Some("https://example.com"));

        let bad = touch(&dir, "broken.url", "[InternetShortcut]\nIconIndex=0\n");
        let err = resolver.resolve(&FsEntry::new(&bad)).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedUrlFile(_)));
    }

    #[test]
    fn script_path_with_spaces_is_quoted() {
        let host = host_with_browser(None);
        let resolver = ActionResolver::new(&host, &UnavailableShortcutParser);
        let action = resolver
            .resolve(&FsEntry::new("/home/me/My Scripts/deploy.ps1"))
            .unwrap();
        assert_eq!(action.kind(), ActionKind::EditInHost);
        assert_eq!(action.program(), "psedit");
        assert_eq!(action.arguments(), Some("\"/home/me/My Scripts/deploy.ps1\""));
        assert_eq!(action.source_extension(), "ps1");
    }

    #[test]
    fn batch_files_request_a_normal_window() {
        let host = host_with_browser(None);
        let resolver = ActionResolver::new(&host, &UnavailableShortcutParser);
        let action = resolver.resolve(&FsEntry::new("/jobs/nightly.bat")).unwrap();
        assert_eq!(action.kind(), ActionKind::RunProcess);
        assert_eq!(action.program(), "/jobs/nightly.bat");
        assert_eq!(action.window(), WindowStyle::Normal);

        let exe = resolver.resolve(&FsEntry::new("/bin/app.exe")).unwrap();
        assert_eq!(exe.arguments(), None);
        assert_eq!(exe.window(), WindowStyle::Default);
    }

    #[test]
    fn pdf_without_browser_fails() {
        let host = host_with_browser(Some(PathBuf::from("/definitely/not/here")));
        let resolver = ActionResolver::new(&host, &UnavailableShortcutParser);
        let err = resolver.resolve(&FsEntry::new("/docs/a.pdf")).unwrap_err();
        assert!(matches!(err, ResolveError::BrowserNotFound(_)));
    }

    #[test]
    fn pdf_uses_first_existing_browser_and_file_uri() {
        let dir = TempDir::new().unwrap();
        let second = touch(&dir, "browser32", "");
        let host = HostCommands {
            browser_candidates: vec![dir.path().join("browser64"), second.clone()],
            ..host_with_browser(None)
        };
        let resolver = ActionResolver::new(&host, &UnavailableShortcutParser);
        let action = resolver
            .resolve(&FsEntry::new("/docs/Annual Report.pdf"))
            .unwrap();
        assert_eq!(action.kind(), ActionKind::OpenDocument);
        assert_eq!(action.program(), second.to_string_lossy());
        assert_eq!(action.arguments(), Some("file:///docs/Annual%20Report.pdf"));
    }

    #[test]
    fn shortcut_quotes_are_escaped_and_round_trip() {
        let lnk = PathBuf::from("/menus/Deploy Tool.lnk");
        let shortcuts = MapShortcuts(HashMap::from([(
            lnk.clone(),
            ShortcutTarget {
                target: "C:\\Program Files\\Deploy Tool\\deploy.exe".into(),
                arguments: "--message \"hello world\"".into(),
            },
        )]));
        let host = host_with_browser(None);
        let resolver = ActionResolver::new(&host, &shortcuts);
        let action = resolver.resolve(&FsEntry::new(&lnk)).unwrap();
        assert_eq!(action.program(), "C:\\Program Files\\Deploy Tool\\deploy.exe");
        assert_eq!(action.arguments(), Some("--message \\\"hello world\\\""));

        let record = action.to_record().unwrap();
        let decoded = Action::from_record(&record).unwrap();
        assert_eq!(decoded.to_record().unwrap(), record);
        assert_eq!(decoded.arguments(), action.arguments());
    }

    #[test]
    fn unreadable_shortcut_is_an_entry_failure() {
        let host = host_with_browser(None);
        let resolver = ActionResolver::new(&host, &UnavailableShortcutParser);
        let err = resolver.resolve(&FsEntry::new("/menus/x.lnk")).unwrap_err();
        assert!(matches!(err, ResolveError::Shortcut { .. }));
    }

    #[test]
    fn file_uri_handles_drive_letters() {
        assert_eq!(
            file_uri(Path::new("C:\\My Docs\\a#1.pdf")),
            "file:///C:/My%20Docs/a%231.pdf"
        );
        assert_eq!(file_uri(Path::new("/tmp/x.pdf")), "file:///tmp/x.pdf");
    }

    #[test]
    fn scripts_default_to_a_graphical_opener() {
        let host = HostCommands::default();
        if cfg!(windows) {
            assert_eq!(host.script_editor, "notepad.exe");
        } else {
            assert_eq!(host.script_editor, host.url_handler);
        }
        assert!(!["vi", "vim", "nano"].contains(&host.script_editor.as_str()));
    }
}
