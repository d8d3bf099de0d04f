//! Starting the program an action describes. Launches are fire-and-forget:
//! only the success of the spawn itself is reported.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::catalog;
use crate::error::CatalogError;
use crate::model::{Action, ActionKind, WindowStyle};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: String,
    /// Already escaped for the target shell.
    pub arguments: Option<String>,
    pub window: WindowStyle,
    pub elevated: bool,
}

pub trait ProcessLauncher {
    /// Starts the process and returns its pid without waiting for it.
    fn launch(&self, request: &LaunchRequest) -> std::io::Result<u32>;
}

/// Spawns the program directly with stdio detached. No shell sees the
/// program or its arguments.
#[derive(Clone, Debug, Default)]
pub struct SystemLauncher {
    elevation_command: Option<String>,
}

impl SystemLauncher {
    pub fn new(elevation_command: Option<String>) -> Self {
        Self { elevation_command }
    }

    /// Program first, then each argument, as handed to the OS.
    pub fn argv(&self, request: &LaunchRequest) -> Vec<String> {
        let mut argv = Vec::new();
        if request.elevated && !cfg!(windows) {
            if let Some(prefix) = &self.elevation_command {
                argv.extend(split_arguments(prefix));
            }
        }
        argv.push(request.program.clone());
        if let Some(arguments) = &request.arguments {
            argv.extend(split_arguments(arguments));
        }
        argv
    }

    /// A copy-pasteable rendering of [`argv`](Self::argv), for logs.
    pub fn command_line(&self, request: &LaunchRequest) -> String {
        let argv = self.argv(request);
        shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
    }

    #[cfg(not(windows))]
    fn command(&self, request: &LaunchRequest) -> Command {
        let mut argv = self.argv(request).into_iter();
        let mut command = Command::new(argv.next().unwrap_or_default());
        command.args(argv);
        command
    }

    #[cfg(windows)]
    fn command(&self, request: &LaunchRequest) -> Command {
        use std::os::windows::process::CommandExt;

        const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

        if request.elevated {
            let mut script = format!(
                "Start-Process -Verb RunAs -FilePath '{}'",
                request.program.replace('\'', "''")
            );
            if let Some(arguments) = &request.arguments {
                script.push_str(&format!(" -ArgumentList '{}'", arguments.replace('\'', "''")));
            }
            let mut command = Command::new("powershell");
            command.args(["-NoProfile", "-Command", script.as_str()]);
            return command;
        }
        let mut command = Command::new(&request.program);
        // arguments are already escaped for the Windows command line
        if let Some(arguments) = &request.arguments {
            command.raw_arg(arguments);
        }
        if request.window == WindowStyle::Normal {
            command.creation_flags(CREATE_NEW_CONSOLE);
        }
        command
    }
}

/// Splits a pre-escaped argument string POSIX-style. A string that does not
/// split cleanly (an unbalanced quote) is passed on as one argument.
fn split_arguments(arguments: &str) -> Vec<String> {
    shlex::split(arguments).unwrap_or_else(|| {
        tracing::debug!("passing unsplittable arguments as one: {arguments}");
        vec![arguments.to_string()]
    })
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, request: &LaunchRequest) -> std::io::Result<u32> {
        tracing::debug!("spawning {}", self.command_line(request));
        let mut child = self
            .command(request)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();
        // reap in the background so the child does not linger as a zombie
        std::thread::spawn(move || {
            if let Err(err) = child.wait() {
                tracing::debug!("wait for pid {pid} failed: {err}");
            }
        });
        Ok(pid)
    }
}

pub struct Launcher<'a> {
    processes: &'a dyn ProcessLauncher,
}

impl<'a> Launcher<'a> {
    pub fn new(processes: &'a dyn ProcessLauncher) -> Self {
        Self { processes }
    }

    /// Maps an action to a launch request. `LaunchByName` reads the catalog
    /// now, so edits made since the menu was built take effect.
    pub fn request_for(&self, action: &Action) -> Result<LaunchRequest, CatalogError> {
        let request = match action.kind() {
            ActionKind::LaunchByName => {
                let key = action.arguments().unwrap_or_default();
                let program = catalog::lookup_program(Path::new(action.program()), key)?;
                LaunchRequest {
                    program,
                    arguments: None,
                    window: WindowStyle::Normal,
                    elevated: false,
                }
            }
            kind => LaunchRequest {
                program: action.program().to_string(),
                arguments: action.arguments().map(str::to_string),
                window: action.window(),
                elevated: kind == ActionKind::RunProcessElevatedArgs,
            },
        };
        Ok(request)
    }

    pub fn invoke(&self, action: &Action) -> Result<u32, CatalogError> {
        let request = self.request_for(action)?;
        let pid = self
            .processes
            .launch(&request)
            .map_err(|source| CatalogError::Launch {
                program: request.program.clone(),
                source,
            })?;
        tracing::info!("launched {} (pid {pid})", request.program);
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        requests: RefCell<Vec<LaunchRequest>>,
        fail: bool,
    }

    impl ProcessLauncher for Recorder {
        fn launch(&self, request: &LaunchRequest) -> std::io::Result<u32> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
            }
            self.requests.borrow_mut().push(request.clone());
            Ok(42)
        }
    }

    #[test]
    fn run_process_passes_arguments_through() {
        let recorder = Recorder::default();
        let launcher = Launcher::new(&recorder);
        let action = Action::new(ActionKind::RunProcess, "/opt/My Tool/tool")
            .with_arguments("--name \\\"x y\\\"")
            .with_window(WindowStyle::Normal);
        assert_eq!(launcher.invoke(&action).unwrap(), 42);
        let requests = recorder.requests.borrow();
        assert_eq!(requests[0].program, "/opt/My Tool/tool");
        assert_eq!(requests[0].arguments.as_deref(), Some("--name \\\"x y\\\""));
        assert_eq!(requests[0].window, WindowStyle::Normal);
        assert!(!requests[0].elevated);
    }

    #[test]
    fn elevated_kind_sets_the_flag() {
        let recorder = Recorder::default();
        let action = Action::new(ActionKind::RunProcessElevatedArgs, "/usr/sbin/service");
        Launcher::new(&recorder).invoke(&action).unwrap();
        assert!(recorder.requests.borrow()[0].elevated);
    }

    #[test]
    fn launch_by_name_reads_the_catalog_at_invocation() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("apps.csv");
        fs::write(&csv, "App,AppPath\ngrep,/bin/grep\n").unwrap();
        let action =
            Action::new(ActionKind::LaunchByName, csv.to_string_lossy()).with_arguments("grep");

        fs::write(&csv, "App,AppPath\ngrep,/usr/local/bin/grep\n").unwrap();
        let recorder = Recorder::default();
        Launcher::new(&recorder).invoke(&action).unwrap();
        assert_eq!(recorder.requests.borrow()[0].program, "/usr/local/bin/grep");

        fs::remove_file(&csv).unwrap();
        let err = Launcher::new(&recorder).invoke(&action).unwrap_err();
        assert!(matches!(err, CatalogError::FileNotFound(_)));
    }

    #[test]
    fn spawn_failure_is_surfaced() {
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let err = Launcher::new(&recorder)
            .invoke(&Action::new(ActionKind::RunProcess, "/nope"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Launch { .. }));
    }

    #[test]
    fn elevated_requests_are_prefixed() {
        let launcher = SystemLauncher::new(Some("sudo -A".into()));
        let request = LaunchRequest {
            program: "/opt/My Tool/tool".into(),
            arguments: Some("-v \"/srv/my data\"".into()),
            window: WindowStyle::Default,
            elevated: true,
        };
        let argv = launcher.argv(&request);
        if cfg!(windows) {
            assert_eq!(argv[0], "/opt/My Tool/tool");
        } else {
            assert_eq!(argv, vec!["sudo", "-A", "/opt/My Tool/tool", "-v", "/srv/my data"]);
            let line = launcher.command_line(&request);
            assert_eq!(shlex::split(&line), Some(argv));
        }
    }

    #[test]
    fn escaped_quotes_stay_inside_one_argument() {
        let request = LaunchRequest {
            program: "tool".into(),
            arguments: Some("--name \\\"x y\\\" 'it''s'".into()),
            window: WindowStyle::Default,
            elevated: false,
        };
        let argv = SystemLauncher::default().argv(&request);
        assert_eq!(argv, vec!["tool", "--name", "\"x", "y\"", "its"]);

        let unbalanced = LaunchRequest {
            arguments: Some("it's".into()),
            ..request
        };
        assert_eq!(SystemLauncher::default().argv(&unbalanced), vec!["tool", "it's"]);
    }

    #[cfg(unix)]
    #[test]
    fn file_names_are_never_run_as_shell_code() {
        use crate::resolver::{ActionResolver, FsEntry, HostCommands, UnavailableShortcutParser};

        let dir = TempDir::new().unwrap();
        let marker = format!("menu-catalog-marker-{}", std::process::id());
        let script = dir.path().join(format!("$(touch {marker}).ps1"));
        fs::write(&script, "").unwrap();
        let host = HostCommands {
            script_editor: "true".into(),
            ..HostCommands::default()
        };
        let action = ActionResolver::new(&host, &UnavailableShortcutParser)
            .resolve(&FsEntry::new(&script))
            .unwrap();

        let processes = SystemLauncher::default();
        let launcher = Launcher::new(&processes);
        let request = launcher.request_for(&action).unwrap();
        assert_eq!(
            processes.argv(&request),
            vec!["true".to_string(), script.to_string_lossy().to_string()]
        );

        launcher.invoke(&action).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(300));
        let created = std::path::Path::new(&marker).exists();
        let _ = fs::remove_file(&marker);
        assert!(!created);
    }
}
