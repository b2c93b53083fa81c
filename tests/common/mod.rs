#![allow(dead_code)]

use async_trait::async_trait;
use journal_provision::core::{CommandOutput, CommandRunner, CommandSpec};
use journal_provision::{ProvisionConfig, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeService {
    pub executable: String,
    pub properties: BTreeMap<String, Vec<String>>,
    pub running: bool,
    pub wedged: bool,
}

#[derive(Debug, Default)]
pub struct HostState {
    pub services: BTreeMap<String, FakeService>,
    pub clones: usize,
    pub pulls: usize,
    pub venvs_created: usize,
    pub pip_installs: usize,
    pub fail_pip: bool,
    pub fail_start: bool,
    /// 每筆為 "<程式名> <參數...>"
    pub commands: Vec<String>,
}

/// 模擬一台主機：git、python、pip 與服務管理程式都只改動暫存目錄和記憶體狀態
pub struct FakeHost {
    root: TempDir,
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("nssm.exe"), b"MZ").unwrap();
        Arc::new(Self {
            root,
            state: Mutex::new(HostState::default()),
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn project_dir(&self) -> PathBuf {
        self.root.path().join("trading-journal")
    }

    pub fn manager_path(&self) -> PathBuf {
        self.root.path().join("nssm.exe")
    }

    pub fn config(&self) -> ProvisionConfig {
        self.config_with(8000, 4)
    }

    pub fn config_with(&self, port: u16, workers: usize) -> ProvisionConfig {
        let content = format!(
            r#"
[project]
directory = "{}"
repository_url = "https://github.com/acme/trading-journal-api.git"

[service]
name = "TradingJournalAPI"
manager_path = "{}"
description = "Trading journal API"

[service.environment]
MT5_EXPERTS_PATH = "C:/MT5/MQL5/Experts"

[service.launch]
port = {}
workers = {}
"#,
            slash(&self.project_dir()),
            slash(&self.manager_path()),
            port,
            workers
        );
        ProvisionConfig::from_toml_str(&content).unwrap()
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut HostState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn service(&self, name: &str) -> Option<FakeService> {
        self.with_state(|s| s.services.get(name).cloned())
    }

    pub fn commands(&self) -> Vec<String> {
        self.with_state(|s| s.commands.clone())
    }

    pub fn install_service(&self, name: &str, parameters: &str) {
        self.with_state(|s| {
            let mut properties = BTreeMap::new();
            properties.insert("AppParameters".to_string(), vec![parameters.to_string()]);
            s.services.insert(
                name.to_string(),
                FakeService {
                    executable: "C:/old/python.exe".to_string(),
                    properties,
                    running: true,
                    wedged: false,
                },
            );
        });
    }

    fn handle_git(&self, args: &[String]) -> CommandOutput {
        match args.first().map(String::as_str) {
            Some("--version") => CommandOutput::success("git version 2.45.1.windows.1"),
            Some("clone") => {
                let Some(dest) = args.last() else {
                    return CommandOutput::failure(129, "usage: git clone");
                };
                let dest = PathBuf::from(dest);
                if dest.join(".git").exists() {
                    return CommandOutput::failure(
                        128,
                        "fatal: destination path already exists and is not an empty directory.",
                    );
                }
                std::fs::create_dir_all(dest.join(".git")).unwrap();
                std::fs::write(dest.join("requirements.txt"), "fastapi\nuvicorn\nMetaTrader5\n")
                    .unwrap();
                std::fs::write(dest.join("main.py"), "app = None\n").unwrap();
                self.with_state(|s| s.clones += 1);
                CommandOutput::success("Cloning into 'trading-journal'...")
            }
            Some("-C") if args.get(2).map(String::as_str) == Some("pull") => {
                if !Path::new(&args[1]).join(".git").exists() {
                    return CommandOutput::failure(128, "fatal: not a git repository");
                }
                self.with_state(|s| s.pulls += 1);
                CommandOutput::success("Already up to date.")
            }
            _ => CommandOutput::failure(1, "unsupported git invocation"),
        }
    }

    fn handle_interpreter(&self, args: &[String]) -> CommandOutput {
        match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["--version"] => CommandOutput::success("Python 3.12.4"),
            ["-m", "venv", dir] => {
                let dir = Path::new(dir);
                std::fs::create_dir_all(dir).unwrap();
                std::fs::write(dir.join("pyvenv.cfg"), "home = C:/Python312\n").unwrap();
                self.with_state(|s| s.venvs_created += 1);
                CommandOutput::success("")
            }
            _ => CommandOutput::failure(2, "unsupported python invocation"),
        }
    }

    fn handle_pip(&self, args: &[String]) -> CommandOutput {
        if args.get(1).map(String::as_str) != Some("pip") {
            return CommandOutput::failure(2, "unsupported venv invocation");
        }
        self.with_state(|s| {
            if s.fail_pip {
                CommandOutput::failure(
                    1,
                    "ERROR: Could not find a version that satisfies the requirement MetaTrader5",
                )
            } else {
                s.pip_installs += 1;
                CommandOutput::success("Successfully installed fastapi uvicorn")
            }
        })
    }

    fn handle_manager(&self, args: &[String]) -> CommandOutput {
        let (Some(sub), Some(name)) = (args.first(), args.get(1)) else {
            return CommandOutput::failure(1, "usage: nssm <command> <service>");
        };

        self.with_state(|s| match sub.as_str() {
            "status" => match s.services.get(name) {
                Some(svc) if svc.running => CommandOutput::success("SERVICE_RUNNING"),
                Some(_) => CommandOutput::success("SERVICE_STOPPED"),
                None => CommandOutput::failure(3, "Can't open service!"),
            },
            "install" => {
                if s.services.contains_key(name) {
                    return CommandOutput::failure(5, "Error creating service!");
                }
                s.services.insert(
                    name.clone(),
                    FakeService {
                        executable: args.get(2).cloned().unwrap_or_default(),
                        properties: BTreeMap::new(),
                        running: false,
                        wedged: false,
                    },
                );
                CommandOutput::success(format!("Service \"{}\" installed successfully!", name))
            }
            "set" => match (s.services.get_mut(name), args.get(2)) {
                (Some(svc), Some(property)) => {
                    svc.properties.insert(property.clone(), args[3..].to_vec());
                    CommandOutput::success("Set parameter successfully!")
                }
                _ => CommandOutput::failure(3, "Can't open service!"),
            },
            "stop" => match s.services.get_mut(name) {
                Some(svc) if svc.wedged => {
                    CommandOutput::failure(1, "Unexpected status SERVICE_STOP_PENDING")
                }
                Some(svc) if svc.running => {
                    svc.running = false;
                    CommandOutput::success("SERVICE_STOPPED")
                }
                Some(_) => CommandOutput::failure(1, "The service has not been started."),
                None => CommandOutput::failure(3, "Can't open service!"),
            },
            "remove" => match s.services.get(name).map(|svc| svc.wedged) {
                Some(true) => CommandOutput::failure(
                    1,
                    "The specified service has been marked for deletion.",
                ),
                Some(false) => {
                    s.services.remove(name);
                    CommandOutput::success("Service removed successfully!")
                }
                None => CommandOutput::failure(3, "Can't open service!"),
            },
            "start" if s.fail_start => CommandOutput::failure(
                2,
                "StartService(): The service did not respond to the start or control request in a timely fashion.",
            ),
            "start" => match s.services.get_mut(name) {
                Some(svc) => {
                    svc.running = true;
                    CommandOutput::success("SERVICE_START_PENDING")
                }
                None => CommandOutput::failure(3, "Can't open service!"),
            },
            _ => CommandOutput::failure(1, "unknown command"),
        })
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let program = spec.program_name();
        self.with_state(|s| {
            s.commands
                .push(format!("{} {}", program, spec.args.join(" ")))
        });

        let output = if program == "git" {
            self.handle_git(&spec.args)
        } else if program == "nssm.exe" {
            self.handle_manager(&spec.args)
        } else if spec.program.components().count() > 1 {
            // 絕對路徑的直譯器就是虛擬環境裡的那一個
            self.handle_pip(&spec.args)
        } else {
            self.handle_interpreter(&spec.args)
        };
        Ok(output)
    }
}

pub fn slash(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
