use crate::config::toml_config::StartPolicy;
use crate::domain::model::CommandSpec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 服務包裝程式 (NSSM) 的指令組裝
#[derive(Debug, Clone)]
pub struct ServiceManager {
    executable: PathBuf,
    service: String,
}

/// 註冊時寫入的服務定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub executable: PathBuf,
    pub arguments: String,
    pub working_directory: PathBuf,
    pub display_name: String,
    pub description: String,
    pub start_policy: StartPolicy,
    pub stdout_log: Option<PathBuf>,
    pub stderr_log: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
}

impl ServiceManager {
    pub fn new(executable: impl Into<PathBuf>, service: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            service: service.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn command(&self, subcommand: &str) -> CommandSpec {
        CommandSpec::new(&self.executable).args([subcommand, self.service.as_str()])
    }

    /// 結束碼為 0 代表服務存在
    pub fn status(&self) -> CommandSpec {
        self.command("status").read_only()
    }

    pub fn stop(&self) -> CommandSpec {
        self.command("stop")
    }

    pub fn remove(&self) -> CommandSpec {
        self.command("remove").arg("confirm")
    }

    pub fn start(&self) -> CommandSpec {
        self.command("start")
    }

    pub fn install(&self, executable: &Path) -> CommandSpec {
        self.command("install")
            .arg(executable.display().to_string())
    }

    pub fn set(&self, property: &str, values: &[String]) -> CommandSpec {
        self.command("set")
            .arg(property)
            .args(values.iter().cloned())
    }

    /// 註冊服務所需的完整指令序列：install 之後逐一設定屬性
    pub fn registration_commands(&self, definition: &ServiceDefinition) -> Vec<CommandSpec> {
        let mut commands = vec![
            self.install(&definition.executable),
            self.set("AppParameters", &[definition.arguments.clone()]),
            self.set(
                "AppDirectory",
                &[definition.working_directory.display().to_string()],
            ),
            self.set("DisplayName", &[definition.display_name.clone()]),
            self.set("Description", &[definition.description.clone()]),
            self.set("Start", &[definition.start_policy.as_manager_value().to_string()]),
        ];

        if let Some(path) = &definition.stdout_log {
            commands.push(self.set("AppStdout", &[path.display().to_string()]));
        }
        if let Some(path) = &definition.stderr_log {
            commands.push(self.set("AppStderr", &[path.display().to_string()]));
        }
        if !definition.environment.is_empty() {
            let pairs: Vec<String> = definition
                .environment
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            commands.push(self.set("AppEnvironmentExtra", &pairs));
        }

        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ServiceDefinition {
        ServiceDefinition {
            executable: PathBuf::from("C:/journal/.venv/Scripts/python.exe"),
            arguments: "-m uvicorn main:app --host 0.0.0.0 --port 8000 --workers 4".to_string(),
            working_directory: PathBuf::from("C:/journal"),
            display_name: "Trading Journal API".to_string(),
            description: "Trading journal API".to_string(),
            start_policy: StartPolicy::Auto,
            stdout_log: None,
            stderr_log: None,
            environment: BTreeMap::new(),
        }
    }

    #[test]
    fn test_status_is_read_only() {
        let manager = ServiceManager::new("C:/nssm/nssm.exe", "JournalAPI");
        let status = manager.status();
        assert!(status.read_only);
        assert_eq!(status.args, vec!["status", "JournalAPI"]);
        assert!(!manager.stop().read_only);
        assert_eq!(manager.remove().args, vec!["remove", "JournalAPI", "confirm"]);
    }

    #[test]
    fn test_registration_commands_minimal() {
        let manager = ServiceManager::new("C:/nssm/nssm.exe", "JournalAPI");
        let commands = manager.registration_commands(&definition());

        let rendered: Vec<String> = commands.iter().map(|c| c.args.join("|")).collect();
        assert_eq!(
            rendered,
            vec![
                "install|JournalAPI|C:/journal/.venv/Scripts/python.exe",
                "set|JournalAPI|AppParameters|-m uvicorn main:app --host 0.0.0.0 --port 8000 --workers 4",
                "set|JournalAPI|AppDirectory|C:/journal",
                "set|JournalAPI|DisplayName|Trading Journal API",
                "set|JournalAPI|Description|Trading journal API",
                "set|JournalAPI|Start|SERVICE_AUTO_START",
            ]
        );
    }

    #[test]
    fn test_registration_commands_with_logs_and_environment() {
        let manager = ServiceManager::new("nssm.exe", "JournalAPI");
        let mut def = definition();
        def.stdout_log = Some(PathBuf::from("C:/journal/logs/out.log"));
        def.stderr_log = Some(PathBuf::from("C:/journal/logs/err.log"));
        def.environment.insert("MT5_EXPERTS_PATH".to_string(), "C:/MT5/Experts".to_string());
        def.environment.insert("APP_ENV".to_string(), "production".to_string());

        let commands = manager.registration_commands(&def);
        assert_eq!(commands.len(), 9);

        let env = commands.last().unwrap();
        assert_eq!(
            env.args,
            vec![
                "set",
                "JournalAPI",
                "AppEnvironmentExtra",
                "APP_ENV=production",
                "MT5_EXPERTS_PATH=C:/MT5/Experts",
            ]
        );
    }
}
