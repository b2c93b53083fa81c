use crate::utils::error::{ProvisionError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LAUNCH_TEMPLATE: &str =
    "-m uvicorn {app} --host {host} --port {port} --workers {workers}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    pub project: ProjectConfig,
    pub python: Option<PythonConfig>,
    pub service: ServiceConfig,
    pub execution: Option<ExecutionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub directory: String,
    pub repository_url: String,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PythonConfig {
    pub interpreter: Option<String>,
    pub venv_dir: Option<String>,
    pub requirements: Option<String>,
    pub upgrade_pip: Option<bool>,
    pub extra_packages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub manager_path: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub start_policy: Option<StartPolicy>,
    pub stdout_log: Option<String>,
    pub stderr_log: Option<String>,
    pub environment: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub template: Option<String>,
    pub app: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPolicy {
    #[default]
    Auto,
    Delayed,
    Manual,
}

impl StartPolicy {
    /// 服務管理程式 `Start` 屬性的值
    pub fn as_manager_value(self) -> &'static str {
        match self {
            StartPolicy::Auto => "SERVICE_AUTO_START",
            StartPolicy::Delayed => "SERVICE_DELAYED_AUTO_START",
            StartPolicy::Manual => "SERVICE_DEMAND_START",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub command_timeout_seconds: Option<u64>,
}

impl ProvisionConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ProvisionError::ConfigValidationError {
                field: "config_file".to_string(),
                message: format!("cannot read {}: {}", path.as_ref().display(), e),
            }
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ProvisionError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${REPO_TOKEN})，找不到的保留原樣。
    /// 值會先跳脫成 TOML 基本字串內容，Windows 路徑的反斜線才不會被當成跳脫序列
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProvisionError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => escape_toml_basic(&value),
                Err(_) => format!("${{{}}}", var_name),
            }
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_absolute_path("project.directory", &self.project.directory)?;
        validation::validate_repository_url("project.repository_url", &self.project.repository_url)?;
        if let Some(branch) = &self.project.branch {
            validation::validate_non_empty_string("project.branch", branch)?;
        }

        validation::validate_non_empty_string("python.interpreter", self.interpreter())?;
        validation::validate_relative_path("python.venv_dir", self.venv_dir_name())?;
        validation::validate_relative_path("python.requirements", self.requirements_name())?;

        validation::validate_service_name("service.name", &self.service.name)?;
        validation::validate_path("service.manager_path", &self.service.manager_path)?;
        validation::validate_range("service.launch.port", self.port(), 1, u16::MAX)?;
        validation::validate_positive_number("service.launch.workers", self.workers(), 1)?;
        self.launch_arguments()?;

        for key in self.service_environment().keys() {
            if key.trim().is_empty() || key.contains('=') {
                return Err(ProvisionError::InvalidConfigValueError {
                    field: "service.environment".to_string(),
                    value: key.clone(),
                    reason: "Variable names cannot be empty or contain '='".to_string(),
                });
            }
        }

        if let Some(seconds) = self.execution.as_ref().and_then(|e| e.command_timeout_seconds) {
            validation::validate_positive_number(
                "execution.command_timeout_seconds",
                seconds as usize,
                1,
            )?;
        }

        Ok(())
    }

    pub fn project_dir(&self) -> PathBuf {
        PathBuf::from(&self.project.directory)
    }

    pub fn repository_url(&self) -> &str {
        &self.project.repository_url
    }

    pub fn branch(&self) -> Option<&str> {
        self.project.branch.as_deref()
    }

    pub fn interpreter(&self) -> &str {
        self.python
            .as_ref()
            .and_then(|p| p.interpreter.as_deref())
            .unwrap_or("python")
    }

    fn venv_dir_name(&self) -> &str {
        self.python
            .as_ref()
            .and_then(|p| p.venv_dir.as_deref())
            .unwrap_or(".venv")
    }

    fn requirements_name(&self) -> &str {
        self.python
            .as_ref()
            .and_then(|p| p.requirements.as_deref())
            .unwrap_or("requirements.txt")
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.project_dir().join(self.venv_dir_name())
    }

    /// 虛擬環境內的直譯器，Windows 與其他平台的目錄結構不同
    pub fn venv_python(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir().join("Scripts").join("python.exe")
        } else {
            self.venv_dir().join("bin").join("python")
        }
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.project_dir().join(self.requirements_name())
    }

    pub fn upgrade_pip(&self) -> bool {
        self.python
            .as_ref()
            .and_then(|p| p.upgrade_pip)
            .unwrap_or(false)
    }

    pub fn extra_packages(&self) -> &[String] {
        self.python
            .as_ref()
            .and_then(|p| p.extra_packages.as_deref())
            .unwrap_or(&[])
    }

    pub fn service_name(&self) -> &str {
        &self.service.name
    }

    pub fn manager_path(&self) -> PathBuf {
        PathBuf::from(&self.service.manager_path)
    }

    pub fn display_name(&self) -> &str {
        self.service
            .display_name
            .as_deref()
            .unwrap_or(&self.service.name)
    }

    pub fn description(&self) -> &str {
        self.service
            .description
            .as_deref()
            .unwrap_or("Trading journal API")
    }

    pub fn start_policy(&self) -> StartPolicy {
        self.service.start_policy.unwrap_or_default()
    }

    pub fn stdout_log(&self) -> Option<PathBuf> {
        self.service.stdout_log.as_ref().map(|p| self.resolve(p))
    }

    pub fn stderr_log(&self) -> Option<PathBuf> {
        self.service.stderr_log.as_ref().map(|p| self.resolve(p))
    }

    pub fn service_environment(&self) -> BTreeMap<String, String> {
        self.service.environment.clone().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.service.launch.port.unwrap_or(8000)
    }

    pub fn workers(&self) -> usize {
        self.service.launch.workers.unwrap_or(4)
    }

    /// 以設定值填入啟動參數模板
    pub fn launch_arguments(&self) -> Result<String> {
        let launch = &self.service.launch;
        let template = launch.template.as_deref().unwrap_or(DEFAULT_LAUNCH_TEMPLATE);
        let app = launch.app.as_deref().unwrap_or("main:app");
        let host = launch.host.as_deref().unwrap_or("0.0.0.0");

        let re = Regex::new(r"\{(\w+)\}").map_err(|e| ProvisionError::ConfigValidationError {
            field: "service.launch.template".to_string(),
            message: e.to_string(),
        })?;

        let mut unknown = Vec::new();
        let rendered = re.replace_all(template, |caps: &regex::Captures| match &caps[1] {
            "app" => app.to_string(),
            "host" => host.to_string(),
            "port" => self.port().to_string(),
            "workers" => self.workers().to_string(),
            other => {
                unknown.push(other.to_string());
                caps[0].to_string()
            }
        });

        if !unknown.is_empty() {
            return Err(ProvisionError::InvalidConfigValueError {
                field: "service.launch.template".to_string(),
                value: template.to_string(),
                reason: format!("Unknown placeholders: {}", unknown.join(", ")),
            });
        }

        Ok(rendered.trim().to_string())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.execution
            .as_ref()
            .and_then(|e| e.command_timeout_seconds)
            .map(Duration::from_secs)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if validation::is_absolute_path(path) {
            PathBuf::from(path)
        } else {
            self.project_dir().join(path)
        }
    }
}

impl Validate for ProvisionConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn escape_toml_basic(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}
