use crate::domain::model::Step;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Filesystem error at {}: {source}", .path.display())]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path {} is not usable: {reason}", .path.display())]
    InvalidPathError { path: PathBuf, reason: String },

    #[error("Failed to launch `{program}`: {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {seconds}s: {command}")]
    TimeoutError { command: String, seconds: u64 },

    #[error("{step} failed: `{command}` exited with {}{}", exit_code_text(.exit_code), stderr_suffix(.stderr))]
    CommandFailedError {
        step: Step,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Could not remove service '{service}' (stop {}): {details}", stop_text(.stop_succeeded))]
    ServiceRemovalError {
        service: String,
        stop_succeeded: bool,
        details: String,
    },

    #[error("Requirements file not found: {}", .path.display())]
    MissingRequirementsError { path: PathBuf },

    #[error("Preflight check failed: {message}")]
    PreflightError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn stop_text(stop_succeeded: &bool) -> &'static str {
    if *stop_succeeded {
        "succeeded"
    } else {
        "also failed"
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// 錯誤分類，對應主機上被改動的外部狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Filesystem,
    VersionControl,
    Dependencies,
    ServiceManager,
    Execution,
}

impl ProvisionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProvisionError::FilesystemError { .. }
            | ProvisionError::InvalidPathError { .. } => ErrorCategory::Filesystem,
            ProvisionError::SpawnError { .. }
            | ProvisionError::TimeoutError { .. }
            | ProvisionError::PreflightError { .. } => ErrorCategory::Execution,
            ProvisionError::CommandFailedError { step, .. } => match step {
                Step::Directory => ErrorCategory::Filesystem,
                Step::Repository => ErrorCategory::VersionControl,
                Step::Environment => ErrorCategory::Dependencies,
                Step::ServiceRegistration | Step::ServiceStart => ErrorCategory::ServiceManager,
            },
            ProvisionError::MissingRequirementsError { .. } => ErrorCategory::Dependencies,
            ProvisionError::ServiceRemovalError { .. } => ErrorCategory::ServiceManager,
            ProvisionError::ConfigValidationError { .. }
            | ProvisionError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    /// 程序結束碼，依錯誤分類決定
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 1,
            ErrorCategory::Filesystem => 2,
            ErrorCategory::VersionControl => 3,
            ErrorCategory::Dependencies => 4,
            ErrorCategory::ServiceManager => 5,
            ErrorCategory::Execution => 6,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ProvisionError::ServiceRemovalError {
                stop_succeeded: false,
                ..
            } => "The service appears to be wedged; stop it manually (or reboot) and run again",
            ProvisionError::TimeoutError { .. } => {
                "Raise execution.command_timeout_seconds or check that the tool is not waiting for input"
            }
            ProvisionError::SpawnError { .. } | ProvisionError::PreflightError { .. } => {
                "Make sure git, python and the service manager are installed and on PATH"
            }
            _ => match self.category() {
                ErrorCategory::Configuration => "Fix the configuration file and run again",
                ErrorCategory::Filesystem => {
                    "Check that the path is valid and that the shell is running as administrator"
                }
                ErrorCategory::VersionControl => {
                    "Check network access and repository credentials, or clean up the project directory"
                }
                ErrorCategory::Dependencies => {
                    "Check the requirements file and the package index connectivity"
                }
                ErrorCategory::ServiceManager => {
                    "Run as administrator and check the service state with the service manager"
                }
                ErrorCategory::Execution => "Check the command output above",
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Filesystem => format!("Filesystem problem: {}", self),
            ErrorCategory::VersionControl => format!("Repository problem: {}", self),
            ErrorCategory::Dependencies => format!("Dependency installation problem: {}", self),
            ErrorCategory::ServiceManager => format!("Service manager problem: {}", self),
            ErrorCategory::Execution => format!("Command execution problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
