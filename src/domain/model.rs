use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 佈署進度，每個步驟成功後才前進
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStage {
    NotStarted,
    DirectoryReady,
    RepositoryReady,
    EnvironmentReady,
    ServiceRegistered,
    ServiceRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Directory,
    Repository,
    Environment,
    ServiceRegistration,
    ServiceStart,
}

impl Step {
    /// 步驟成功後到達的階段
    pub fn completes(self) -> ProvisionStage {
        match self {
            Step::Directory => ProvisionStage::DirectoryReady,
            Step::Repository => ProvisionStage::RepositoryReady,
            Step::Environment => ProvisionStage::EnvironmentReady,
            Step::ServiceRegistration => ProvisionStage::ServiceRegistered,
            Step::ServiceStart => ProvisionStage::ServiceRunning,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Directory => "directory",
            Step::Repository => "repository",
            Step::Environment => "environment",
            Step::ServiceRegistration => "service registration",
            Step::ServiceStart => "service start",
        };
        f.write_str(name)
    }
}

/// 步驟結果：前置檢查已滿足而略過，或實際執行了外部指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Skipped { reason: String },
    Executed { actions: Vec<String> },
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }

    pub fn actions(&self) -> &[String] {
        match self {
            StepOutcome::Skipped { .. } => &[],
            StepOutcome::Executed { actions } => actions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

impl StepReport {
    pub fn new(step: Step, outcome: StepOutcome, duration: Duration) -> Self {
        Self {
            step,
            outcome,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// 整次執行的摘要，可輸出為 JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub service_name: String,
    pub dry_run: bool,
    pub stage: ProvisionStage,
    pub steps: Vec<StepReport>,
    pub service_status: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProvisionReport {
    pub fn new(service_name: impl Into<String>, dry_run: bool) -> Self {
        Self {
            service_name: service_name.into(),
            dry_run,
            stage: ProvisionStage::NotStarted,
            steps: Vec::new(),
            service_status: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, report: StepReport) {
        self.stage = report.step.completes();
        self.steps.push(report);
    }

    pub fn step(&self, step: Step) -> Option<&StepReport> {
        self.steps.iter().find(|r| r.step == step)
    }

    pub fn executed_steps(&self) -> usize {
        self.steps.iter().filter(|r| !r.outcome.is_skipped()).count()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|r| r.duration_ms).sum()
    }
}

/// 一次外部指令呼叫
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// 只查詢狀態、不改動主機（dry-run 時仍會執行）
    pub read_only: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            read_only: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// 程式檔名（不含路徑），給測試替身和日誌用
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program.display().to_string()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(value: &str) -> String {
    if value.is_empty() || value.contains(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progression() {
        let mut previous = ProvisionStage::NotStarted;
        for step in [
            Step::Directory,
            Step::Repository,
            Step::Environment,
            Step::ServiceRegistration,
            Step::ServiceStart,
        ] {
            assert!(step.completes() > previous);
            previous = step.completes();
        }
        assert_eq!(previous, ProvisionStage::ServiceRunning);
    }

    #[test]
    fn test_command_display_quotes_spaces() {
        let spec = CommandSpec::new("C:/Program Files/nssm/nssm.exe")
            .args(["set", "journal-api", "Description"])
            .arg("Trading journal API");
        assert_eq!(
            spec.to_string(),
            "\"C:/Program Files/nssm/nssm.exe\" set journal-api Description \"Trading journal API\""
        );
        assert_eq!(spec.program_name(), "nssm.exe");
    }

    #[test]
    fn test_report_tracks_last_completed_stage() {
        let mut report = ProvisionReport::new("journal-api", false);
        report.record(StepReport::new(
            Step::Directory,
            StepOutcome::skipped("exists"),
            Duration::from_millis(1),
        ));
        report.record(StepReport::new(
            Step::Repository,
            StepOutcome::Executed {
                actions: vec!["git pull".to_string()],
            },
            Duration::from_millis(20),
        ));

        assert_eq!(report.stage, ProvisionStage::RepositoryReady);
        assert_eq!(report.executed_steps(), 1);
        assert_eq!(report.total_duration_ms(), 21);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["outcome"], "skipped");
        assert_eq!(json["steps"][1]["step"], "repository");
        assert_eq!(json["stage"], "repository_ready");
    }
}
