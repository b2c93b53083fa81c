use crate::config::ProvisionConfig;
use crate::core::service_manager::{ServiceDefinition, ServiceManager};
use crate::domain::model::{CommandSpec, ProvisionReport, Step, StepOutcome, StepReport};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{ProvisionError, Result};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

/// 失敗訊息只保留 stderr 最後幾行
const STDERR_TAIL_LINES: usize = 20;

/// 依序執行佈署步驟；任何一步失敗就中止，不重試也不回滾
pub struct Provisioner<R: CommandRunner> {
    config: ProvisionConfig,
    runner: R,
    manager: ServiceManager,
    dry_run: bool,
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn new(config: ProvisionConfig, runner: R) -> Self {
        let manager = ServiceManager::new(config.manager_path(), config.service_name());
        Self {
            config,
            runner,
            manager,
            dry_run: false,
        }
    }

    /// dry-run 時不建立目錄；指令是否執行由 runner 決定
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::new(self.config.service_name(), self.dry_run);
        self.run_with_report(&mut report).await?;
        Ok(report)
    }

    /// 執行完整流程，失敗時 `report` 保留已完成的步驟
    pub async fn run_with_report(&self, report: &mut ProvisionReport) -> Result<()> {
        let result = self.run_steps(report).await;
        report.finished_at = Some(Utc::now());
        result
    }

    async fn run_steps(&self, report: &mut ProvisionReport) -> Result<()> {
        tracing::info!(
            "🚀 Provisioning service '{}' in {}",
            self.config.service_name(),
            self.config.project_dir().display()
        );

        self.preflight().await?;

        let started = Instant::now();
        let outcome = self.ensure_directory().await?;
        Self::record(report, Step::Directory, outcome, started);

        let started = Instant::now();
        let outcome = self.ensure_repository().await?;
        Self::record(report, Step::Repository, outcome, started);

        let started = Instant::now();
        let outcome = self.ensure_environment().await?;
        Self::record(report, Step::Environment, outcome, started);

        let started = Instant::now();
        let outcome = self.reregister_service().await?;
        Self::record(report, Step::ServiceRegistration, outcome, started);

        let started = Instant::now();
        let outcome = self.start_service().await?;
        Self::record(report, Step::ServiceStart, outcome, started);

        report.service_status = self.query_service_status().await;

        tracing::info!(
            "🏁 Provisioning finished: {} step(s) executed, {} skipped, {}ms",
            report.executed_steps(),
            report.steps.len() - report.executed_steps(),
            report.total_duration_ms()
        );
        Ok(())
    }

    fn record(report: &mut ProvisionReport, step: Step, outcome: StepOutcome, started: Instant) {
        match &outcome {
            StepOutcome::Skipped { reason } => {
                tracing::info!("⏭️ {}: skipped ({})", step, reason)
            }
            StepOutcome::Executed { actions } => {
                tracing::info!("✅ {}: done ({} action(s))", step, actions.len())
            }
        }
        report.record(StepReport::new(step, outcome, started.elapsed()));
    }

    /// 檢查外部工具是否可用
    pub async fn preflight(&self) -> Result<()> {
        let manager_path = self.manager.executable();
        match tokio::fs::metadata(manager_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(ProvisionError::PreflightError {
                    message: format!("{} is not a file", manager_path.display()),
                })
            }
            Err(e) => {
                return Err(ProvisionError::PreflightError {
                    message: format!(
                        "service manager not found at {}: {}",
                        manager_path.display(),
                        e
                    ),
                })
            }
        }

        for spec in [
            CommandSpec::new("git").arg("--version").read_only(),
            CommandSpec::new(self.config.interpreter())
                .arg("--version")
                .read_only(),
        ] {
            let output = self.runner.run(&spec).await.map_err(|e| {
                ProvisionError::PreflightError {
                    message: e.to_string(),
                }
            })?;
            if !output.is_success() {
                return Err(ProvisionError::PreflightError {
                    message: format!("`{}` exited with {:?}", spec, output.exit_code),
                });
            }
            let version = if output.stdout.trim().is_empty() {
                output.stderr.trim()
            } else {
                output.stdout.trim()
            };
            tracing::debug!("🔧 {}", version);
        }

        Ok(())
    }

    pub async fn ensure_directory(&self) -> Result<StepOutcome> {
        let path = self.config.project_dir();

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(StepOutcome::skipped("directory already exists")),
            Ok(_) => Err(ProvisionError::InvalidPathError {
                path,
                reason: "exists but is not a directory".to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let action = format!("create directory {}", path.display());
                if self.dry_run {
                    tracing::info!("🔍 [dry-run] would {}", action);
                } else {
                    tokio::fs::create_dir_all(&path)
                        .await
                        .map_err(|source| ProvisionError::FilesystemError {
                            path: path.clone(),
                            source,
                        })?;
                }
                Ok(StepOutcome::Executed {
                    actions: vec![action],
                })
            }
            Err(source) => Err(ProvisionError::FilesystemError { path, source }),
        }
    }

    pub async fn ensure_repository(&self) -> Result<StepOutcome> {
        let dir = self.config.project_dir();

        let spec = if path_exists(&dir.join(".git")).await? {
            tracing::info!("🔄 Existing checkout found, pulling latest changes");
            CommandSpec::new("git")
                .arg("-C")
                .arg(dir.display().to_string())
                .args(["pull", "--ff-only"])
        } else {
            if !is_empty_dir(&dir).await? {
                return Err(ProvisionError::InvalidPathError {
                    path: dir,
                    reason: "directory is not empty and is not a git checkout".to_string(),
                });
            }
            tracing::info!("📥 Cloning {}", self.config.repository_url());
            let mut spec = CommandSpec::new("git").arg("clone");
            if let Some(branch) = self.config.branch() {
                spec = spec.args(["--branch", branch]);
            }
            spec.arg(self.config.repository_url())
                .arg(dir.display().to_string())
        };

        let action = self.execute(Step::Repository, spec).await?;
        Ok(StepOutcome::Executed {
            actions: vec![action],
        })
    }

    pub async fn ensure_environment(&self) -> Result<StepOutcome> {
        let dir = self.config.project_dir();
        let venv_dir = self.config.venv_dir();
        let venv_python = self.config.venv_python();
        let mut actions = Vec::new();

        if path_exists(&venv_dir.join("pyvenv.cfg")).await? {
            tracing::info!("🐍 Virtual environment already present at {}", venv_dir.display());
        } else {
            tracing::info!("🐍 Creating virtual environment at {}", venv_dir.display());
            let spec = CommandSpec::new(self.config.interpreter())
                .args(["-m", "venv"])
                .arg(venv_dir.display().to_string())
                .current_dir(&dir);
            actions.push(self.execute(Step::Environment, spec).await?);
        }

        let requirements = self.config.requirements_path();
        if !path_exists(&requirements).await? {
            if self.dry_run {
                tracing::warn!(
                    "⚠️ {} does not exist yet; a real run would fail here unless the checkout provides it",
                    requirements.display()
                );
            } else {
                return Err(ProvisionError::MissingRequirementsError { path: requirements });
            }
        }

        if self.config.upgrade_pip() {
            let spec = CommandSpec::new(&venv_python)
                .args(["-m", "pip", "install", "--upgrade", "pip"])
                .current_dir(&dir);
            actions.push(self.execute(Step::Environment, spec).await?);
        }

        tracing::info!("📦 Installing dependencies from {}", requirements.display());
        let spec = CommandSpec::new(&venv_python)
            .args(["-m", "pip", "install", "-r"])
            .arg(requirements.display().to_string())
            .args(self.config.extra_packages().iter().cloned())
            .current_dir(&dir);
        actions.push(self.execute(Step::Environment, spec).await?);

        Ok(StepOutcome::Executed { actions })
    }

    /// 服務定義，啟動參數取自目前的設定
    pub fn service_definition(&self) -> Result<ServiceDefinition> {
        Ok(ServiceDefinition {
            executable: self.config.venv_python(),
            arguments: self.config.launch_arguments()?,
            working_directory: self.config.project_dir(),
            display_name: self.config.display_name().to_string(),
            description: self.config.description().to_string(),
            start_policy: self.config.start_policy(),
            stdout_log: self.config.stdout_log(),
            stderr_log: self.config.stderr_log(),
            environment: self.config.service_environment(),
        })
    }

    pub async fn reregister_service(&self) -> Result<StepOutcome> {
        let definition = self.service_definition()?;
        let mut actions = Vec::new();

        let status = self.runner.run(&self.manager.status()).await?;
        if status.is_success() {
            tracing::info!(
                "♻️ Service '{}' already exists ({}), replacing it",
                self.manager.service(),
                status.stdout.trim()
            );

            // stop 失敗不中止，remove 失敗時再一併回報
            let stop_spec = self.manager.stop();
            let stop_succeeded = match self.runner.run(&stop_spec).await {
                Ok(output) if output.is_success() => true,
                Ok(output) => {
                    tracing::warn!(
                        "⚠️ Stopping '{}' failed (exit {:?}): {}",
                        self.manager.service(),
                        output.exit_code,
                        output.stderr.trim()
                    );
                    false
                }
                Err(e) => {
                    tracing::warn!("⚠️ Stopping '{}' failed: {}", self.manager.service(), e);
                    false
                }
            };
            actions.push(stop_spec.to_string());

            let remove_spec = self.manager.remove();
            let removed = self.runner.run(&remove_spec).await?;
            if !removed.is_success() {
                let details = if removed.stderr.trim().is_empty() {
                    removed.stdout.trim().to_string()
                } else {
                    tail(&removed.stderr)
                };
                return Err(ProvisionError::ServiceRemovalError {
                    service: self.manager.service().to_string(),
                    stop_succeeded,
                    details,
                });
            }
            actions.push(remove_spec.to_string());
        } else {
            tracing::info!("🆕 Service '{}' not registered yet", self.manager.service());
        }

        for spec in self.manager.registration_commands(&definition) {
            actions.push(self.execute(Step::ServiceRegistration, spec).await?);
        }

        tracing::info!(
            "📝 Registered '{}': {} {}",
            self.manager.service(),
            definition.executable.display(),
            definition.arguments
        );
        Ok(StepOutcome::Executed { actions })
    }

    /// 送出啟動指令，不等待服務回報已啟動
    pub async fn start_service(&self) -> Result<StepOutcome> {
        let action = self.execute(Step::ServiceStart, self.manager.start()).await?;
        Ok(StepOutcome::Executed {
            actions: vec![action],
        })
    }

    /// 查詢服務狀態供報告使用；查詢失敗不影響結果
    pub async fn query_service_status(&self) -> Option<String> {
        match self.runner.run(&self.manager.status()).await {
            Ok(output) if output.is_success() => {
                let status = output.stdout.trim().to_string();
                tracing::info!("📡 Service '{}' reports {}", self.manager.service(), status);
                Some(status)
            }
            Ok(output) => {
                tracing::warn!(
                    "⚠️ Status query for '{}' exited with {:?}",
                    self.manager.service(),
                    output.exit_code
                );
                None
            }
            Err(e) => {
                tracing::warn!("⚠️ Status query for '{}' failed: {}", self.manager.service(), e);
                None
            }
        }
    }

    async fn execute(&self, step: Step, spec: CommandSpec) -> Result<String> {
        tracing::debug!("⚙️ [{}] {}", step, spec);
        let output = self.runner.run(&spec).await?;

        if !output.is_success() {
            let stderr = if output.stderr.trim().is_empty() {
                tail(&output.stdout)
            } else {
                tail(&output.stderr)
            };
            tracing::error!("❌ [{}] `{}` failed with {:?}", step, spec, output.exit_code);
            return Err(ProvisionError::CommandFailedError {
                step,
                command: spec.to_string(),
                exit_code: output.exit_code,
                stderr,
            });
        }

        Ok(spec.to_string())
    }
}

/// 只有「不存在」才算 false，權限等其他錯誤照常回報
async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|source| ProvisionError::FilesystemError {
            path: path.to_path_buf(),
            source,
        })
}

/// 不存在的目錄視為空目錄
async fn is_empty_dir(path: &Path) -> Result<bool> {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => Ok(entries
            .next_entry()
            .await
            .map_err(|source| ProvisionError::FilesystemError {
                path: path.to_path_buf(),
                source,
            })?
            .is_none()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(source) => Err(ProvisionError::FilesystemError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
