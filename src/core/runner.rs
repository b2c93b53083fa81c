use crate::domain::model::{CommandOutput, CommandSpec};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{ProvisionError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// 以真實行程執行外部指令，逐一等待結束
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    timeout: Option<Duration>,
}

impl SystemCommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        tracing::debug!("▶️ {}", spec);

        let child = command.spawn().map_err(|source| ProvisionError::SpawnError {
            program: spec.program.display().to_string(),
            source,
        })?;

        // 逾時時 future 被丟棄，kill_on_drop 會結束子行程
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ProvisionError::TimeoutError {
                    command: spec.to_string(),
                    seconds: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| ProvisionError::SpawnError {
            program: spec.program.display().to_string(),
            source,
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: decode_output(&output.stdout),
            stderr: decode_output(&output.stderr),
        };

        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!("  │ {}", line);
        }
        if !result.is_success() {
            for line in result.stderr.lines().filter(|l| !l.trim().is_empty()) {
                tracing::debug!("  ! {}", line);
            }
        }

        Ok(result)
    }
}

/// NSSM 的輸出是 UTF-16LE，其他工具是 UTF-8
pub fn decode_output(bytes: &[u8]) -> String {
    let looks_utf16 = bytes.len() >= 2
        && bytes.len() % 2 == 0
        && bytes.iter().skip(1).step_by(2).all(|b| *b == 0);

    let text = if looks_utf16 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    text.trim_start_matches('\u{feff}')
        .trim_end_matches(['\0', '\r', '\n'])
        .to_string()
}

/// dry-run 用：改動主機的指令只記錄不執行，唯讀查詢交給內層執行器
pub struct DryRunRunner<R: CommandRunner> {
    inner: R,
}

impl<R: CommandRunner> DryRunRunner<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: CommandRunner> CommandRunner for DryRunRunner<R> {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if spec.read_only {
            return self.inner.run(spec).await;
        }
        tracing::info!("🔍 [dry-run] would run: {}", spec);
        Ok(CommandOutput::success(""))
    }
}
