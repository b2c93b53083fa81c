use anyhow::Context;
use clap::Parser;
use journal_provision::core::{CommandRunner, ProvisionReport};
use journal_provision::utils::{logger, validation::Validate};
use journal_provision::{
    CliConfig, DryRunRunner, ProvisionConfig, Provisioner, SystemCommandRunner,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, cli.log_format);

    tracing::info!("🚀 Starting journal-provision");
    tracing::info!("📁 Loading configuration from: {}", cli.config);
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match ProvisionConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .or_else(|| config.command_timeout());
    if let Some(limit) = timeout {
        tracing::info!("⏱️ Per-command timeout: {}s", limit.as_secs());
    }

    let runner = SystemCommandRunner::new(timeout);
    let exit_code = if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the host will not be changed");
        let provisioner = Provisioner::new(config, DryRunRunner::new(runner)).with_dry_run(true);
        execute(&provisioner, cli.json).await?
    } else {
        let provisioner = Provisioner::new(config, runner);
        execute(&provisioner, cli.json).await?
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn execute<R: CommandRunner>(provisioner: &Provisioner<R>, json: bool) -> anyhow::Result<i32> {
    let mut report = ProvisionReport::new(
        provisioner.config().service_name(),
        provisioner.is_dry_run(),
    );

    let exit_code = match provisioner.run_with_report(&mut report).await {
        Ok(()) => {
            tracing::info!("✅ Provisioning completed successfully!");
            if !json {
                println!("✅ Service '{}' provisioned", report.service_name);
                if let Some(status) = &report.service_status {
                    println!("📡 Status: {}", status);
                }
            }
            0
        }
        Err(e) => {
            tracing::error!(
                "❌ Provisioning failed at stage {:?}: {} (Category: {:?})",
                report.stage,
                e,
                e.category()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            e.exit_code()
        }
    };

    if json {
        let output =
            serde_json::to_string_pretty(&report).context("failed to serialize provisioning report")?;
        println!("{}", output);
    }

    Ok(exit_code)
}
