use anyhow::Context;
use ci_warden::adapters::http::{ReqwestProbe, DEFAULT_REQUEST_TIMEOUT};
use ci_warden::config::{CliConfig, Command, WaitArgs};
use ci_warden::core::plugins::{plugins_newer_than_pid_file, sync_plugins};
use ci_warden::core::workflow::restart;
use ci_warden::domain::model::{CheckKind, PollStatus};
use ci_warden::utils::error::{ErrorSeverity, Result, WardenError};
use ci_warden::utils::{logger, validation::Validate};
use ci_warden::{
    cancellation, Cancellation, CommandService, ReadinessCheck, ReadinessWaiter,
    SystemSocketTable, WardenConfig,
};
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const EXIT_NOT_READY: i32 = 4;
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let (handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("⏹️ Received Ctrl+C, cancelling");
            handle.cancel();
        }
    });

    let exit_code = match run(&cli, &cancel).await {
        Ok(report) => {
            emit(cli.json, &report)?;
            report.exit_code
        }
        Err(e) => {
            tracing::error!(
                "❌ {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            }
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunReport {
    summary: String,
    #[serde(skip)]
    exit_code: i32,
    detail: serde_json::Value,
}

fn emit(json: bool, report: &RunReport) -> anyhow::Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("failed to render report as JSON")?;
        println!("{}", rendered);
    } else {
        println!("{}", report.summary);
    }
    Ok(())
}

fn status_exit_code(status: PollStatus) -> i32 {
    match status {
        PollStatus::Satisfied => 0,
        PollStatus::Exhausted => EXIT_NOT_READY,
        PollStatus::Cancelled => EXIT_CANCELLED,
    }
}

/// 設定檔不存在時回傳 None，讓 wait-* 只靠命令列參數也能跑
fn load_config(path: &str) -> Result<Option<WardenConfig>> {
    if !Path::new(path).exists() {
        tracing::debug!("No configuration file at {}", path);
        return Ok(None);
    }

    let config = WardenConfig::from_file(path)?;
    config.validate()?;
    tracing::info!("✅ Configuration loaded from {}", path);
    Ok(Some(config))
}

fn require_config(path: &str) -> Result<WardenConfig> {
    load_config(path)?.ok_or_else(|| WardenError::MissingConfigError {
        field: path.to_string(),
    })
}

fn build_check(
    kind: CheckKind,
    args: &WaitArgs,
    config: Option<&WardenConfig>,
) -> Result<ReadinessCheck> {
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .or_else(|| config.map(WardenConfig::interval))
        .unwrap_or(Duration::from_secs(1));

    let port = || {
        args.port
            .or_else(|| config.map(WardenConfig::port))
            .ok_or_else(|| WardenError::MissingConfigError {
                field: "server.port (or --port)".to_string(),
            })
    };
    let timeout = |from_config: Option<Duration>| {
        args.timeout_secs
            .map(Duration::from_secs)
            .or(from_config)
            .unwrap_or(Duration::from_secs(300))
    };

    let check = match kind {
        CheckKind::PortFree => {
            let attempts = args
                .attempts
                .or_else(|| config.map(WardenConfig::stop_attempts))
                .unwrap_or(10);
            ReadinessCheck::port_free(port()?, interval, attempts)
        }
        CheckKind::PortListening => ReadinessCheck::port_listening(
            port()?,
            interval,
            timeout(config.map(WardenConfig::start_timeout)),
        )?,
        CheckKind::HttpHealthy => {
            let url = args
                .url
                .clone()
                .or_else(|| config.map(WardenConfig::health_url))
                .ok_or_else(|| WardenError::MissingConfigError {
                    field: "server.url (or --url)".to_string(),
                })?;
            ReadinessCheck::http_healthy(
                url,
                interval,
                timeout(config.map(WardenConfig::http_timeout)),
            )?
        }
    };
    Ok(check)
}

fn waiter_for(
    config: Option<&WardenConfig>,
) -> Result<ReadinessWaiter<SystemSocketTable, ReqwestProbe>> {
    let request_timeout = config
        .map(WardenConfig::request_timeout)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    Ok(ReadinessWaiter::new(
        SystemSocketTable::detect(),
        ReqwestProbe::new(request_timeout)?,
    ))
}

fn service_for(config: &WardenConfig) -> CommandService {
    CommandService::new(config.stop_command(), config.start_command(), config.pid_file())
}

async fn run(cli: &CliConfig, cancel: &Cancellation) -> Result<RunReport> {
    match &cli.command {
        Command::WaitFree(args) => wait(CheckKind::PortFree, args, cli, cancel).await,
        Command::WaitListening(args) => wait(CheckKind::PortListening, args, cli, cancel).await,
        Command::WaitHealthy(args) => wait(CheckKind::HttpHealthy, args, cli, cancel).await,
        Command::Restart => {
            let config = require_config(&cli.config)?;
            let waiter = waiter_for(Some(&config))?;
            let report = restart(
                &service_for(&config),
                &waiter,
                &config.restart_settings(),
                cancel,
            )
            .await?;

            let (summary, exit_code) = if report.is_operational() {
                ("✅ service restarted and answering".to_string(), 0)
            } else if !report.started {
                ("⏹️ restart cancelled before start".to_string(), EXIT_CANCELLED)
            } else {
                ("⚠️ service did not become ready in time".to_string(), EXIT_NOT_READY)
            };
            Ok(RunReport {
                summary,
                exit_code,
                detail: serde_json::to_value(&report)?,
            })
        }
        Command::SyncPlugins { no_restart } => {
            let config = require_config(&cli.config)?;
            let probe = ReqwestProbe::new(config.request_timeout())?;
            let sync = sync_plugins(probe.client(), config.home(), config.mirror(), config.plugins())
                .await?;
            tracing::info!(
                "📦 {} plugin(s) downloaded, {} already present",
                sync.downloaded.len(),
                sync.already_present.len()
            );

            let mut summary = format!("📦 downloaded: {:?}", sync.downloaded);
            let mut exit_code = 0;
            let mut restart_detail = serde_json::Value::Null;

            if !no_restart && plugins_newer_than_pid_file(config.home(), &config.pid_file())? {
                tracing::info!("🔄 plugins updated, restarting");
                let waiter = ReadinessWaiter::new(SystemSocketTable::detect(), probe);
                let report = restart(
                    &service_for(&config),
                    &waiter,
                    &config.restart_settings(),
                    cancel,
                )
                .await?;
                if !report.is_operational() {
                    exit_code = EXIT_NOT_READY;
                    summary.push_str("; ⚠️ service did not become ready after restart");
                } else {
                    summary.push_str("; ✅ restarted");
                }
                restart_detail = serde_json::to_value(&report)?;
            }

            Ok(RunReport {
                summary,
                exit_code,
                detail: serde_json::json!({ "plugins": sync, "restart": restart_detail }),
            })
        }
    }
}

async fn wait(
    kind: CheckKind,
    args: &WaitArgs,
    cli: &CliConfig,
    cancel: &Cancellation,
) -> Result<RunReport> {
    let config = load_config(&cli.config)?;
    let check = build_check(kind, args, config.as_ref())?;
    let waiter = waiter_for(config.as_ref())?;

    tracing::info!("⏳ Waiting for {} to be {:?}", check.target, kind);
    let outcome = waiter.wait_for(&check, cancel).await?;

    let summary = match outcome.status() {
        PollStatus::Satisfied => format!(
            "✅ {} ready after {} attempt(s)",
            outcome.target(),
            outcome.attempts_used()
        ),
        PollStatus::Exhausted => format!(
            "⚠️ {} did not become ready in time ({} attempt(s), last error: {})",
            outcome.target(),
            outcome.attempts_used(),
            outcome.last_observed_error().unwrap_or("none")
        ),
        PollStatus::Cancelled => format!("⏹️ wait on {} cancelled", outcome.target()),
    };

    Ok(RunReport {
        summary,
        exit_code: status_exit_code(outcome.status()),
        detail: serde_json::to_value(&outcome)?,
    })
}
