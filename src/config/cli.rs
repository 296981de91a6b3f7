use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "ci-warden")]
#[command(about = "Stops, starts and waits on a CI server until it answers HTTP")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "ci-warden.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print outcomes and logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Wait until nothing listens on the server port
    WaitFree(WaitArgs),
    /// Wait until exactly one socket listens on the server port
    WaitListening(WaitArgs),
    /// Wait until the health URL answers 2xx or 404
    WaitHealthy(WaitArgs),
    /// Stop the service, wait for the port, start it and wait until it answers
    Restart,
    /// Download missing plugins and restart when plugins changed
    SyncPlugins {
        /// Only download, never restart
        #[arg(long)]
        no_restart: bool,
    },
}

/// 覆蓋設定檔的參數；沒有設定檔時 --port / --url 為必填
#[derive(Debug, Clone, Default, Args)]
pub struct WaitArgs {
    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Attempt budget for wait-free
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Deadline for wait-listening and wait-healthy
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wait_command_with_overrides() {
        let cli = CliConfig::parse_from([
            "ci-warden",
            "wait-healthy",
            "--url",
            "http://localhost:8080/login",
            "--timeout-secs",
            "30",
            "-v",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.config, "ci-warden.toml");
        match cli.command {
            Command::WaitHealthy(args) => {
                assert_eq!(args.url.as_deref(), Some("http://localhost:8080/login"));
                assert_eq!(args.timeout_secs, Some(30));
                assert!(args.port.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_sync_plugins() {
        let cli = CliConfig::parse_from(["ci-warden", "--config", "/etc/ci.toml", "sync-plugins", "--no-restart"]);
        assert_eq!(cli.config, "/etc/ci.toml");
        assert!(matches!(cli.command, Command::SyncPlugins { no_restart: true }));
    }
}
