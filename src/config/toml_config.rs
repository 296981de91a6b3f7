use crate::core::workflow::RestartSettings;
use crate::domain::model::PluginSpec;
use crate::utils::error::{Result, WardenError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_port, validate_positive_number,
    validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HEALTH_PATH: &str = "/job/test/config.xml";
pub const DEFAULT_PID_FILE: &str = "/var/run/jenkins/jenkins.pid";
pub const DEFAULT_MIRROR: &str = "https://updates.jenkins-ci.org/download";

/// 輪詢間隔上限：一小時
const MAX_INTERVAL_MS: u64 = 60 * 60 * 1000;
/// 等待期限上限：一天
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    pub server: ServerConfig,
    pub service: Option<ServiceConfig>,
    pub readiness: Option<ReadinessConfig>,
    pub plugins: Option<PluginsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub home: String,
    pub port: u16,
    pub url: String,
    pub health_path: Option<String>,
    pub pid_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub stop_command: Option<String>,
    pub start_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    pub interval_ms: Option<u64>,
    pub stop_attempts: Option<u32>,
    pub start_timeout_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    pub mirror: Option<String>,
    pub install: Option<Vec<PluginSpec>>,
}

impl WardenConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(WardenError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| WardenError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${JENKINS_HOME})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
            WardenError::ConfigValidationError {
                field: "env_substitution".to_string(),
                message: e.to_string(),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn home(&self) -> &Path {
        Path::new(&self.server.home)
    }

    pub fn port(&self) -> u16 {
        self.server.port
    }

    pub fn health_url(&self) -> String {
        let path = self
            .server
            .health_path
            .as_deref()
            .unwrap_or(DEFAULT_HEALTH_PATH);
        format!(
            "{}/{}",
            self.server.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn pid_file(&self) -> PathBuf {
        PathBuf::from(self.server.pid_file.as_deref().unwrap_or(DEFAULT_PID_FILE))
    }

    pub fn stop_command(&self) -> String {
        self.service
            .as_ref()
            .and_then(|s| s.stop_command.clone())
            .unwrap_or_else(|| "service jenkins stop".to_string())
    }

    pub fn start_command(&self) -> String {
        self.service
            .as_ref()
            .and_then(|s| s.start_command.clone())
            .unwrap_or_else(|| "service jenkins start".to_string())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(
            self.readiness
                .as_ref()
                .and_then(|r| r.interval_ms)
                .unwrap_or(1000),
        )
    }

    pub fn stop_attempts(&self) -> u32 {
        self.readiness
            .as_ref()
            .and_then(|r| r.stop_attempts)
            .unwrap_or(10)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(
            self.readiness
                .as_ref()
                .and_then(|r| r.start_timeout_secs)
                .unwrap_or(300),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(
            self.readiness
                .as_ref()
                .and_then(|r| r.http_timeout_secs)
                .unwrap_or(300),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.readiness
                .as_ref()
                .and_then(|r| r.request_timeout_secs)
                .unwrap_or(5),
        )
    }

    pub fn mirror(&self) -> &str {
        self.plugins
            .as_ref()
            .and_then(|p| p.mirror.as_deref())
            .unwrap_or(DEFAULT_MIRROR)
    }

    pub fn plugins(&self) -> &[PluginSpec] {
        self.plugins
            .as_ref()
            .and_then(|p| p.install.as_deref())
            .unwrap_or(&[])
    }

    pub fn restart_settings(&self) -> RestartSettings {
        RestartSettings {
            port: self.port(),
            health_url: self.health_url(),
            interval: self.interval(),
            stop_attempts: self.stop_attempts(),
            start_timeout: self.start_timeout(),
            http_timeout: self.http_timeout(),
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_path("server.home", &self.server.home)?;
        validate_port("server.port", self.server.port)?;
        validate_url("server.url", &self.server.url)?;
        validate_url("server.health_path", &self.health_url())?;
        validate_path("server.pid_file", &self.pid_file().to_string_lossy())?;

        validate_non_empty_string("service.stop_command", &self.stop_command())?;
        validate_non_empty_string("service.start_command", &self.start_command())?;

        validate_range(
            "readiness.interval_ms",
            u64::try_from(self.interval().as_millis()).unwrap_or(u64::MAX),
            1,
            MAX_INTERVAL_MS,
        )?;
        validate_positive_number("readiness.stop_attempts", self.stop_attempts() as u64, 1)?;
        validate_range(
            "readiness.start_timeout_secs",
            self.start_timeout().as_secs(),
            1,
            MAX_TIMEOUT_SECS,
        )?;
        validate_range(
            "readiness.http_timeout_secs",
            self.http_timeout().as_secs(),
            1,
            MAX_TIMEOUT_SECS,
        )?;
        validate_range(
            "readiness.request_timeout_secs",
            self.request_timeout().as_secs(),
            1,
            300,
        )?;

        validate_url("plugins.mirror", self.mirror())?;
        for plugin in self.plugins() {
            validate_non_empty_string("plugins.install", plugin.name())?;
            if plugin.name().contains('/') || plugin.version().contains('/') {
                return Err(WardenError::InvalidConfigValueError {
                    field: "plugins.install".to_string(),
                    value: plugin.name().to_string(),
                    reason: "Plugin names and versions cannot contain '/'".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for WardenConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
