use crate::utils::error::{Result, WardenError};
use crate::utils::validation::parse_http_url;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// 沒有任何 socket 佔用該 port
    PortFree,
    /// 剛好一個 socket 在該 port 上 listen
    PortListening,
    /// GET 回應 2xx 或 404
    HttpHealthy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckTarget {
    Port(u16),
    Url(String),
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckTarget::Port(port) => write!(f, "port {}", port),
            CheckTarget::Url(url) => f.write_str(url),
        }
    }
}

/// 輪詢預算：次數上限或絕對期限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    Attempts(u32),
    Deadline(Instant),
}

/// A single condition to poll for, plus how long to keep trying.
#[derive(Debug, Clone)]
pub struct ReadinessCheck {
    pub kind: CheckKind,
    pub target: CheckTarget,
    pub interval: Duration,
    pub budget: PollBudget,
    pub created_at: Instant,
}

impl ReadinessCheck {
    pub fn new(kind: CheckKind, target: CheckTarget, interval: Duration, budget: PollBudget) -> Self {
        Self {
            kind,
            target,
            interval,
            budget,
            created_at: Instant::now(),
        }
    }

    pub fn port_free(port: u16, interval: Duration, max_attempts: u32) -> Self {
        Self::new(
            CheckKind::PortFree,
            CheckTarget::Port(port),
            interval,
            PollBudget::Attempts(max_attempts),
        )
    }

    /// Fails when `timeout` is too large to express as a deadline.
    pub fn port_listening(port: u16, interval: Duration, timeout: Duration) -> Result<Self> {
        Self::with_timeout(
            CheckKind::PortListening,
            CheckTarget::Port(port),
            interval,
            timeout,
        )
    }

    /// Fails when `timeout` is too large to express as a deadline.
    pub fn http_healthy(
        url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_timeout(
            CheckKind::HttpHealthy,
            CheckTarget::Url(url.into()),
            interval,
            timeout,
        )
    }

    fn with_timeout(
        kind: CheckKind,
        target: CheckTarget,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let created_at = Instant::now();
        let deadline = created_at.checked_add(timeout).ok_or_else(|| {
            invalid(
                "timeout",
                &format!("{}s", timeout.as_secs()),
                "Timeout is too large",
            )
        })?;
        Ok(Self {
            kind,
            target,
            interval,
            budget: PollBudget::Deadline(deadline),
            created_at,
        })
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.kind, &self.target) {
            (CheckKind::PortFree | CheckKind::PortListening, CheckTarget::Port(port)) => {
                if *port == 0 {
                    return Err(invalid("target", "0", "Port must be between 1 and 65535"));
                }
            }
            (CheckKind::HttpHealthy, CheckTarget::Url(url)) => {
                parse_http_url(url).map_err(|reason| invalid("target", url, &reason))?;
            }
            (kind, target) => {
                return Err(invalid(
                    "target",
                    &target.to_string(),
                    &format!("{:?} checks cannot poll this kind of target", kind),
                ));
            }
        }

        if self.interval.is_zero() {
            return Err(invalid("interval", "0ms", "Interval must be positive"));
        }

        match self.budget {
            PollBudget::Attempts(0) => Err(invalid(
                "budget",
                "0 attempts",
                "At least one attempt is required",
            )),
            PollBudget::Deadline(deadline) if deadline <= self.created_at => Err(invalid(
                "budget",
                "deadline",
                "Deadline must be in the future when the check is created",
            )),
            _ => Ok(()),
        }
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> WardenError {
    WardenError::InvalidCheckError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Satisfied,
    Exhausted,
    Cancelled,
}

/// Result of running one [`ReadinessCheck`] to completion.
#[derive(Debug, Clone, Serialize)]
pub struct PollOutcome {
    kind: CheckKind,
    target: String,
    status: PollStatus,
    attempts_used: u32,
    last_observed_error: Option<String>,
    elapsed_ms: u64,
    finished_at: DateTime<Utc>,
}

impl PollOutcome {
    pub(crate) fn new(
        check: &ReadinessCheck,
        status: PollStatus,
        attempts_used: u32,
        last_observed_error: Option<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind: check.kind,
            target: check.target.to_string(),
            status,
            attempts_used,
            last_observed_error,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            finished_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> CheckKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> PollStatus {
        self.status
    }

    pub fn satisfied(&self) -> bool {
        self.status == PollStatus::Satisfied
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn last_observed_error(&self) -> Option<&str> {
        self.last_observed_error.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
}

/// 外掛設定：可以只寫名稱，或指定版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSpec {
    Name(String),
    Pinned {
        name: String,
        version: Option<String>,
    },
}

impl PluginSpec {
    pub fn name(&self) -> &str {
        match self {
            PluginSpec::Name(name) => name,
            PluginSpec::Pinned { name, .. } => name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            PluginSpec::Pinned {
                version: Some(version),
                ..
            } => version,
            _ => "latest",
        }
    }
}
