use crate::core::cancel::Cancellation;
use crate::core::waiter::ReadinessWaiter;
use crate::domain::model::{PollOutcome, PollStatus, ReadinessCheck};
use crate::domain::ports::{HttpProbe, ServiceControl, SocketTable};
use crate::utils::error::Result;
use serde::Serialize;
use std::time::Duration;

/// Everything a stop/start cycle needs to know about the managed service.
#[derive(Debug, Clone)]
pub struct RestartSettings {
    pub port: u16,
    pub health_url: String,
    pub interval: Duration,
    pub stop_attempts: u32,
    pub start_timeout: Duration,
    pub http_timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationalReport {
    pub listening: PollOutcome,
    pub healthy: Option<PollOutcome>,
}

impl OperationalReport {
    pub fn is_operational(&self) -> bool {
        self.listening.satisfied() && self.healthy.as_ref().is_some_and(|h| h.satisfied())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    pub stopped: PollOutcome,
    pub started: bool,
    pub operational: Option<OperationalReport>,
}

impl RestartReport {
    pub fn is_operational(&self) -> bool {
        self.operational
            .as_ref()
            .is_some_and(OperationalReport::is_operational)
    }
}

/// 等待服務 listen，再等 HTTP 可以回應
pub async fn wait_until_operational<S, H>(
    waiter: &ReadinessWaiter<S, H>,
    settings: &RestartSettings,
    cancel: &Cancellation,
) -> Result<OperationalReport>
where
    S: SocketTable,
    H: HttpProbe,
{
    let listening_check = ReadinessCheck::port_listening(
        settings.port,
        settings.interval,
        settings.start_timeout,
    )?;
    let listening = waiter.wait_for(&listening_check, cancel).await?;
    if !listening.satisfied() {
        tracing::warn!(
            "⚠️ service not listening on port {} ({:?})",
            settings.port,
            listening.status()
        );
        return Ok(OperationalReport {
            listening,
            healthy: None,
        });
    }

    let healthy_check = ReadinessCheck::http_healthy(
        settings.health_url.clone(),
        settings.interval,
        settings.http_timeout,
    )?;
    let healthy = waiter.wait_for(&healthy_check, cancel).await?;
    if healthy.satisfied() {
        tracing::info!("✅ service is answering on {}", settings.health_url);
    } else {
        tracing::warn!(
            "⚠️ service did not answer {} in time ({:?})",
            settings.health_url,
            healthy.status()
        );
    }

    Ok(OperationalReport {
        listening,
        healthy: Some(healthy),
    })
}

/// Stop, wait for the port to be released, start, then wait until operational.
///
/// The stop command may return before the process is gone, hence the port
/// wait. Running out of stop attempts is logged and the restart continues.
pub async fn restart<C, S, H>(
    control: &C,
    waiter: &ReadinessWaiter<S, H>,
    settings: &RestartSettings,
    cancel: &Cancellation,
) -> Result<RestartReport>
where
    C: ServiceControl,
    S: SocketTable,
    H: HttpProbe,
{
    tracing::info!("🔄 Restarting service on port {}", settings.port);

    control.stop().await?;

    let free_check =
        ReadinessCheck::port_free(settings.port, settings.interval, settings.stop_attempts);
    let stopped = waiter.wait_for(&free_check, cancel).await?;
    match stopped.status() {
        PollStatus::Satisfied => tracing::info!("🛑 port {} released", settings.port),
        PollStatus::Exhausted => tracing::warn!(
            "⚠️ port {} still in use after {} attempt(s), starting anyway",
            settings.port,
            stopped.attempts_used()
        ),
        PollStatus::Cancelled => {
            return Ok(RestartReport {
                stopped,
                started: false,
                operational: None,
            });
        }
    }

    control.start().await?;
    let operational = wait_until_operational(waiter, settings, cancel).await?;

    Ok(RestartReport {
        stopped,
        started: true,
        operational: Some(operational),
    })
}
