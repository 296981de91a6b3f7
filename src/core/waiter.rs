use crate::core::cancel::Cancellation;
use crate::domain::model::{
    CheckKind, CheckTarget, PollBudget, PollOutcome, PollStatus, ReadinessCheck,
};
use crate::domain::ports::{HttpProbe, ProbeResult, SocketTable};
use crate::utils::error::{Result, WardenError};
use std::time::Instant;

/// 單次嘗試的觀察結果
enum Observation {
    Satisfied,
    NotYet { error: Option<String> },
}

/// Polls the socket table or an HTTP endpoint until a [`ReadinessCheck`] holds,
/// its budget runs out, or the caller cancels.
pub struct ReadinessWaiter<S: SocketTable, H: HttpProbe> {
    sockets: S,
    http: H,
}

impl<S: SocketTable, H: HttpProbe> ReadinessWaiter<S, H> {
    pub fn new(sockets: S, http: H) -> Self {
        Self { sockets, http }
    }

    /// Runs `check` to completion.
    ///
    /// Transient failures are logged and retried. Exhaustion and cancellation
    /// come back as a [`PollOutcome`]; only malformed input or a non-retryable
    /// probe failure is returned as an error.
    pub async fn wait_for(
        &self,
        check: &ReadinessCheck,
        cancel: &Cancellation,
    ) -> Result<PollOutcome> {
        check.validate()?;

        let started = Instant::now();
        let mut attempts = 0u32;
        let mut last_error: Option<String> = None;

        loop {
            attempts += 1;

            let observation = tokio::select! {
                biased;
                observed = self.observe_within_budget(check) => observed?,
                _ = cancel.cancelled() => {
                    tracing::info!("⏹️ Wait for {:?} on {} cancelled", check.kind, check.target);
                    return Ok(PollOutcome::new(check, PollStatus::Cancelled, attempts, last_error, started.elapsed()));
                }
            };

            match observation {
                Observation::Satisfied => {
                    tracing::debug!(
                        "✅ {:?} on {} satisfied after {} attempt(s)",
                        check.kind,
                        check.target,
                        attempts
                    );
                    return Ok(PollOutcome::new(
                        check,
                        PollStatus::Satisfied,
                        attempts,
                        last_error,
                        started.elapsed(),
                    ));
                }
                Observation::NotYet { error } => {
                    if let Some(error) = error {
                        last_error = Some(error);
                    }
                }
            }

            let pause = match check.budget {
                PollBudget::Attempts(max) if attempts >= max => None,
                PollBudget::Attempts(_) => Some(check.interval),
                PollBudget::Deadline(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        None
                    } else {
                        // 不要睡超過期限
                        Some(check.interval.min(deadline - now))
                    }
                }
            };

            let Some(pause) = pause else {
                tracing::warn!(
                    "⏰ {} did not become {} after {} attempt(s)",
                    check.target,
                    describe(check.kind),
                    attempts
                );
                return Ok(PollOutcome::new(
                    check,
                    PollStatus::Exhausted,
                    attempts,
                    last_error,
                    started.elapsed(),
                ));
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => {
                    tracing::info!("⏹️ Wait for {:?} on {} cancelled", check.kind, check.target);
                    return Ok(PollOutcome::new(check, PollStatus::Cancelled, attempts, last_error, started.elapsed()));
                }
            }
        }
    }

    async fn observe_within_budget(&self, check: &ReadinessCheck) -> Result<Observation> {
        match check.budget {
            PollBudget::Attempts(_) => self.observe(check).await,
            PollBudget::Deadline(deadline) => {
                // 最後一次嘗試最多拖到期限後一個 interval
                let Some(cutoff) = deadline.checked_add(check.interval) else {
                    return self.observe(check).await;
                };
                let cutoff = tokio::time::Instant::from_std(cutoff);
                match tokio::time::timeout_at(cutoff, self.observe(check)).await {
                    Ok(observed) => observed,
                    Err(_) => Ok(Observation::NotYet {
                        error: Some("probe still running past the deadline".to_string()),
                    }),
                }
            }
        }
    }

    async fn observe(&self, check: &ReadinessCheck) -> Result<Observation> {
        match (&check.kind, &check.target) {
            (CheckKind::PortFree, CheckTarget::Port(port)) => {
                Ok(self.observe_port(*port, |bound| bound == 0).await)
            }
            (CheckKind::PortListening, CheckTarget::Port(port)) => {
                Ok(self.observe_port(*port, |bound| bound == 1).await)
            }
            (CheckKind::HttpHealthy, CheckTarget::Url(url)) => match self.http.probe(url).await {
                ProbeResult::Healthy(status) => {
                    tracing::debug!("🌐 GET {} answered {}", url, status);
                    Ok(Observation::Satisfied)
                }
                ProbeResult::Unhealthy(status) => {
                    tracing::debug!("🌐 service not responding OK to GET {} (status {})", url, status);
                    Ok(Observation::NotYet {
                        error: Some(format!("unexpected status {}", status)),
                    })
                }
                ProbeResult::Transient(error) => {
                    tracing::debug!("🌐 GET {} failed: {}", url, error);
                    Ok(Observation::NotYet { error: Some(error) })
                }
                ProbeResult::Fatal(message) => Err(WardenError::ProbeFatalError {
                    target: url.clone(),
                    message,
                }),
            },
            // validate() 已經排除其他組合
            (kind, target) => Err(WardenError::InvalidCheckError {
                field: "target".to_string(),
                value: target.to_string(),
                reason: format!("{:?} checks cannot poll this kind of target", kind),
            }),
        }
    }

    async fn observe_port(&self, port: u16, accept: impl Fn(usize) -> bool) -> Observation {
        match self.sockets.listening_ports().await {
            Ok(ports) => {
                let bound = ports.iter().filter(|p| **p == port).count();
                if accept(bound) {
                    Observation::Satisfied
                } else {
                    tracing::debug!("🔌 {} socket(s) listening on port {}", bound, port);
                    Observation::NotYet { error: None }
                }
            }
            Err(e) => {
                tracing::debug!("🔌 could not read socket table: {}", e);
                Observation::NotYet {
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn describe(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::PortFree => "free",
        CheckKind::PortListening => "bound",
        CheckKind::HttpHealthy => "healthy",
    }
}
