use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// How a single HTTP probe went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// 2xx or 404
    Healthy(u16),
    /// Any other status; worth retrying.
    Unhealthy(u16),
    /// Connection refused, timeout, reset.
    Transient(String),
    /// Malformed request or TLS validation failure; retrying will not help.
    Fatal(String),
}

#[async_trait]
pub trait SocketTable: Send + Sync {
    /// One entry per listening TCP socket on the host.
    async fn listening_ports(&self) -> Result<Vec<u16>>;
}

#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn stop(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn is_running(&self) -> Result<bool>;
}

#[async_trait]
impl<T: SocketTable + ?Sized> SocketTable for Arc<T> {
    async fn listening_ports(&self) -> Result<Vec<u16>> {
        (**self).listening_ports().await
    }
}

#[async_trait]
impl<T: HttpProbe + ?Sized> HttpProbe for Arc<T> {
    async fn probe(&self, url: &str) -> ProbeResult {
        (**self).probe(url).await
    }
}

#[async_trait]
impl<T: ServiceControl + ?Sized> ServiceControl for Arc<T> {
    async fn stop(&self) -> Result<()> {
        (**self).stop().await
    }

    async fn start(&self) -> Result<()> {
        (**self).start().await
    }

    async fn is_running(&self) -> Result<bool> {
        (**self).is_running().await
    }
}
