//! Optional polling fallback: a TCP-connect reachability probe that feeds the
//! monitor when no native signal is available.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ConnectivityMonitor;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// `host:port` that must accept a TCP connection for us to count as online
    pub addr: String,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            addr: "1.1.1.1:443".to_string(),
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(3),
        }
    }
}

/// Stops the probe task when cancelled or dropped.
pub struct ProbeHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Reachability check task panicked");
                }
            }
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn reachable(addr: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

impl ConnectivityMonitor {
    /// Poll `config.addr` every `config.interval` and report the result
    pub fn spawn_probe(&self, config: ProbeConfig) -> ProbeHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let monitor = self.clone();

        let interval = if config.interval.is_zero() {
            tracing::warn!("Reachability check interval must be non-zero; using the default");
            ProbeConfig::default().interval
        } else {
            config.interval
        };

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let online = reachable(&config.addr, config.timeout).await;
                        tracing::trace!(addr = %config.addr, online, "Reachability probe");
                        monitor.set_online(online);
                    }
                }
            }
        });

        ProbeHandle {
            cancel,
            task: Some(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_reports_listener_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let monitor = ConnectivityMonitor::new(false);
        let mut state = monitor.handle().watch();
        let probe = monitor.spawn_probe(ProbeConfig {
            addr,
            interval: Duration::from_millis(20),
            timeout: Duration::from_millis(500),
        });

        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|online| *online))
            .await
            .expect("probe should mark us online")
            .unwrap();

        probe.shutdown().await;
        accept.abort();
    }

    #[tokio::test]
    async fn zero_interval_falls_back_to_default() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move { while listener.accept().await.is_ok() {} });

        let monitor = ConnectivityMonitor::new(false);
        let mut state = monitor.handle().watch();
        let checker = monitor.spawn_probe(ProbeConfig {
            addr,
            interval: Duration::ZERO,
            timeout: Duration::from_millis(500),
        });

        // The first tick fires immediately, so the task must be alive to report it
        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|online| *online))
            .await
            .expect("a zero interval should fall back to the default")
            .unwrap();

        checker.shutdown().await;
        accept.abort();
    }
}
