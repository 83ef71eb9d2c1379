use kickoff_core::{Readiness, ReadinessOutcome};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, trace};

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for a single HTTP request or TCP connect attempt
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Polls a readiness condition until it holds or a deadline passes
#[derive(Clone)]
pub struct ReadinessProbe {
    client: Client,
    interval: Duration,
}

impl ReadinessProbe {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// A single check of the condition
    pub async fn check(&self, readiness: &Readiness) -> bool {
        match readiness {
            Readiness::Http(url) => match self.client.get(url).send().await {
                Ok(response) => {
                    trace!(url = %url, status = %response.status(), "HTTP readiness check");
                    response.status().is_success()
                }
                Err(e) => {
                    trace!(url = %url, error = %e, "HTTP readiness check failed");
                    false
                }
            },
            Readiness::Tcp(addr) => matches!(
                tokio::time::timeout(ATTEMPT_TIMEOUT, TcpStream::connect(addr.as_str())).await,
                Ok(Ok(_))
            ),
            Readiness::File(path) => tokio::fs::metadata(path).await.is_ok(),
        }
    }

    /// Poll until ready or until `timeout` has elapsed
    pub async fn wait(&self, readiness: &Readiness, timeout: Duration) -> ReadinessOutcome {
        let start = Instant::now();

        loop {
            if self.check(readiness).await {
                let waited_ms = start.elapsed().as_millis() as u64;
                debug!(probe = ?readiness, waited_ms, "Target is ready");
                return ReadinessOutcome::Ready { waited_ms };
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return ReadinessOutcome::TimedOut {
                    waited_ms: elapsed.as_millis() as u64,
                };
            }

            tokio::time::sleep(self.interval.min(timeout - elapsed)).await;
        }
    }
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tokio::net::TcpListener;

    fn fast_probe() -> ReadinessProbe {
        ReadinessProbe::new().with_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_http_probe_ready_on_2xx() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let readiness = Readiness::Http(format!("{}/health", server.url()));
        let outcome = fast_probe().wait(&readiness, Duration::from_secs(2)).await;

        assert!(matches!(outcome, ReadinessOutcome::Ready { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_probe_not_ready_on_5xx() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(503)
            .expect_at_least(1)
            .create_async()
            .await;

        let readiness = Readiness::Http(format!("{}/health", server.url()));
        let outcome = fast_probe().wait(&readiness, Duration::from_millis(150)).await;

        assert!(matches!(outcome, ReadinessOutcome::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_tcp_probe_ready_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let readiness = Readiness::Tcp(addr);
        assert!(fast_probe().check(&readiness).await);
    }

    #[tokio::test]
    async fn test_tcp_probe_times_out_when_closed() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let outcome = fast_probe()
            .wait(&Readiness::Tcp(addr), Duration::from_millis(100))
            .await;
        match outcome {
            ReadinessOutcome::TimedOut { waited_ms } => assert!(waited_ms >= 100),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_file_probe_waits_for_file() {
        let dir = tempfile::tempdir().unwrap();
        let flag = dir.path().join("ready.flag");
        let readiness = Readiness::File(flag.clone());

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            tokio::fs::write(&flag, b"up").await.unwrap();
        });

        let outcome = fast_probe().wait(&readiness, Duration::from_secs(2)).await;
        writer.await.unwrap();

        match outcome {
            ReadinessOutcome::Ready { waited_ms } => assert!(waited_ms >= 50),
            other => panic!("expected ready, got {:?}", other),
        }
    }
}
