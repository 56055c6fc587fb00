//! Webhook relay
//!
//! Sends rendered templates as a PATCH to the configured endpoint, honours
//! `Retry-After` on every response and treats anything outside 2xx as failure.

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;

pub const USER_AGENT: &str = concat!("Oiotung/", env!("CARGO_PKG_VERSION"), " (status relay)");
const REDACTED_ENDPOINT: &str = "[ENDPOINT]";

/// Settled webhook response
#[derive(Debug)]
pub struct NotificationOutcome {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("webhook answered {code}: {detail}")]
    Status { code: u16, detail: String },
}

pub struct Notifier {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl Notifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        Self::new(config.webhook.endpoint.clone(), config.webhook_timeout())
    }

    /// Send one message. Returns only after any requested `Retry-After` wait.
    pub async fn notify(&self, body: String) -> Result<NotificationOutcome, NotifyError> {
        debug!("Sending webhook request ({} bytes)", body.len());
        let response = self
            .client
            .patch(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url()))?;

        let status = response.status();
        let retry_after_raw = response
            .headers()
            .get(RETRY_AFTER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let headers = format!("{:?}", response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url()))?;

        let summary = self.redact(&format!("{status} ({headers}): {body}"));
        debug!("Got webhook response: {}", summary);

        let retry_after = match retry_after_raw {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => {
                    info!("Webhook response {} asked us to sleep for {}s, doing it...", summary, secs);
                    let wait = Duration::from_secs(secs);
                    tokio::time::sleep(wait).await;
                    Some(wait)
                }
                Err(_) => {
                    warn!("Ignoring unparsable Retry-After value: {}", raw);
                    None
                }
            },
            None => None,
        };

        if !status.is_success() {
            return Err(NotifyError::Status {
                code: status.as_u16(),
                detail: summary,
            });
        }

        Ok(NotificationOutcome {
            status: status.as_u16(),
            retry_after,
            body,
        })
    }

    /// Strip the endpoint literal from text headed for the logs
    pub fn redact(&self, text: &str) -> String {
        if self.endpoint.is_empty() {
            return text.to_string();
        }
        text.replace(&self.endpoint, REDACTED_ENDPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn notifier_for(server: &MockServer) -> Notifier {
        Notifier::new(format!("{}/hook", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_patch_with_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", USER_AGENT))
            .and(body_string(r#"{"content":"42/100"}"#))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = notifier_for(&server)
            .await
            .notify(r#"{"content":"42/100"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(outcome.status, 204);
        assert!(outcome.retry_after.is_none());
    }

    #[tokio::test]
    async fn test_success_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(204).insert_header("Retry-After", "1"))
            .mount(&server)
            .await;

        let started = Instant::now();
        let outcome = notifier_for(&server).await.notify("{}".into()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(outcome.retry_after, Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_rate_limited_sleeps_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "1")
                    .set_body_string(r#"{"message":"You are being rate limited."}"#),
            )
            .mount(&server)
            .await;

        let started = Instant::now();
        let err = notifier_for(&server).await.notify("{}".into()).await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(matches!(err, NotifyError::Status { code: 429, .. }));
    }

    #[tokio::test]
    async fn test_unparsable_retry_after_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200).insert_header("Retry-After", "soon"))
            .mount(&server)
            .await;

        let outcome = notifier_for(&server).await.notify("{}".into()).await.unwrap();
        assert!(outcome.retry_after.is_none());
    }

    #[tokio::test]
    async fn test_error_detail_is_redacted() {
        let server = MockServer::start().await;
        let endpoint = format!("{}/hook", server.uri());
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404).set_body_string(format!("no webhook at {endpoint}")))
            .mount(&server)
            .await;

        let err = notifier_for(&server).await.notify("{}".into()).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("[ENDPOINT]"));
        assert!(!text.contains(&endpoint));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let notifier = Notifier::new(format!("{}/hook", server.uri()), Duration::from_millis(200)).unwrap();
        let err = notifier.notify("{}".into()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = Notifier::new(format!("http://{addr}/hook"), Duration::from_secs(1)).unwrap();
        let err = notifier.notify("{}".into()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
