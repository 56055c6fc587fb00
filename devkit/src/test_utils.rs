/*!
Test Harness pour l'agent Oiotung

Facilite l'écriture de tests de bout en bout avec:
- Un serveur de statut scripté (côté TCP)
- Un webhook simulé via wiremock (côté HTTP)
- Des assertions sur les messages reçus par le webhook
*/

use crate::status_stub::{Reply, StubStatusServer};
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBHOOK_PATH: &str = "/webhook";

/// Harness de test complet: serveur de statut + webhook
pub struct TestHarness {
    pub status: StubStatusServer,
    pub webhook: MockServer,
}

impl TestHarness {
    /// Démarre les deux doublures; `script` est rejoué à chaque connexion
    pub async fn start(script: Vec<Reply>) -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        let status = StubStatusServer::start(script).await?;
        let webhook = MockServer::start().await;

        Ok(Self { status, webhook })
    }

    /// URL complète du webhook simulé
    pub fn webhook_endpoint(&self) -> String {
        format!("{}{}", self.webhook.uri(), WEBHOOK_PATH)
    }

    /// Le webhook répond `status` à chaque PATCH
    pub async fn mount_webhook(&self, status: u16) {
        Mock::given(method("PATCH"))
            .and(path(WEBHOOK_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.webhook)
            .await;
    }

    /// Corps de toutes les requêtes reçues, dans l'ordre
    pub async fn webhook_bodies(&self) -> Vec<String> {
        self.webhook
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
            .collect()
    }

    /// Parse le dernier corps reçu en JSON
    pub async fn last_webhook_json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.webhook_bodies().await.last() {
            Some(body) => Ok(Some(serde_json::from_str(body)?)),
            None => Ok(None),
        }
    }

    /// Attend qu'au moins `count` requêtes soient arrivées
    pub async fn wait_for_webhook(&self, count: usize, timeout_ms: u64) -> Result<Vec<String>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            let bodies = self.webhook_bodies().await;
            if bodies.len() >= count {
                log::info!("✅ Received {} webhook requests", bodies.len());
                return Ok(bodies);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        anyhow::bail!("Timeout waiting for {} webhook requests", count);
    }
}
