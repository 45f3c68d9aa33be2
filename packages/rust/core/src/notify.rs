//! Notification fan-out to the downstream impact-assessment service.
//!
//! Fan-out is best-effort: a newly persisted update is already durable, so
//! a delivery failure is logged and skipped rather than failing the crawl.
//! Every new update gets a standard assessment; forward-looking updates
//! (drafts, consultations) additionally go to the predictive endpoint for
//! speculative analysis.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use regmonitor_shared::{MonitorError, RegulatoryUpdate, Result};

/// Downstream impact-analysis collaborator.
#[async_trait]
pub trait ImpactAssessor: Send + Sync {
    /// Assess a published update.
    async fn assess(&self, update: &RegulatoryUpdate) -> Result<()>;

    /// Speculatively assess a draft or consultation-stage update.
    async fn assess_predictive(&self, update: &RegulatoryUpdate) -> Result<()>;
}

/// HTTP client for the impact-assessment service.
pub struct HttpImpactAssessor {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpImpactAssessor {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, update: &RegulatoryUpdate) -> Result<()> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| MonitorError::Notification(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .json(update)
            .send()
            .await
            .map_err(|e| MonitorError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Notification(format!(
                "assessor returned HTTP {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ImpactAssessor for HttpImpactAssessor {
    async fn assess(&self, update: &RegulatoryUpdate) -> Result<()> {
        self.post("assess", update).await
    }

    async fn assess_predictive(&self, update: &RegulatoryUpdate) -> Result<()> {
        self.post("assess/predictive", update).await
    }
}

/// Deliver each new update to the assessor: one standard assessment per
/// update, plus a predictive assessment for forward-looking ones. Returns
/// how many updates had every required delivery succeed.
pub async fn fan_out(assessor: &dyn ImpactAssessor, updates: &[RegulatoryUpdate]) -> usize {
    let mut delivered = 0;
    for update in updates {
        let mut ok = match assessor.assess(update).await {
            Ok(()) => true,
            Err(e) => {
                warn!(update_id = %update.id, error = %e, "impact assessment delivery failed");
                false
            }
        };

        if update.update_type.is_forward_looking() {
            if let Err(e) = assessor.assess_predictive(update).await {
                warn!(update_id = %update.id, error = %e, "predictive assessment delivery failed");
                ok = false;
            }
        }

        if ok {
            debug!(update_id = %update.id, "update delivered to assessor");
            delivered += 1;
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use regmonitor_shared::{ImpactLevel, SourceId, UpdateStatus, UpdateType};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn update(update_type: UpdateType) -> RegulatoryUpdate {
        RegulatoryUpdate {
            id: uuid::Uuid::now_v7().to_string(),
            source_id: SourceId::new(),
            regulation_ref: None,
            title: "Update".into(),
            description: String::new(),
            content: None,
            update_type,
            published_date: None,
            effective_date: None,
            source_url: "https://example.org/u/1".into(),
            document_url: None,
            status: UpdateStatus::Pending,
            impact: ImpactLevel::Low,
            keywords: vec![],
            confidence: 0.5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_update_is_assessed_and_forward_looking_also_goes_predictive() {
        let server = MockServer::start().await;
        // All three updates get the standard assessment.
        Mock::given(method("POST"))
            .and(path("/assess"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;
        // Only the consultation gets the predictive call on top.
        Mock::given(method("POST"))
            .and(path("/assess/predictive"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let assessor = HttpImpactAssessor::new(Url::parse(&format!("{}/", server.uri())).unwrap());
        let updates = vec![
            update(UpdateType::Guidance),
            update(UpdateType::Consultation),
            update(UpdateType::Amendment),
        ];
        let delivered = fan_out(&assessor, &updates).await;
        assert_eq!(delivered, 3);
    }

    #[tokio::test]
    async fn delivery_failure_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let assessor = HttpImpactAssessor::new(Url::parse(&format!("{}/", server.uri())).unwrap());
        let delivered = fan_out(&assessor, &[update(UpdateType::Guidance)]).await;
        assert_eq!(delivered, 0);
    }
}
