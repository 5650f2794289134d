//! Business-rule gate: paused opportunities and plan submission limits.
//! Always evaluated before any model call so rejected applicants cost nothing.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::opportunity::OpportunityContext;

pub const PAUSED_REASON: &str =
    "This opportunity is not accepting applications at the moment.";

/// Answer of the submission-limit collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub allowed: bool,
    pub reason: Option<String>,
    pub limit: Option<u64>,
    pub current: Option<u64>,
}

impl LimitCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            limit: None,
            current: None,
        }
    }

    /// Human-readable rejection, preferring the collaborator's own wording.
    pub fn denial_reason(&self) -> String {
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            return reason.to_string();
        }
        match (self.current, self.limit) {
            (Some(current), Some(limit)) => format!(
                "This opportunity has reached its submission limit ({current}/{limit})."
            ),
            _ => "This opportunity has reached its submission limit.".to_string(),
        }
    }
}

#[async_trait]
pub trait SubmissionGate: Send + Sync {
    async fn check(
        &self,
        organization_id: &str,
        opportunity_id: &str,
    ) -> Result<LimitCheck, AppError>;
}

/// Calls the plan-limit endpoint. With no URL configured, every submission is allowed.
pub struct HttpSubmissionGate {
    client: Client,
    url: Option<String>,
}

impl HttpSubmissionGate {
    pub fn new(url: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()?,
            url,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LimitCheckRequest<'a> {
    organization_id: &'a str,
    opportunity_id: &'a str,
}

#[async_trait]
impl SubmissionGate for HttpSubmissionGate {
    async fn check(
        &self,
        organization_id: &str,
        opportunity_id: &str,
    ) -> Result<LimitCheck, AppError> {
        let Some(url) = &self.url else {
            return Ok(LimitCheck::allowed());
        };

        let response = self
            .client
            .post(url)
            .json(&LimitCheckRequest {
                organization_id,
                opportunity_id,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                AppError::ContextUnavailable(format!("Submission limit check failed: {e}"))
            })?;

        let check: LimitCheck = response.json().await.map_err(|e| {
            AppError::ContextUnavailable(format!("Submission limit check returned invalid body: {e}"))
        })?;
        debug!(
            "Submission limit for org {organization_id}: allowed={} current={:?} limit={:?}",
            check.allowed, check.current, check.limit
        );
        Ok(check)
    }
}

/// Rejects paused opportunities and exhausted plans with a 403 and a readable reason.
pub async fn ensure_accepting(
    opportunity: &OpportunityContext,
    gate: &dyn SubmissionGate,
) -> Result<(), AppError> {
    if opportunity.paused {
        info!("Rejected turn for paused opportunity {}", opportunity.id);
        return Err(AppError::Forbidden(PAUSED_REASON.to_string()));
    }

    if let Some(organization_id) = opportunity.organization_id.as_deref() {
        let check = gate.check(organization_id, &opportunity.id).await?;
        if !check.allowed {
            info!("Submission limit reached for opportunity {}", opportunity.id);
            return Err(AppError::Forbidden(check.denial_reason()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_opportunity, FixedGate};

    #[test]
    fn test_denial_reason_prefers_collaborator_text() {
        let check = LimitCheck {
            allowed: false,
            reason: Some("Upgrade your plan".to_string()),
            limit: Some(10),
            current: Some(10),
        };
        assert_eq!(check.denial_reason(), "Upgrade your plan");
    }

    #[test]
    fn test_denial_reason_falls_back_to_counts() {
        let check = LimitCheck {
            allowed: false,
            reason: None,
            limit: Some(25),
            current: Some(25),
        };
        assert!(check.denial_reason().contains("25/25"));
    }

    #[test]
    fn test_limit_check_wire_format() {
        let check: LimitCheck =
            serde_json::from_str(r#"{"allowed":false,"reason":"Limit","limit":5,"current":5}"#)
                .unwrap();
        assert!(!check.allowed);
        assert_eq!(check.limit, Some(5));
    }

    #[tokio::test]
    async fn test_paused_opportunity_is_forbidden() {
        let mut opportunity = sample_opportunity("opp-1");
        opportunity.paused = true;
        let err = ensure_accepting(&opportunity, &FixedGate::allow())
            .await
            .unwrap_err();
        match err {
            AppError::Forbidden(reason) => assert_eq!(reason, PAUSED_REASON),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_plan_is_forbidden() {
        let opportunity = sample_opportunity("opp-1");
        let err = ensure_accepting(&opportunity, &FixedGate::deny("Plan limit reached"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(reason) if reason == "Plan limit reached"));
    }

    #[tokio::test]
    async fn test_unconfigured_http_gate_allows() {
        let gate = HttpSubmissionGate::new(None).unwrap();
        assert!(gate.check("org", "opp").await.unwrap().allowed);
    }
}
