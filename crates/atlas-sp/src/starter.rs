//! Tier-aware processor start
//!
//! Runs [`StartProtocol`] against the API: the protocol decides which request
//! to send next, this module sends it and feeds the outcome back.

use crate::client::{ensure_success, AtlasClient, ApiVersion};
use crate::error::ApiResult;
use crate::report::{Operation, OperationResult, OperationStatus};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tiering::{AttemptOutcome, NextStep, StartProtocol, StartState, Tier};

/// The two start endpoints.
#[async_trait]
pub trait StartApi: Send + Sync {
    /// `POST …/processor/{name}:startWith` with `{"tier": …}`.
    async fn start_with_tier(&self, name: &str, tier: Tier) -> ApiResult<()>;

    /// `POST …/processor/{name}:start`.
    async fn start(&self, name: &str) -> ApiResult<()>;
}

#[async_trait]
impl StartApi for AtlasClient {
    async fn start_with_tier(&self, name: &str, tier: Tier) -> ApiResult<()> {
        let url = format!("{}/processor/{name}:startWith", self.workspace_url()?);
        let body = json!({ "tier": tier });
        let response = self
            .send(Method::POST, &url, &[], Some(&body), ApiVersion::V20250312)
            .await?;
        ensure_success(response).await.map(drop)
    }

    async fn start(&self, name: &str) -> ApiResult<()> {
        let url = format!("{}/processor/{name}:start", self.workspace_url()?);
        self.post_empty(&url).await
    }
}

/// Classify a tiered-start result for the protocol.
pub fn classify_attempt(result: &ApiResult<()>) -> AttemptOutcome {
    let Err(e) = result else {
        return AttemptOutcome::Accepted;
    };
    match (e.http_code(), e.body()) {
        (Some(400), Some(body)) => AttemptOutcome::Rejected {
            body: body.to_string(),
        },
        (Some(status @ (404 | 405)), Some(_)) => AttemptOutcome::Unsupported { status },
        (status, _) => AttemptOutcome::Failed {
            message: e.detailed_message(),
            status,
        },
    }
}

/// Start `name`, on `tier` when one is given.
///
/// At most two tiered requests are made (the second only on the tier the
/// service suggested), followed by at most one untiered request.
pub async fn start_processor<A>(api: &A, name: &str, tier: Option<Tier>) -> OperationResult
where
    A: StartApi + ?Sized,
{
    let mut protocol = StartProtocol::new(tier);

    loop {
        match protocol.next_step() {
            NextStep::StartWithTier(attempt_tier) => {
                let result = api.start_with_tier(name, attempt_tier).await;
                let outcome = classify_attempt(&result);
                log_outcome(name, attempt_tier, &outcome);
                if let Err(e) = protocol.record(outcome) {
                    tracing::error!(processor = name, error = %e, "Start protocol violated");
                    return OperationResult::new(
                        name,
                        Operation::Start,
                        OperationStatus::Failed,
                        e.to_string(),
                    );
                }
                if let (StartState::Retrying, Some(suggested)) =
                    (protocol.state(), protocol.retry_tier())
                {
                    tracing::info!(
                        processor = name,
                        requested = %attempt_tier,
                        %suggested,
                        "Tier insufficient, retrying on suggested tier"
                    );
                }
            }
            NextStep::StartUntiered => return untiered_start(api, name, &protocol).await,
            NextStep::Done => return finish(name, &protocol),
        }
    }
}

fn log_outcome(name: &str, tier: Tier, outcome: &AttemptOutcome) {
    match outcome {
        AttemptOutcome::Accepted => {
            tracing::info!(processor = name, %tier, "Tiered start accepted");
        }
        AttemptOutcome::Rejected { body } => {
            tracing::warn!(processor = name, %tier, body = %body, "Tier rejected by capacity validation");
        }
        AttemptOutcome::Unsupported { status } => {
            tracing::warn!(processor = name, %tier, status, "Tiered start unsupported");
        }
        AttemptOutcome::Failed { message, .. } => {
            tracing::warn!(processor = name, %tier, error = %message, "Tiered start failed");
        }
    }
}

async fn untiered_start<A>(api: &A, name: &str, protocol: &StartProtocol) -> OperationResult
where
    A: StartApi + ?Sized,
{
    if let Some(reason) = protocol.fallback_reason().filter(|_| protocol.requested().is_some()) {
        tracing::warn!(processor = name, reason, "Falling back to untiered start");
    }

    match api.start(name).await {
        Ok(()) => {
            let mut message = "Started successfully".to_string();
            if protocol.requested().is_some() {
                message.push_str(" (using default tier - tier specification failed)");
            }
            tracing::info!(processor = name, "Started processor");
            with_protocol(
                OperationResult::new(name, Operation::Start, OperationStatus::Started, message)
                    .with_detail("tier", "current"),
                protocol,
            )
        }
        Err(e) => with_protocol(OperationResult::failed(name, Operation::Start, &e), protocol),
    }
}

fn finish(name: &str, protocol: &StartProtocol) -> OperationResult {
    match (protocol.state(), protocol.resolved_tier()) {
        (StartState::Resolved, Some(tier)) => {
            let message = match protocol.upgraded_from() {
                Some(requested) => {
                    format!("Started successfully on tier {tier} (upgraded from {requested})")
                }
                None => format!("Started successfully on tier {tier}"),
            };
            with_protocol(
                OperationResult::new(name, Operation::Start, OperationStatus::Started, message)
                    .with_detail("tier", tier.as_str()),
                protocol,
            )
        }
        _ => {
            let (message, code) = protocol
                .failure()
                .map(|(m, c)| (m.to_string(), c))
                .unwrap_or_else(|| (format!("Start ended in state {}", protocol.state()), None));
            let mut result =
                OperationResult::new(name, Operation::Start, OperationStatus::Failed, message);
            result.http_code = code;
            with_protocol(result, protocol)
        }
    }
}

/// Attach the transition history when a tier was requested.
fn with_protocol(result: OperationResult, protocol: &StartProtocol) -> OperationResult {
    if protocol.requested().is_none() {
        return result;
    }
    result.with_detail("protocol", protocol.summary())
}
