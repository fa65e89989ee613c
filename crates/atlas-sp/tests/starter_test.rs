//! Tier-aware start against a scripted API.
//!
//! The fake answers each `:startWith` call from a queue of canned results and
//! records every request, so the tests can assert the exact request sequence.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use atlas_sp::error::{ApiError, ApiResult};
use atlas_sp::report::OperationStatus;
use atlas_sp::starter::{start_processor, StartApi};
use reqwest::StatusCode;
use tiering::Tier;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    StartWith(Tier),
    Start,
}

/// Start API answering from scripted responses.
struct ScriptedApi {
    tiered: Mutex<VecDeque<ApiResult<()>>>,
    untiered_fails: bool,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedApi {
    fn new(tiered: Vec<ApiResult<()>>) -> Self {
        Self {
            tiered: Mutex::new(tiered.into()),
            untiered_fails: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_failing_untiered(mut self) -> Self {
        self.untiered_fails = true;
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StartApi for ScriptedApi {
    async fn start_with_tier(&self, _name: &str, tier: Tier) -> ApiResult<()> {
        self.calls.lock().unwrap().push(Call::StartWith(tier));
        self.tiered
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected extra :startWith call")
    }

    async fn start(&self, _name: &str) -> ApiResult<()> {
        self.calls.lock().unwrap().push(Call::Start);
        if self.untiered_fails {
            Err(ApiError::status(StatusCode::CONFLICT, "start", ""))
        } else {
            Ok(())
        }
    }
}

fn bad_request(body: &str) -> ApiResult<()> {
    Err(ApiError::status(StatusCode::BAD_REQUEST, "startWith", body))
}

#[tokio::test]
async fn test_tier_accepted_first_time() {
    let api = ScriptedApi::new(vec![Ok(())]);
    let result = start_processor(&api, "orders", Some(Tier::Sp10)).await;

    assert_eq!(result.status, OperationStatus::Started);
    assert_eq!(result.message, "Started successfully on tier SP10");
    assert_eq!(result.details["tier"], "SP10");
    assert_eq!(api.calls(), vec![Call::StartWith(Tier::Sp10)]);
}

#[tokio::test]
async fn test_rejection_retries_once_on_suggested_tier() {
    let api = ScriptedApi::new(vec![
        bad_request(r#"{"detail":"Minimum tier for this workload: SP30 or larger"}"#),
        Ok(()),
    ]);
    let result = start_processor(&api, "orders", Some(Tier::Sp5)).await;

    assert_eq!(result.status, OperationStatus::Started);
    assert_eq!(
        result.message,
        "Started successfully on tier SP30 (upgraded from SP5)"
    );
    assert_eq!(result.details["tier"], "SP30");
    assert_eq!(
        result.details["protocol"],
        "Requested → Rejected → Retrying → Resolved (SP30)"
    );
    assert_eq!(
        api.calls(),
        vec![Call::StartWith(Tier::Sp5), Call::StartWith(Tier::Sp30)]
    );
}

#[tokio::test]
async fn test_failed_retry_falls_back_to_plain_start() {
    let api = ScriptedApi::new(vec![
        bad_request("parallelism exceeds tier limit. Requested: 6"),
        bad_request("Minimum tier for this workload: SP50"),
    ]);
    let result = start_processor(&api, "orders", Some(Tier::Sp5)).await;

    assert_eq!(result.status, OperationStatus::Started);
    assert_eq!(
        result.message,
        "Started successfully (using default tier - tier specification failed)"
    );
    assert_eq!(result.details["tier"], "current");
    assert_eq!(
        api.calls(),
        vec![
            Call::StartWith(Tier::Sp5),
            Call::StartWith(Tier::Sp30),
            Call::Start
        ]
    );
}

#[tokio::test]
async fn test_rejection_without_suggestion_falls_back() {
    let api = ScriptedApi::new(vec![bad_request("Invalid pipeline")]);
    let result = start_processor(&api, "orders", Some(Tier::Sp10)).await;

    assert_eq!(result.status, OperationStatus::Started);
    assert_eq!(api.calls(), vec![Call::StartWith(Tier::Sp10), Call::Start]);
}

#[tokio::test]
async fn test_unsupported_tiered_start_falls_back() {
    let api = ScriptedApi::new(vec![Err(ApiError::status(
        StatusCode::NOT_FOUND,
        "startWith",
        "",
    ))]);
    let result = start_processor(&api, "orders", Some(Tier::Sp10)).await;

    assert_eq!(result.status, OperationStatus::Started);
    assert_eq!(api.calls(), vec![Call::StartWith(Tier::Sp10), Call::Start]);
}

#[tokio::test]
async fn test_no_tier_uses_plain_start_only() {
    let api = ScriptedApi::new(vec![]);
    let result = start_processor(&api, "orders", None).await;

    assert_eq!(result.status, OperationStatus::Started);
    assert_eq!(result.message, "Started successfully");
    assert!(result.details.get("protocol").is_none());
    assert_eq!(api.calls(), vec![Call::Start]);
}

#[tokio::test]
async fn test_server_error_fails_without_fallback() {
    let api = ScriptedApi::new(vec![Err(ApiError::status(
        StatusCode::INTERNAL_SERVER_ERROR,
        "startWith",
        r#"{"detail":"boom"}"#,
    ))]);
    let result = start_processor(&api, "orders", Some(Tier::Sp10)).await;

    assert_eq!(result.status, OperationStatus::Failed);
    assert_eq!(result.http_code, Some(500));
    assert!(result.message.ends_with("- boom"));
    assert_eq!(api.calls(), vec![Call::StartWith(Tier::Sp10)]);
}

#[tokio::test]
async fn test_failed_plain_start_reports_code() {
    let api = ScriptedApi::new(vec![]).with_failing_untiered();
    let result = start_processor(&api, "orders", None).await;

    assert_eq!(result.status, OperationStatus::Failed);
    assert_eq!(result.http_code, Some(409));
}
