//! `AtlasClient` against a local mock of the Atlas Admin API.
//!
//! The mock (axum, random port) answers every request without an
//! `Authorization` header with a digest challenge, and every authorized
//! request from a queue of scripted responses. It records all requests so
//! the tests can assert the exact sequence, headers and bodies.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

use atlas_sp::report::OperationStatus;
use atlas_sp::{start_processor, AtlasClient, AtlasConfig};
use tiering::Tier;

const CHALLENGE: &str = r#"Digest realm="MMS Public API", domain="", nonce="OSuWr3ToTgLnVZ36Jz6O3Dg9qSxVdAXv", algorithm=MD5, qop="auth", stale=false"#;

const ACCEPT_DEFAULT: &str = "application/vnd.atlas.2024-05-30+json";
const ACCEPT_TIERED: &str = "application/vnd.atlas.2025-03-12+json";

const WORKSPACE: &str = "/api/atlas/v2/groups/p1/streams/ws";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    target: String,
    accept: Option<String>,
    authorization: Option<String>,
    body: Bytes,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Clone, Default)]
struct MockAtlas {
    requests: Arc<Mutex<Vec<Recorded>>>,
    responses: Arc<Mutex<VecDeque<(u16, Value)>>>,
}

impl MockAtlas {
    fn scripted(responses: Vec<(u16, Value)>) -> Self {
        Self {
            requests: Arc::default(),
            responses: Arc::new(Mutex::new(responses.into())),
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn authorized(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.authorization.is_some())
            .collect()
    }
}

async fn atlas(
    State(mock): State<MockAtlas>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let authorization = header_text(header::AUTHORIZATION);
    mock.requests.lock().unwrap().push(Recorded {
        method,
        target: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        accept: header_text(header::ACCEPT),
        authorization: authorization.clone(),
        body,
    });

    if authorization.is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, CHALLENGE)],
        )
            .into_response();
    }

    let (status, document) = mock
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((200, json!({})));
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        document.to_string(),
    )
        .into_response()
}

/// Start the mock on a random port and return a client pointed at it.
async fn start_mock_atlas(mock: MockAtlas) -> AtlasClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    let router = Router::new().fallback(atlas).with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let values: BTreeMap<String, String> = [
        ("PUBLIC_KEY", "pub".to_string()),
        ("PRIVATE_KEY", "priv".to_string()),
        ("PROJECT_ID", "p1".to_string()),
        ("SP_WORKSPACE_NAME", "ws".to_string()),
        ("ATLAS_BASE_URL", format!("http://{addr}/api/atlas/v2")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let config = AtlasConfig::from_values(values).unwrap();
    AtlasClient::new(Arc::new(config)).unwrap()
}

#[tokio::test]
async fn test_digest_challenged_tiered_start_with_upgrade() {
    let mock = MockAtlas::scripted(vec![
        (
            400,
            json!({"detail": "Minimum tier for this workload: SP30 or larger", "errorCode": "INVALID_ATTRIBUTE"}),
        ),
        (200, json!({})),
    ]);
    let client = start_mock_atlas(mock.clone()).await;

    let result = start_processor(&client, "orders", Some(Tier::Sp5)).await;
    assert_eq!(result.status, OperationStatus::Started);
    assert_eq!(
        result.message,
        "Started successfully on tier SP30 (upgraded from SP5)"
    );

    // Challenge, answer, challenge, answer.
    let requests = mock.requests();
    assert_eq!(requests.len(), 4);
    let start_with = format!("{WORKSPACE}/processor/orders:startWith");
    for (i, request) in requests.iter().enumerate() {
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.target, start_with);
        assert_eq!(request.accept.as_deref(), Some(ACCEPT_TIERED));
        assert_eq!(request.authorization.is_some(), i % 2 == 1);
    }

    let authorized = mock.authorized();
    let digest = authorized[0].authorization.as_deref().unwrap();
    assert!(digest.starts_with("Digest "), "unexpected header: {digest}");
    assert!(digest.contains(r#"username="pub""#));
    assert!(digest.contains(r#"realm="MMS Public API""#));
    assert!(digest.contains(&start_with));

    assert_eq!(authorized[0].json(), json!({"tier": "SP5"}));
    assert_eq!(authorized[1].json(), json!({"tier": "SP30"}));
}

#[tokio::test]
async fn test_server_error_on_tiered_start_is_not_retried() {
    let mock = MockAtlas::scripted(vec![(500, json!({"detail": "boom"}))]);
    let client = start_mock_atlas(mock.clone()).await;

    let result = start_processor(&client, "orders", Some(Tier::Sp10)).await;
    assert_eq!(result.status, OperationStatus::Failed);
    assert_eq!(result.http_code, Some(500));
    assert!(result.message.ends_with("- boom"), "{}", result.message);
    assert_eq!(mock.authorized().len(), 1);
}

#[tokio::test]
async fn test_plain_start_uses_default_accept_header() {
    let mock = MockAtlas::scripted(vec![(200, json!({}))]);
    let client = start_mock_atlas(mock.clone()).await;

    let result = start_processor(&client, "orders", None).await;
    assert_eq!(result.status, OperationStatus::Started);

    let authorized = mock.authorized();
    assert_eq!(authorized.len(), 1);
    assert_eq!(
        authorized[0].target,
        format!("{WORKSPACE}/processor/orders:start")
    );
    assert_eq!(authorized[0].accept.as_deref(), Some(ACCEPT_DEFAULT));
}

#[tokio::test]
async fn test_conflict_and_missing_map_to_statuses() {
    let mock = MockAtlas::scripted(vec![
        (409, json!({"detail": "Workspace already exists"})),
        (404, json!({"detail": "Connection not found"})),
        (409, json!({"detail": "Connection already exists"})),
    ]);
    let client = start_mock_atlas(mock.clone()).await;

    let created = client.create_workspace("ws2", "AWS", "US_EAST_1").await;
    assert_eq!(created.status, OperationStatus::AlreadyExists);

    let deleted = client.delete_connection("kafka").await;
    assert_eq!(deleted.status, OperationStatus::NotFound);

    let http = client
        .create_http_connection("hooks", "https://example.com/hook")
        .await;
    assert_eq!(http.status, OperationStatus::AlreadyExists);

    let authorized = mock.authorized();
    assert_eq!(authorized.len(), 3);

    assert_eq!(authorized[0].method, Method::POST);
    assert_eq!(authorized[0].target, "/api/atlas/v2/groups/p1/streams");
    assert_eq!(
        authorized[0].json(),
        json!({"name": "ws2", "dataProcessRegion": {"cloudProvider": "AWS", "region": "US_EAST_1"}})
    );

    assert_eq!(authorized[1].method, Method::DELETE);
    assert_eq!(authorized[1].target, format!("{WORKSPACE}/connections/kafka"));

    assert_eq!(authorized[2].target, format!("{WORKSPACE}/connections"));
    assert_eq!(authorized[2].json()["type"], "Https");
}

#[tokio::test]
async fn test_verbose_listing_sends_verbose_params() {
    let mock = MockAtlas::scripted(vec![
        (200, json!({"results": [{"name": "orders", "state": "STARTED"}], "totalCount": 1})),
        (
            200,
            json!({"name": "orders", "tier": "SP10", "scaleFactor": 2, "stats": {"inputMessageCount": 5}}),
        ),
    ]);
    let client = start_mock_atlas(mock.clone()).await;

    let processors = client.list_processors(true).await.unwrap();
    assert_eq!(processors.len(), 1);
    let orders = &processors[0];
    assert_eq!(orders["state"], "STARTED");
    assert_eq!(orders["tier"], "SP10");
    assert_eq!(orders["scaleFactor"], 2);
    assert_eq!(orders["stats"]["inputMessageCount"], 5);
    assert_eq!(orders["full_response"]["name"], "orders");

    let targets: Vec<String> = mock.authorized().into_iter().map(|r| r.target).collect();
    assert_eq!(
        targets,
        vec![
            format!("{WORKSPACE}/processors"),
            format!(
                "{WORKSPACE}/processor/orders?includeCount=true&verbose=true&options.verbose=true"
            ),
        ]
    );
}
