//! Mock BETYdb traits endpoint
//!
//! An axum server on an ephemeral port answering `POST /api/v1/traits.csv` with
//! a fixed status and body, recording what it received.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One received upload
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub key: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    response: String,
    received: Arc<Mutex<Vec<ReceivedUpload>>>,
}

/// Handle to a running mock
pub struct MockBetyDb {
    pub base_url: String,
    received: Arc<Mutex<Vec<ReceivedUpload>>>,
}

impl MockBetyDb {
    pub fn received(&self) -> Vec<ReceivedUpload> {
        self.received.lock().unwrap().clone()
    }
}

async fn traits_csv(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    state.received.lock().unwrap().push(ReceivedUpload {
        key: params.get("key").cloned(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    (state.status, state.response.clone())
}

/// Start a mock answering every upload with `status` and `response`
pub async fn spawn_mock_betydb(status: StatusCode, response: &str) -> MockBetyDb {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        response: response.to_string(),
        received: Arc::clone(&received),
    };

    let app = Router::new()
        .route("/api/v1/traits.csv", post(traits_csv))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBetyDb {
        base_url: format!("http://{}", addr),
        received,
    }
}
