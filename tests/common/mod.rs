//! Shared mock participant for integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::put;
use axum::Router;
use tokio::net::TcpListener;

use lra_tck::config::TckConfig;

/// One call seen by the mock participant.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub coerce_status: u16,
    pub context: Option<String>,
}

/// Handle onto a running mock participant.
#[derive(Clone, Default)]
pub struct Participant {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    next_id: Arc<AtomicU32>,
    malformed: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl Participant {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// End calls carrying `lra` as context.
    pub fn end_calls(&self, lra: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path.ends_with("/end-lra") && c.context.as_deref() == Some(lra))
            .collect()
    }

    /// Answer start calls with a body that is not an LRA id.
    pub fn answer_malformed(&self) {
        self.malformed.store(true, Ordering::SeqCst);
    }
}

async fn handle(
    State(participant): State<Participant>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let coerce_status = query
        .get("Coerce-Status")
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(200);
    let context = headers
        .get("Long-Running-Action")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    participant.calls.lock().unwrap().push(RecordedCall {
        path: format!("/{}", path),
        coerce_status,
        context,
    });

    let body = if path.ends_with("start-dont-end") {
        if participant.malformed.load(Ordering::SeqCst) {
            "<html>oops</html>".to_string()
        } else {
            let n = participant.next_id.fetch_add(1, Ordering::SeqCst);
            format!("http://coordinator.test/lra-coordinator/0_{}", n)
        }
    } else {
        String::new()
    };

    let status = StatusCode::from_u16(coerce_status).unwrap_or(StatusCode::OK);
    (status, body)
}

/// Start a mock participant on an ephemeral port.
pub async fn start_participant() -> (SocketAddr, Participant) {
    let participant = Participant::default();
    let app = Router::new()
        .route("/{*path}", put(handle))
        .with_state(participant.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, participant)
}

/// Configuration pointing at `addr`.
pub fn config_for(addr: SocketAddr) -> TckConfig {
    let mut config = TckConfig::default();
    config.target.base_url = format!("http://{}/", addr);
    config.target.request_timeout_secs = 5;
    config.target.connect_timeout_secs = 1;
    config
}
