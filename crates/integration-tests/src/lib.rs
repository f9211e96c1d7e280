//! Integration tests for Tealtree.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tealtree-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `persistence` - State survives across store instances over one file
//! - `corrupt_state` - Damaged state files degrade to empty records
//! - `flows` - Login, guard, cart and checkout end to end
//!
//! Every test gets its own state file under the system temp directory, and a
//! manual clock shared by every store opened through the same context.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use uuid::Uuid;

use tealtree_client::api::{ApiClient, ApiError, ApiResponse, Method, Transport};
use tealtree_client::clock::ManualClock;
use tealtree_client::state::ClientState;
use tealtree_client::storage::FileBackend;

/// Fixed start time for every test clock (2030-03-17T17:46:40Z).
pub const START_MS: i64 = 1_900_000_000_000;

/// An isolated state file plus a controllable clock.
pub struct TestContext {
    dir: PathBuf,
    path: PathBuf,
    clock: Arc<ManualClock>,
}

impl TestContext {
    /// Create a context with a fresh, not yet existing state file.
    #[must_use]
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("tealtree-it-{}", Uuid::new_v4()));
        let path = dir.join("state.json");
        Self {
            dir,
            path,
            clock: Arc::new(ManualClock::at_millis(START_MS)),
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The shared clock.
    #[must_use]
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Open the client state over the file, as a fresh process would.
    #[must_use]
    pub fn open(&self) -> ClientState {
        ClientState::new(Arc::new(FileBackend::new(&self.path)), self.clock.clone())
    }

    /// Open a client whose requests go through `transport`.
    #[must_use]
    pub fn client(&self, transport: ScriptedTransport) -> ApiClient<ScriptedTransport> {
        ApiClient::new(transport, self.open())
    }

    /// Overwrite the whole state file.
    pub fn write_file(&self, contents: &str) {
        std::fs::create_dir_all(&self.dir).unwrap();
        std::fs::write(&self.path, contents).unwrap();
    }

    /// The state file decoded as its key/value object.
    #[must_use]
    pub fn read_file(&self) -> Map<String, Value> {
        let contents = std::fs::read_to_string(&self.path).unwrap();
        serde_json::from_str(&contents).unwrap()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Transport answering from a queue of canned bodies.
///
/// Unscripted requests receive `{"ok": true}`.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Value>>,
    sent: Mutex<Vec<Map<String, Value>>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response body.
    #[must_use]
    pub fn then(self, body: Value) -> Self {
        self.responses.lock().unwrap().push_back(body);
        self
    }

    /// Queue a response body through a shared reference.
    pub fn push(&self, body: Value) {
        self.responses.lock().unwrap().push_back(body);
    }

    /// Every payload sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Map<String, Value>> {
        self.sent.lock().unwrap().clone()
    }

    /// Actions of every payload sent so far.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|payload| payload.get("action").and_then(Value::as_str))
            .map(String::from)
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send(
        &self,
        _method: Method,
        payload: &Map<String, Value>,
    ) -> Result<ApiResponse, ApiError> {
        self.sent.lock().unwrap().push(payload.clone());
        let body = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| serde_json::json!({ "ok": true }));
        Ok(serde_json::from_value(body)?)
    }
}
