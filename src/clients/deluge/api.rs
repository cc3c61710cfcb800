//! Deluge Web UI JSON-RPC client.

use crate::core::error::ClientError;
use crate::utils::retry::RetryPolicy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Deluge error code for an expired or missing session
const NOT_AUTHENTICATED: i64 = 1;

pub const STATUS_KEYS: &[&str] = &[
    "hash",
    "name",
    "private",
    "trackers",
    "total_wanted",
    "total_size",
    "progress",
    "total_done",
    "total_uploaded",
    "download_payload_rate",
    "upload_payload_rate",
    "ratio",
    "eta",
    "seeding_time",
    "label",
    "download_location",
    "state",
];

const FILE_KEYS: &[&str] = &["files", "file_priorities"];

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerEntry {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentStatus {
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub trackers: Vec<TrackerEntry>,
    #[serde(default)]
    pub total_wanted: u64,
    #[serde(default)]
    pub total_size: u64,
    /// Already in percent
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub total_done: u64,
    #[serde(default)]
    pub total_uploaded: u64,
    #[serde(default)]
    pub download_payload_rate: u64,
    #[serde(default)]
    pub upload_payload_rate: u64,
    #[serde(default)]
    pub ratio: f64,
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub seeding_time: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub download_location: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub index: usize,
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TorrentFiles {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// One entry per file index, 0 = skip
    #[serde(default)]
    pub file_priorities: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

pub struct DelugeApi {
    client: reqwest::Client,
    endpoint: Url,
    password: String,
    retry: RetryPolicy,
    next_id: AtomicU64,
    authenticated: AtomicBool,
}

impl DelugeApi {
    pub fn new(base: Url, password: String, timeout: Duration, retry: RetryPolicy) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        let endpoint = base
            .join("json")
            .map_err(|e| ClientError::MalformedResponse(format!("invalid json url: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            password,
            retry,
            next_id: AtomicU64::new(1),
            authenticated: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Raw request without session handling
    async fn request(&self, method: &str, params: &Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "method": method, "params": params, "id": id }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                endpoint: method.to_string(),
                status: status.as_u16(),
            });
        }

        let body: RpcResponse = response.json().await?;
        match body.error {
            Some(error) if error.code == NOT_AUTHENTICATED => {
                Err(ClientError::Authentication(error.message))
            }
            Some(error) => Err(ClientError::Rpc(format!("{method}: {}", error.message))),
            None => Ok(body.result),
        }
    }

    /// Log in to the web UI and make sure it is attached to a daemon
    pub async fn login(&self) -> Result<(), ClientError> {
        let accepted = self.request("auth.login", &json!([self.password])).await?;
        if accepted != Value::Bool(true) {
            return Err(ClientError::Authentication("credentials rejected".to_string()));
        }

        let connected = self.request("web.connected", &json!([])).await?;
        if connected != Value::Bool(true) {
            let hosts = self.request("web.get_hosts", &json!([])).await?;
            let host_id = hosts
                .get(0)
                .and_then(|host| host.get(0))
                .and_then(Value::as_str)
                .ok_or_else(|| ClientError::Rpc("no daemon configured in the web UI".to_string()))?
                .to_string();

            info!(endpoint = %self.endpoint, host_id = %host_id, "Connecting Deluge web UI to daemon");
            self.request("web.connect", &json!([host_id])).await?;
        }

        debug!(endpoint = %self.endpoint, "Logged in to Deluge");
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn call_once(&self, method: &str, params: &Value) -> Result<Value, ClientError> {
        if !self.authenticated.load(Ordering::SeqCst) {
            self.login().await?;
        }

        match self.request(method, params).await {
            Err(ClientError::Authentication(_)) => {
                self.authenticated.store(false, Ordering::SeqCst);
                self.login().await?;
                self.request(method, params).await
            }
            outcome => outcome,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ClientError> {
        let value = self
            .retry
            .run(method, || self.call_once(method, &params))
            .await?;

        serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse(format!("{method}: {e}")))
    }

    pub async fn torrent(&self, hash: &str) -> Result<Option<TorrentStatus>, ClientError> {
        let value: Value = self
            .call("core.get_torrent_status", json!([hash, STATUS_KEYS]))
            .await?;

        // Unknown hashes come back as an empty object
        if value.as_object().map_or(true, Map::is_empty) {
            return Ok(None);
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ClientError::MalformedResponse(format!("core.get_torrent_status: {e}")))
    }

    pub async fn torrents(&self) -> Result<Vec<TorrentStatus>, ClientError> {
        let by_hash: HashMap<String, TorrentStatus> = self
            .call("core.get_torrents_status", json!([{}, STATUS_KEYS]))
            .await?;
        Ok(by_hash.into_values().collect())
    }

    pub async fn files(&self, hash: &str) -> Result<TorrentFiles, ClientError> {
        self.call("core.get_torrent_status", json!([hash, FILE_KEYS]))
            .await
    }

    pub async fn set_file_priorities(&self, hash: &str, priorities: &[u8]) -> Result<(), ClientError> {
        self.call::<Value>(
            "core.set_torrent_options",
            json!([[hash], { "file_priorities": priorities }]),
        )
        .await
        .map(|_| ())
    }

    pub async fn remove(&self, hash: &str, remove_data: bool) -> Result<(), ClientError> {
        self.call::<Value>("core.remove_torrent", json!([hash, remove_data]))
            .await
            .map(|_| ())
    }

    pub async fn labels(&self) -> Result<Vec<String>, ClientError> {
        self.call("label.get_labels", json!([])).await
    }

    pub async fn add_label(&self, label: &str) -> Result<(), ClientError> {
        self.call::<Value>("label.add", json!([label]))
            .await
            .map(|_| ())
    }

    pub async fn set_label(&self, hash: &str, label: &str) -> Result<(), ClientError> {
        self.call::<Value>("label.set_torrent", json!([hash, label]))
            .await
            .map(|_| ())
    }
}
