//! Transmission JSON-RPC client.

use crate::core::error::ClientError;
use crate::utils::retry::RetryPolicy;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Fields requested for every torrent-get
pub const TORRENT_FIELDS: &[&str] = &[
    "hashString",
    "name",
    "isPrivate",
    "trackers",
    "totalSize",
    "sizeWhenDone",
    "percentDone",
    "downloadedEver",
    "uploadedEver",
    "rateDownload",
    "rateUpload",
    "uploadRatio",
    "eta",
    "secondsSeeding",
    "downloadDir",
    "labels",
    "status",
    "metadataPercentComplete",
    "error",
];

const FILE_FIELDS: &[&str] = &["hashString", "files", "fileStats"];

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerEntry {
    pub announce: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentInfo {
    pub hash_string: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub trackers: Vec<TrackerEntry>,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub size_when_done: u64,
    /// 0.0..=1.0
    #[serde(default)]
    pub percent_done: f64,
    #[serde(default)]
    pub downloaded_ever: u64,
    #[serde(default)]
    pub uploaded_ever: u64,
    #[serde(default)]
    pub rate_download: u64,
    #[serde(default)]
    pub rate_upload: u64,
    /// Negative when not applicable
    #[serde(default)]
    pub upload_ratio: f64,
    /// -1 not available, -2 unknown
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub seconds_seeding: i64,
    #[serde(default)]
    pub download_dir: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// 0 stopped, 1 check wait, 2 checking, 3 download wait, 4 downloading,
    /// 5 seed wait, 6 seeding
    #[serde(default)]
    pub status: u8,
    #[serde(default = "metadata_complete")]
    pub metadata_percent_complete: f64,
}

fn metadata_complete() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub length: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileStat {
    #[serde(default = "wanted_default")]
    pub wanted: bool,
}

fn wanted_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentFiles {
    pub hash_string: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub file_stats: Vec<FileStat>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TorrentList<T> {
    #[serde(default = "Vec::new")]
    torrents: Vec<T>,
}

pub struct TransmissionApi {
    client: reqwest::Client,
    endpoint: Url,
    username: String,
    password: String,
    retry: RetryPolicy,
    session_id: RwLock<Option<String>>,
}

impl TransmissionApi {
    pub fn new(
        base: Url,
        username: String,
        password: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = base
            .join("transmission/rpc")
            .map_err(|e| ClientError::MalformedResponse(format!("invalid rpc url: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            username,
            password,
            retry,
            session_id: RwLock::new(None),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// One RPC round trip, renegotiating the session id on 409
    async fn call_once(&self, payload: &Value) -> Result<Value, ClientError> {
        for _ in 0..2 {
            let mut request = self.client.post(self.endpoint.clone()).json(payload);
            if let Some(id) = self.session_id.read().await.as_deref() {
                request = request.header(SESSION_HEADER, id);
            }
            if !self.username.is_empty() {
                request = request.basic_auth(&self.username, Some(&self.password));
            }

            let response = request.send().await?;
            match response.status() {
                StatusCode::CONFLICT => {
                    let id = response
                        .headers()
                        .get(SESSION_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    debug!(endpoint = %self.endpoint, "Transmission session id refreshed");
                    *self.session_id.write().await = id;
                    continue;
                }
                StatusCode::UNAUTHORIZED => {
                    return Err(ClientError::Authentication("credentials rejected".to_string()));
                }
                status if !status.is_success() => {
                    return Err(ClientError::UnexpectedStatus {
                        endpoint: self.endpoint.to_string(),
                        status: status.as_u16(),
                    });
                }
                _ => {}
            }

            let body: RpcResponse = response.json().await?;
            if body.result != "success" {
                return Err(ClientError::Rpc(body.result));
            }
            return Ok(body.arguments);
        }

        Err(ClientError::Authentication("failed negotiating session id".to_string()))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, arguments: Value) -> Result<T, ClientError> {
        let payload = json!({ "method": method, "arguments": arguments });
        let value = self
            .retry
            .run(method, || self.call_once(&payload))
            .await?;

        serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse(format!("{method}: {e}")))
    }

    async fn call_unit(&self, method: &str, arguments: Value) -> Result<(), ClientError> {
        let payload = json!({ "method": method, "arguments": arguments });
        self.retry
            .run(method, || self.call_once(&payload))
            .await
            .map(|_| ())
    }

    pub async fn torrents(&self, hash: Option<&str>) -> Result<Vec<TorrentInfo>, ClientError> {
        let mut arguments = json!({ "fields": TORRENT_FIELDS });
        if let Some(hash) = hash {
            arguments["ids"] = json!([hash]);
        }
        let list: TorrentList<TorrentInfo> = self.call("torrent-get", arguments).await?;
        Ok(list.torrents)
    }

    pub async fn files(&self, hash: &str) -> Result<Option<TorrentFiles>, ClientError> {
        let list: TorrentList<TorrentFiles> = self
            .call("torrent-get", json!({ "fields": FILE_FIELDS, "ids": [hash] }))
            .await?;
        Ok(list.torrents.into_iter().next())
    }

    pub async fn set_files_unwanted(&self, hash: &str, indexes: &[usize]) -> Result<(), ClientError> {
        self.call_unit("torrent-set", json!({ "ids": [hash], "files-unwanted": indexes }))
            .await
    }

    pub async fn remove(&self, hash: &str, delete_local_data: bool) -> Result<(), ClientError> {
        self.call_unit(
            "torrent-remove",
            json!({ "ids": [hash], "delete-local-data": delete_local_data }),
        )
        .await
    }

    pub async fn set_location(&self, hash: &str, location: &str) -> Result<(), ClientError> {
        self.call_unit(
            "torrent-set-location",
            json!({ "ids": [hash], "location": location, "move": true }),
        )
        .await
    }

    pub async fn set_labels(&self, hash: &str, labels: &[String]) -> Result<(), ClientError> {
        self.call_unit("torrent-set", json!({ "ids": [hash], "labels": labels }))
            .await
    }
}
