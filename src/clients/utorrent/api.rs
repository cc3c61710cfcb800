//! µTorrent Web UI client.
//!
//! Every call needs a token scraped from `token.html` plus the session
//! cookie handed out alongside it.

use crate::core::error::ClientError;
use crate::utils::retry::RetryPolicy;
use regex::Regex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

static TOKEN_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"<div[^>]*id=['"]token['"][^>]*>([^<]+)</div>"#));

/// One torrent from `list=1`, decoded from its positional row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentRow {
    pub hash: String,
    /// Bitfield: 1 started, 2 checking, 16 error, 32 paused, 64 queued
    pub status: u32,
    pub name: String,
    pub size: u64,
    /// Per mille
    pub progress: u32,
    pub downloaded: u64,
    pub uploaded: u64,
    /// Per mille
    pub ratio: u32,
    pub upload_speed: u64,
    pub download_speed: u64,
    pub eta: i64,
    pub label: String,
    /// Unix seconds, 0 while incomplete
    pub completed_on: i64,
    pub save_path: String,
}

impl TorrentRow {
    pub fn from_row(row: &[Value]) -> Option<Self> {
        let text = |index: usize| row.get(index).and_then(Value::as_str).unwrap_or_default().to_string();
        let number = |index: usize| row.get(index).and_then(Value::as_i64).unwrap_or_default();

        let hash = row.first()?.as_str()?.to_string();

        Some(Self {
            hash,
            status: number(1).max(0) as u32,
            name: text(2),
            size: number(3).max(0) as u64,
            progress: number(4).max(0) as u32,
            downloaded: number(5).max(0) as u64,
            uploaded: number(6).max(0) as u64,
            ratio: number(7).max(0) as u32,
            upload_speed: number(8).max(0) as u64,
            download_speed: number(9).max(0) as u64,
            eta: number(10),
            label: text(11),
            completed_on: number(24),
            save_path: text(26),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub name: String,
    pub size: u64,
    /// 0 = skip
    pub priority: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TorrentProps {
    #[serde(default)]
    pub trackers: String,
    /// -1 when peer exchange is disabled, which µTorrent does for private torrents
    #[serde(default)]
    pub pex: i64,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    torrents: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    /// `[hash, [[name, size, downloaded, priority], ...]]`
    #[serde(default)]
    files: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PropsResponse {
    #[serde(default)]
    props: Vec<TorrentProps>,
}

pub struct UTorrentApi {
    client: reqwest::Client,
    gui: Url,
    username: String,
    password: String,
    retry: RetryPolicy,
    token: RwLock<Option<String>>,
}

impl UTorrentApi {
    pub fn new(
        base: Url,
        username: String,
        password: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        let gui = base
            .join("gui/")
            .map_err(|e| ClientError::MalformedResponse(format!("invalid gui url: {e}")))?;

        Ok(Self {
            client,
            gui,
            username,
            password,
            retry,
            token: RwLock::new(None),
        })
    }

    pub fn gui_url(&self) -> &Url {
        &self.gui
    }

    async fn fetch_token(&self) -> Result<String, ClientError> {
        let url = self
            .gui
            .join("token.html")
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(ClientError::Authentication("credentials rejected".to_string()))
            }
            status if !status.is_success() => {
                return Err(ClientError::UnexpectedStatus {
                    endpoint: "token.html".to_string(),
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let body = response.text().await?;
        let token = parse_token(&body)
            .ok_or_else(|| ClientError::MalformedResponse("token not found in token.html".to_string()))?;

        debug!(gui = %self.gui, "Fetched µTorrent token");
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.fetch_token().await
    }

    async fn send_once(&self, params: &[(&str, String)]) -> Result<Value, ClientError> {
        for attempt in 0..2 {
            let token = self.token().await?;
            let response = self
                .client
                .get(self.gui.clone())
                .basic_auth(&self.username, Some(&self.password))
                .query(&[("token", token.as_str())])
                .query(params)
                .send()
                .await?;

            match response.status() {
                // Stale token
                StatusCode::BAD_REQUEST if attempt == 0 => {
                    *self.token.write().await = None;
                    continue;
                }
                StatusCode::UNAUTHORIZED => {
                    return Err(ClientError::Authentication("credentials rejected".to_string()));
                }
                status if !status.is_success() => {
                    return Err(ClientError::UnexpectedStatus {
                        endpoint: action_name(params),
                        status: status.as_u16(),
                    });
                }
                _ => return Ok(response.json::<Value>().await?),
            }
        }

        Err(ClientError::Authentication("token rejected".to_string()))
    }

    async fn send<T: DeserializeOwned>(&self, params: Vec<(&str, String)>) -> Result<T, ClientError> {
        let operation = action_name(&params);
        let value = self
            .retry
            .run(&operation, || self.send_once(&params))
            .await?;

        serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse(format!("{operation}: {e}")))
    }

    async fn action(&self, params: Vec<(&str, String)>) -> Result<(), ClientError> {
        self.send::<Value>(params).await.map(|_| ())
    }

    pub async fn torrents(&self) -> Result<Vec<TorrentRow>, ClientError> {
        let list: ListResponse = self.send(vec![("list", "1".to_string())]).await?;
        Ok(list
            .torrents
            .iter()
            .filter_map(|row| TorrentRow::from_row(row))
            .collect())
    }

    pub async fn files(&self, hash: &str) -> Result<Vec<FileRow>, ClientError> {
        let response: FilesResponse = self
            .send(vec![("action", "getfiles".to_string()), ("hash", hash.to_ascii_uppercase())])
            .await?;

        let rows = response
            .files
            .get(1)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(rows
            .iter()
            .filter_map(Value::as_array)
            .map(|row| FileRow {
                name: row.first().and_then(Value::as_str).unwrap_or_default().to_string(),
                size: row.get(1).and_then(Value::as_u64).unwrap_or_default(),
                priority: row.get(3).and_then(Value::as_u64).unwrap_or(2) as u8,
            })
            .collect())
    }

    pub async fn props(&self, hash: &str) -> Result<TorrentProps, ClientError> {
        let response: PropsResponse = self
            .send(vec![("action", "getprops".to_string()), ("hash", hash.to_ascii_uppercase())])
            .await?;
        Ok(response.props.into_iter().next().unwrap_or_default())
    }

    pub async fn set_priority(&self, hash: &str, indexes: &[usize], priority: u8) -> Result<(), ClientError> {
        let mut params = vec![
            ("action", "setprio".to_string()),
            ("hash", hash.to_ascii_uppercase()),
            ("p", priority.to_string()),
        ];
        params.extend(indexes.iter().map(|index| ("f", index.to_string())));
        self.action(params).await
    }

    pub async fn remove(&self, hash: &str, delete_data: bool) -> Result<(), ClientError> {
        let action = if delete_data { "removedata" } else { "remove" };
        self.action(vec![("action", action.to_string()), ("hash", hash.to_ascii_uppercase())])
            .await
    }

    pub async fn set_label(&self, hash: &str, label: &str) -> Result<(), ClientError> {
        self.action(vec![
            ("action", "setprops".to_string()),
            ("hash", hash.to_ascii_uppercase()),
            ("s", "label".to_string()),
            ("v", label.to_string()),
        ])
        .await
    }
}

fn action_name(params: &[(&str, String)]) -> String {
    params
        .iter()
        .find(|(key, _)| *key == "action")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "list".to_string())
}

pub fn parse_token(html: &str) -> Option<String> {
    let regex = TOKEN_RE.as_ref().ok()?;
    regex
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().trim().to_string())
}
