//! qBittorrent Web API v2 wire client.

use crate::core::error::ClientError;
use crate::utils::retry::RetryPolicy;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub total_size: u64,
    /// 0.0..=1.0
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub downloaded: u64,
    #[serde(default)]
    pub uploaded: u64,
    #[serde(default)]
    pub dlspeed: u64,
    #[serde(default)]
    pub upspeed: u64,
    #[serde(default)]
    pub ratio: f64,
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub seeding_time: i64,
    #[serde(default)]
    pub category: String,
    /// Comma separated
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub save_path: String,
    /// Currently working tracker, empty when none
    #[serde(default)]
    pub tracker: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TorrentProperties {
    /// Only reported by newer versions
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerInfo {
    pub url: String,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub index: Option<usize>,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    /// 0 = do not download
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInfo {
    pub name: String,
    #[serde(default, rename = "savePath")]
    pub save_path: String,
}

pub struct QBitApi {
    client: reqwest::Client,
    base: Url,
    username: String,
    password: String,
    retry: RetryPolicy,
    authenticated: AtomicBool,
}

impl QBitApi {
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

        Ok(Self {
            client,
            base,
            username,
            password,
            retry,
            authenticated: AtomicBool::new(false),
        })
    }

    fn url(&self, endpoint: &str) -> Result<Url, ClientError> {
        self.base
            .join("api/v2/")
            .and_then(|api| api.join(endpoint))
            .map_err(|e| ClientError::MalformedResponse(format!("invalid endpoint {endpoint}: {e}")))
    }

    pub async fn login(&self) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("auth/login")?)
            .form(&[("username", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Authentication(format!("login returned HTTP {status}")));
        }

        let body = response.text().await?;
        if body.trim().eq_ignore_ascii_case("fails.") {
            return Err(ClientError::Authentication("credentials rejected".to_string()));
        }

        debug!(base = %self.base, "Logged in to qBittorrent");
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Send with a session, logging in again once when the cookie expired
    async fn send<F>(&self, endpoint: &str, build: F) -> Result<Response, ClientError>
    where
        F: Fn(Url) -> RequestBuilder + Send + Sync,
    {
        if !self.authenticated.load(Ordering::SeqCst) {
            self.login().await?;
        }

        let mut response = build(self.url(endpoint)?).send().await?;

        if response.status() == StatusCode::FORBIDDEN {
            self.authenticated.store(false, Ordering::SeqCst);
            self.login().await?;
            response = build(self.url(endpoint)?).send().await?;
        }

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }

    async fn get<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        self.retry
            .run(endpoint, || async {
                let response = self
                    .send(endpoint, |url| self.client.get(url).query(query))
                    .await?;
                Ok::<T, ClientError>(response.json::<T>().await?)
            })
            .await
    }

    async fn post(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<(), ClientError> {
        self.retry
            .run(endpoint, || async {
                self.send(endpoint, |url| self.client.post(url).form(form))
                    .await
                    .map(|_| ())
            })
            .await
    }

    pub async fn torrents(&self, hashes: Option<&str>) -> Result<Vec<TorrentInfo>, ClientError> {
        match hashes {
            Some(hashes) => self.get("torrents/info", &[("hashes", hashes)]).await,
            None => self.get("torrents/info", &[]).await,
        }
    }

    pub async fn properties(&self, hash: &str) -> Result<TorrentProperties, ClientError> {
        self.get("torrents/properties", &[("hash", hash)]).await
    }

    pub async fn trackers(&self, hash: &str) -> Result<Vec<TrackerInfo>, ClientError> {
        self.get("torrents/trackers", &[("hash", hash)]).await
    }

    pub async fn files(&self, hash: &str) -> Result<Vec<FileInfo>, ClientError> {
        self.get("torrents/files", &[("hash", hash)]).await
    }

    pub async fn set_file_priority(&self, hash: &str, ids: &[usize], priority: u8) -> Result<(), ClientError> {
        let ids = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join("|");
        let priority = priority.to_string();
        self.post(
            "torrents/filePrio",
            &[("hash", hash), ("id", ids.as_str()), ("priority", priority.as_str())],
        )
        .await
    }

    pub async fn delete(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
        let delete_files = if delete_files { "true" } else { "false" };
        self.post("torrents/delete", &[("hashes", hash), ("deleteFiles", delete_files)])
            .await
    }

    pub async fn categories(&self) -> Result<HashMap<String, CategoryInfo>, ClientError> {
        self.get("torrents/categories", &[]).await
    }

    pub async fn create_category(&self, name: &str) -> Result<(), ClientError> {
        self.post("torrents/createCategory", &[("category", name), ("savePath", "")])
            .await
    }

    pub async fn set_category(&self, hash: &str, category: &str) -> Result<(), ClientError> {
        self.post("torrents/setCategory", &[("hashes", hash), ("category", category)])
            .await
    }

    pub async fn add_tags(&self, hash: &str, tags: &str) -> Result<(), ClientError> {
        self.post("torrents/addTags", &[("hashes", hash), ("tags", tags)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_api_prefix() {
        let api = QBitApi::new(
            Url::parse("http://localhost:8080/qbit/").unwrap(),
            "admin".to_string(),
            "secret".to_string(),
            Duration::from_secs(5),
            RetryPolicy::immediate(0),
        )
        .unwrap();

        assert_eq!(
            api.url("torrents/info").unwrap().as_str(),
            "http://localhost:8080/qbit/api/v2/torrents/info"
        );
    }

    #[test]
    fn test_torrent_info_deserialization() {
        let json = r#"[{
            "hash": "8c212779b4abde7c6bc608063a0d008b7e40ce32",
            "name": "Some.Show.S01E01",
            "state": "stalledDL",
            "size": 1000,
            "progress": 0.25,
            "downloaded": 250,
            "dlspeed": 0,
            "eta": 8640000,
            "category": "tv",
            "tags": "a, b",
            "save_path": "/downloads/tv",
            "unknown_field": 1
        }]"#;

        let torrents: Vec<TorrentInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(torrents[0].state, "stalledDL");
        assert_eq!(torrents[0].progress, 0.25);
        assert_eq!(torrents[0].tracker, "");
    }

    #[test]
    fn test_file_info_without_index() {
        let files: Vec<FileInfo> =
            serde_json::from_str(r#"[{"name": "a/b.mkv", "size": 10, "priority": 0}]"#).unwrap();
        assert_eq!(files[0].index, None);
        assert_eq!(files[0].priority, 0);
    }
}
