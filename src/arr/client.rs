use crate::core::config::{ArrInstanceConfig, ArrKind};
use crate::core::error::ArrError;
use crate::utils::retry::RetryPolicy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const PAGE_SIZE: u32 = 200;
const MAX_PAGES: u32 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// One row of an arr download queue
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub download_id: Option<String>,
    /// `torrent` or `usenet`
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub status: String,
    /// `ok`, `warning` or `error`
    #[serde(default)]
    pub tracked_download_status: String,
    /// `downloading`, `importPending`, `importBlocked`, `importFailed` ...
    #[serde(default)]
    pub tracked_download_state: String,
    #[serde(default)]
    pub status_messages: Vec<StatusMessage>,
    #[serde(default)]
    pub download_client: Option<String>,
}

impl QueueRecord {
    pub fn is_torrent(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("torrent")
    }

    /// Download id when present and non-blank
    pub fn download_id(&self) -> Option<&str> {
        self.download_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueuePage {
    #[serde(default)]
    total_records: u64,
    #[serde(default)]
    records: Vec<QueueRecord>,
}

/// All queue rows sharing one download id
#[derive(Debug, Clone)]
pub struct QueueGroup {
    /// Lowercase
    pub download_id: String,
    pub records: Vec<QueueRecord>,
}

impl QueueGroup {
    pub fn first(&self) -> &QueueRecord {
        &self.records[0]
    }

    pub fn title(&self) -> &str {
        &self.first().title
    }

    pub fn is_torrent(&self) -> bool {
        self.records.iter().any(QueueRecord::is_torrent)
    }
}

/// Group records by download id, dropping rows without one. Order follows
/// the first appearance of each id.
pub fn group_by_download_id(records: Vec<QueueRecord>) -> Vec<QueueGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<QueueRecord>> = BTreeMap::new();

    for record in records {
        let Some(id) = record.download_id().map(str::to_ascii_lowercase) else {
            debug!(record_id = record.id, title = %record.title, "Skipping queue record without download id");
            continue;
        };

        let entry = groups.entry(id.clone()).or_default();
        if entry.is_empty() {
            order.push(id);
        }
        entry.push(record);
    }

    order
        .into_iter()
        .filter_map(|id| {
            groups.remove(&id).map(|records| QueueGroup {
                download_id: id,
                records,
            })
        })
        .collect()
}

/// Options for removing a queue item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeleteOptions {
    pub remove_from_client: bool,
    pub blocklist: bool,
    pub skip_redownload: bool,
}

/// REST client for one arr instance
pub struct ArrClient {
    name: String,
    kind: ArrKind,
    client: reqwest::Client,
    base: Url,
    api_key: String,
    retry: RetryPolicy,
}

impl ArrClient {
    pub fn new(config: &ArrInstanceConfig, timeout: Duration, retry: RetryPolicy) -> Result<Self, ArrError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut base = Url::parse(config.url.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let base = base.join(&format!("api/{}/", config.kind.api_version()))?;

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            client,
            base,
            api_key: config.api_key.clone(),
            retry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArrKind {
        self.kind
    }

    fn url(&self, path: &str) -> Result<Url, ArrError> {
        Ok(self.base.join(path)?)
    }

    async fn fetch_page(&self, page: u32) -> Result<QueuePage, ArrError> {
        let url = self.url("queue")?;
        let page = page.to_string();
        let page_size = PAGE_SIZE.to_string();

        self.retry
            .run("arr_queue", || async {
                let response = self
                    .client
                    .get(url.clone())
                    .header("X-Api-Key", &self.api_key)
                    .query(&[
                        ("page", page.as_str()),
                        ("pageSize", page_size.as_str()),
                        ("includeUnknownSeriesItems", "true"),
                        ("includeUnknownMovieItems", "true"),
                    ])
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(ArrError::UnexpectedStatus {
                        endpoint: "queue".to_string(),
                        status: response.status().as_u16(),
                    });
                }

                Ok::<QueuePage, ArrError>(response.json::<QueuePage>().await?)
            })
            .await
    }

    /// Every queue record, fetching pages until `totalRecords` are read
    pub async fn list_queue(&self) -> Result<Vec<QueueRecord>, ArrError> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let data = self.fetch_page(page).await?;
            let empty = data.records.is_empty();
            records.extend(data.records);

            if empty || records.len() as u64 >= data.total_records {
                break;
            }

            page += 1;
            if page > MAX_PAGES {
                return Err(ArrError::TooManyPages(MAX_PAGES));
            }
        }

        debug!(instance = %self.name, count = records.len(), "Fetched arr queue");
        Ok(records)
    }

    pub async fn delete_queue_item(&self, record_id: i64, options: DeleteOptions) -> Result<(), ArrError> {
        let url = self.url(&format!("queue/{record_id}"))?;
        let remove = options.remove_from_client.to_string();
        let blocklist = options.blocklist.to_string();
        let skip = options.skip_redownload.to_string();

        self.retry
            .run("arr_delete_queue_item", || async {
                let response = self
                    .client
                    .delete(url.clone())
                    .header("X-Api-Key", &self.api_key)
                    .query(&[
                        ("removeFromClient", remove.as_str()),
                        ("blocklist", blocklist.as_str()),
                        ("skipRedownload", skip.as_str()),
                    ])
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(ArrError::UnexpectedStatus {
                        endpoint: format!("queue/{record_id}"),
                        status: response.status().as_u16(),
                    });
                }
                Ok::<(), ArrError>(())
            })
            .await
    }
}
