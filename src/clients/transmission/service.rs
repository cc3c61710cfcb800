use crate::clients::service::{DownloadService, ServiceContext};
use crate::clients::transmission::api::TransmissionApi;
use crate::clients::transmission::item::TransmissionItem;
use crate::core::config::{ClientKind, DownloadClientConfig};
use crate::core::error::ClientError;
use crate::models::torrent::{TorrentFile, TorrentItem};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct TransmissionService {
    name: String,
    api: TransmissionApi,
    ctx: Arc<ServiceContext>,
}

impl TransmissionService {
    pub fn new(config: &DownloadClientConfig, ctx: Arc<ServiceContext>) -> Result<Self> {
        let api = TransmissionApi::new(
            config.base_url()?,
            config.username.clone(),
            config.password.clone(),
            ctx.http_timeout,
            ctx.retry.clone(),
        )?;

        Ok(Self {
            name: config.name.clone(),
            api,
            ctx,
        })
    }
}

/// Sibling directory of the current download dir named after the category
pub fn category_location(download_dir: &str, category: &str) -> String {
    let parent = Path::new(download_dir).parent().unwrap_or_else(|| Path::new("/"));
    parent.join(category).to_string_lossy().into_owned()
}

#[async_trait]
impl DownloadService for TransmissionService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ClientKind {
        ClientKind::Transmission
    }

    fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    fn supports_tags(&self) -> bool {
        true
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<Box<dyn TorrentItem>>, ClientError> {
        let torrents = self.api.torrents(Some(hash)).await?;
        Ok(torrents
            .into_iter()
            .next()
            .map(|info| Box::new(TransmissionItem::new(info)) as Box<dyn TorrentItem>))
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentFile>, ClientError> {
        let Some(torrent) = self.api.files(hash).await? else {
            return Ok(Vec::new());
        };

        Ok(torrent
            .files
            .into_iter()
            .enumerate()
            .map(|(index, file)| TorrentFile {
                index,
                name: file.name,
                size: file.length,
                wanted: torrent.file_stats.get(index).map_or(true, |stat| stat.wanted),
            })
            .collect())
    }

    async fn get_all_torrents(&self) -> Result<Vec<Box<dyn TorrentItem>>, ClientError> {
        let torrents = self.api.torrents(None).await?;
        debug!(client = %self.name, count = torrents.len(), "Fetched torrents");

        Ok(torrents
            .into_iter()
            .map(|info| Box::new(TransmissionItem::new(info)) as Box<dyn TorrentItem>)
            .collect())
    }

    async fn set_files_unwanted(&self, hash: &str, indexes: &[usize]) -> Result<(), ClientError> {
        if indexes.is_empty() {
            return Ok(());
        }
        self.api.set_files_unwanted(hash, indexes).await
    }

    async fn delete_download(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
        self.api.remove(hash, delete_files).await
    }

    async fn change_category(&self, item: &dyn TorrentItem, category: &str, use_tag: bool) -> Result<(), ClientError> {
        if use_tag {
            let mut labels = item.tags().to_vec();
            if !labels.iter().any(|label| label.eq_ignore_ascii_case(category)) {
                labels.push(category.to_string());
            }
            return self.api.set_labels(item.hash(), &labels).await;
        }

        let Some(download_dir) = item.save_path() else {
            return Err(ClientError::MalformedResponse(format!(
                "torrent {} has no download dir",
                item.hash()
            )));
        };

        let location = category_location(download_dir, category);
        debug!(client = %self.name, hash = %item.hash(), location = %location, "Moving download");
        self.api.set_location(item.hash(), &location).await
    }
}
