use crate::clients::qbittorrent::api::QBitApi;
use crate::clients::qbittorrent::item::QBitItem;
use crate::clients::service::{DownloadService, ServiceContext};
use crate::core::config::{ClientKind, DownloadClientConfig};
use crate::core::error::ClientError;
use crate::models::torrent::{tracker_hosts, TorrentFile, TorrentItem};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct QBitService {
    name: String,
    api: QBitApi,
    ctx: Arc<ServiceContext>,
}

impl QBitService {
    pub fn new(config: &DownloadClientConfig, ctx: Arc<ServiceContext>) -> Result<Self> {
        let api = QBitApi::new(
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

#[async_trait]
impl DownloadService for QBitService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ClientKind {
        ClientKind::QBittorrent
    }

    fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    fn supports_tags(&self) -> bool {
        true
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<Box<dyn TorrentItem>>, ClientError> {
        let Some(info) = self.api.torrents(Some(hash)).await?.into_iter().next() else {
            return Ok(None);
        };

        let properties = self.api.properties(hash).await?;
        let trackers = self.api.trackers(hash).await?;
        let hosts = tracker_hosts(trackers.iter().map(|tracker| tracker.url.as_str()));

        Ok(Some(Box::new(QBitItem::new(
            info,
            properties.is_private.unwrap_or(false),
            hosts,
        ))))
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentFile>, ClientError> {
        let files = self.api.files(hash).await?;

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(position, file)| TorrentFile {
                index: file.index.unwrap_or(position),
                name: file.name,
                size: file.size,
                wanted: file.priority != 0,
            })
            .collect())
    }

    async fn get_all_torrents(&self) -> Result<Vec<Box<dyn TorrentItem>>, ClientError> {
        let torrents = self.api.torrents(None).await?;
        debug!(client = %self.name, count = torrents.len(), "Fetched torrents");

        Ok(torrents
            .into_iter()
            .map(|info| {
                let hosts = tracker_hosts(std::iter::once(info.tracker.as_str()));
                Box::new(QBitItem::new(info, false, hosts)) as Box<dyn TorrentItem>
            })
            .collect())
    }

    async fn set_files_unwanted(&self, hash: &str, indexes: &[usize]) -> Result<(), ClientError> {
        if indexes.is_empty() {
            return Ok(());
        }
        self.api.set_file_priority(hash, indexes, 0).await
    }

    async fn delete_download(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
        self.api.delete(hash, delete_files).await
    }

    async fn change_category(&self, item: &dyn TorrentItem, category: &str, use_tag: bool) -> Result<(), ClientError> {
        if use_tag {
            return self.api.add_tags(item.hash(), category).await;
        }

        let categories = self.api.categories().await?;
        if !categories.contains_key(category) {
            debug!(client = %self.name, category, "Creating category");
            self.api.create_category(category).await?;
        }

        self.api.set_category(item.hash(), category).await
    }
}
