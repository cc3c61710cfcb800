use crate::clients::deluge::api::DelugeApi;
use crate::clients::deluge::item::DelugeItem;
use crate::clients::service::{DownloadService, ServiceContext};
use crate::core::config::{ClientKind, DownloadClientConfig};
use crate::core::error::ClientError;
use crate::models::torrent::{TorrentFile, TorrentItem};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct DelugeService {
    name: String,
    api: DelugeApi,
    ctx: Arc<ServiceContext>,
}

impl DelugeService {
    pub fn new(config: &DownloadClientConfig, ctx: Arc<ServiceContext>) -> Result<Self> {
        let api = DelugeApi::new(
            config.base_url()?,
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

/// Full priority list with the given indexes switched to skip
pub fn skip_priorities(current: &[u8], file_count: usize, indexes: &[usize]) -> Vec<u8> {
    let mut priorities = current.to_vec();
    if priorities.len() < file_count {
        priorities.resize(file_count, 1);
    }
    for &index in indexes {
        if let Some(priority) = priorities.get_mut(index) {
            *priority = 0;
        }
    }
    priorities
}

#[async_trait]
impl DownloadService for DelugeService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ClientKind {
        ClientKind::Deluge
    }

    fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<Box<dyn TorrentItem>>, ClientError> {
        let status = self.api.torrent(hash).await?;
        Ok(status.map(|status| Box::new(DelugeItem::new(status)) as Box<dyn TorrentItem>))
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentFile>, ClientError> {
        let torrent = self.api.files(hash).await?;

        Ok(torrent
            .files
            .iter()
            .map(|file| TorrentFile {
                index: file.index,
                name: file.path.clone(),
                size: file.size,
                wanted: torrent
                    .file_priorities
                    .get(file.index)
                    .map_or(true, |priority| *priority != 0),
            })
            .collect())
    }

    async fn get_all_torrents(&self) -> Result<Vec<Box<dyn TorrentItem>>, ClientError> {
        let torrents = self.api.torrents().await?;
        debug!(client = %self.name, count = torrents.len(), "Fetched torrents");

        Ok(torrents
            .into_iter()
            .map(|status| Box::new(DelugeItem::new(status)) as Box<dyn TorrentItem>)
            .collect())
    }

    async fn set_files_unwanted(&self, hash: &str, indexes: &[usize]) -> Result<(), ClientError> {
        if indexes.is_empty() {
            return Ok(());
        }

        let torrent = self.api.files(hash).await?;
        let priorities = skip_priorities(&torrent.file_priorities, torrent.files.len(), indexes);
        self.api.set_file_priorities(hash, &priorities).await
    }

    async fn delete_download(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
        self.api.remove(hash, delete_files).await
    }

    async fn change_category(&self, item: &dyn TorrentItem, category: &str, _use_tag: bool) -> Result<(), ClientError> {
        // Label plugin only accepts lowercase names
        let label = category.to_lowercase();

        let labels = self.api.labels().await?;
        if !labels.iter().any(|existing| existing == &label) {
            debug!(client = %self.name, label = %label, "Creating label");
            self.api.add_label(&label).await?;
        }

        self.api.set_label(item.hash(), &label).await
    }
}
