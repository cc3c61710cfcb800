use crate::clients::service::{DownloadService, ServiceContext};
use crate::clients::utorrent::api::{TorrentProps, UTorrentApi};
use crate::clients::utorrent::item::UTorrentItem;
use crate::core::config::{ClientKind, DownloadClientConfig};
use crate::core::error::ClientError;
use crate::models::torrent::{tracker_hosts, TorrentFile, TorrentItem};
use crate::utils::time::current_timestamp;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct UTorrentService {
    name: String,
    api: UTorrentApi,
    ctx: Arc<ServiceContext>,
}

impl UTorrentService {
    pub fn new(config: &DownloadClientConfig, ctx: Arc<ServiceContext>) -> Result<Self> {
        let api = UTorrentApi::new(
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

/// Private flag and tracker hosts from torrent properties
pub fn props_details(props: &TorrentProps) -> (bool, Vec<String>) {
    let trackers = tracker_hosts(props.trackers.lines().map(str::trim).filter(|line| !line.is_empty()));
    (props.pex == -1, trackers)
}

#[async_trait]
impl DownloadService for UTorrentService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ClientKind {
        ClientKind::UTorrent
    }

    fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<Box<dyn TorrentItem>>, ClientError> {
        let Some(row) = self
            .api
            .torrents()
            .await?
            .into_iter()
            .find(|row| row.hash.eq_ignore_ascii_case(hash))
        else {
            return Ok(None);
        };

        let props = self.api.props(&row.hash).await?;
        let (private, trackers) = props_details(&props);

        Ok(Some(Box::new(UTorrentItem::new(
            row,
            private,
            trackers,
            current_timestamp(),
        ))))
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentFile>, ClientError> {
        let files = self.api.files(hash).await?;

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(index, file)| TorrentFile {
                index,
                name: file.name,
                size: file.size,
                wanted: file.priority != 0,
            })
            .collect())
    }

    async fn get_all_torrents(&self) -> Result<Vec<Box<dyn TorrentItem>>, ClientError> {
        let rows = self.api.torrents().await?;
        debug!(client = %self.name, count = rows.len(), "Fetched torrents");

        let now = current_timestamp();
        Ok(rows
            .into_iter()
            .map(|row| Box::new(UTorrentItem::new(row, false, Vec::new(), now)) as Box<dyn TorrentItem>)
            .collect())
    }

    async fn set_files_unwanted(&self, hash: &str, indexes: &[usize]) -> Result<(), ClientError> {
        if indexes.is_empty() {
            return Ok(());
        }
        self.api.set_priority(hash, indexes, 0).await
    }

    async fn delete_download(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
        self.api.remove(hash, delete_files).await
    }

    async fn change_category(&self, item: &dyn TorrentItem, category: &str, _use_tag: bool) -> Result<(), ClientError> {
        self.api.set_label(item.hash(), category).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_details() {
        let props = TorrentProps {
            trackers: "http://tracker.one.org/announce\r\n\r\nudp://tracker.two.org:80\r\n".to_string(),
            pex: -1,
        };
        let (private, trackers) = props_details(&props);

        assert!(private);
        assert_eq!(trackers, vec!["tracker.one.org".to_string(), "tracker.two.org".to_string()]);
    }
}
