use crate::models::strike::{DeleteReason, StrikeKind};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    StrikeIssued {
        hash: String,
        name: String,
        kind: StrikeKind,
        count: u32,
        max_strikes: u32,
    },
    RecurringOffender {
        hash: String,
        name: String,
        kind: StrikeKind,
        count: u32,
    },
    QueueItemDeleted {
        instance: String,
        download_id: String,
        title: String,
        reason: DeleteReason,
        delete_from_client: bool,
        dry_run: bool,
    },
    DownloadCleaned {
        client: String,
        hash: String,
        name: String,
        category: String,
        reason: CleanReason,
        dry_run: bool,
    },
    CategoryChanged {
        client: String,
        hash: String,
        name: String,
        from: String,
        to: String,
        is_tag: bool,
        dry_run: bool,
    },
    FilesBlocked {
        client: String,
        hash: String,
        name: String,
        files: usize,
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanReason {
    MaxRatioReached,
    MaxSeedTimeReached,
}

impl CleanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanReason::MaxRatioReached => "max ratio reached",
            CleanReason::MaxSeedTimeReached => "max seed time reached",
        }
    }
}

/// Fire-and-forget event sink.
///
/// Events are logged and broadcast to whoever subscribed (notification
/// delivery, UI push); having no subscribers is fine.
pub struct EventPublisher {
    sender: broadcast::Sender<Event>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) {
        log_event(&event);
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

fn log_event(event: &Event) {
    match event {
        Event::StrikeIssued { hash, name, kind, count, max_strikes } => {
            info!(
                hash = %hash,
                name = %name,
                strike_kind = %kind,
                count = count,
                max_strikes = max_strikes,
                "Strike issued"
            );
        }
        Event::RecurringOffender { hash, name, kind, count } => {
            warn!(
                hash = %hash,
                name = %name,
                strike_kind = %kind,
                count = count,
                "Item keeps collecting strikes after reaching the limit, removal is not taking effect"
            );
        }
        Event::QueueItemDeleted { instance, download_id, title, reason, delete_from_client, dry_run } => {
            info!(
                instance = %instance,
                download_id = %download_id,
                title = %title,
                reason = %reason,
                delete_from_client = delete_from_client,
                dry_run = dry_run,
                "Queue item removed"
            );
        }
        Event::DownloadCleaned { client, hash, name, category, reason, dry_run } => {
            info!(
                client = %client,
                hash = %hash,
                name = %name,
                category = %category,
                reason = reason.as_str(),
                dry_run = dry_run,
                "Download cleaned"
            );
        }
        Event::CategoryChanged { client, hash, name, from, to, is_tag, dry_run } => {
            info!(
                client = %client,
                hash = %hash,
                name = %name,
                from = %from,
                to = %to,
                is_tag = is_tag,
                dry_run = dry_run,
                "Category changed"
            );
        }
        Event::FilesBlocked { client, hash, name, files, dry_run } => {
            info!(
                client = %client,
                hash = %hash,
                name = %name,
                files = files,
                dry_run = dry_run,
                "Unwanted files blocked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::new(4);
        publisher.publish(Event::StrikeIssued {
            hash: "a".to_string(),
            name: "n".to_string(),
            kind: StrikeKind::Stalled,
            count: 1,
            max_strikes: 3,
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let publisher = EventPublisher::new(4);
        let mut rx = publisher.subscribe();

        publisher.publish(Event::RecurringOffender {
            hash: "a".to_string(),
            name: "n".to_string(),
            kind: StrikeKind::SlowSpeed,
            count: 4,
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::RecurringOffender { count: 4, .. }));
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::DownloadCleaned {
            client: "qbit".to_string(),
            hash: "abc".to_string(),
            name: "Movie".to_string(),
            category: "movies".to_string(),
            reason: CleanReason::MaxRatioReached,
            dry_run: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "download_cleaned");
        assert_eq!(json["reason"], "max_ratio_reached");
    }
}
