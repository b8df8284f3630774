// Push-channel registry for list-changed notifications.

use std::collections::BTreeMap;
use std::sync::Arc;

use focal_common::protocol::jsonrpc::Notification;
use focal_common::protocol::mcp_methods::LIST_CHANGED_NOTIFICATIONS;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

pub type ChannelId = u64;
pub type ChannelSender = mpsc::UnboundedSender<Notification>;

/// Set of connected push channels. Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Mutex<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: ChannelId,
    channels: BTreeMap<ChannelId, ChannelSender>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, sender: ChannelSender) -> ChannelId {
        let mut registry = self.registry.lock().await;
        let id = registry.next_id;
        registry.next_id += 1;
        registry.channels.insert(id, sender);
        info!(channel_id = id, clients = registry.channels.len(), "push channel connected");
        id
    }

    /// Returns `false` if the channel was already gone.
    pub async fn unregister(&self, id: ChannelId) -> bool {
        let mut registry = self.registry.lock().await;
        let removed = registry.channels.remove(&id).is_some();
        if removed {
            info!(channel_id = id, clients = registry.channels.len(), "push channel disconnected");
        }
        removed
    }

    pub async fn channel_count(&self) -> usize {
        self.registry.lock().await.channels.len()
    }

    /// Tell every channel that prompts and resources should be re-fetched.
    pub async fn broadcast_list_changed(&self) {
        for method in LIST_CHANGED_NOTIFICATIONS {
            self.broadcast(method).await;
        }
    }

    /// Send one notification to every channel; returns how many accepted it.
    /// Channels whose send fails are dropped from the registry.
    pub async fn broadcast(&self, method: &str) -> usize {
        let recipients: Vec<(ChannelId, ChannelSender)> = {
            let registry = self.registry.lock().await;
            registry.channels.iter().map(|(id, sender)| (*id, sender.clone())).collect()
        };
        info!(method, clients = recipients.len(), "broadcasting notification");

        let notification = Notification::new(method);
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in recipients {
            if sender.send(notification.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(channel_id = id, method, "push channel closed during broadcast");
                dead.push(id);
            }
        }

        for id in dead {
            self.unregister(id).await;
        }
        delivered
    }
}
