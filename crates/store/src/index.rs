//! Notifications for the downstream search index.
//!
//! Events are published after the transaction that caused them commits. The
//! index is eventually consistent with the catalog, never transactionally.

use crate::item::Item;
use catalog_sites::models::{IdType, ItemCategory, ItemModel};
use tokio::sync::mpsc;
use uuid::Uuid;

/// What the search index needs to know about an Item.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexProjection {
    pub uuid: Uuid,
    pub model: ItemModel,
    pub category: ItemCategory,
    pub title: String,
    pub other_titles: Vec<String>,
    pub primary_id: Option<(IdType, String)>,
    pub parent: Option<Uuid>,
    pub cover: Option<String>,
}
impl From<&Item> for IndexProjection {
    fn from(item: &Item) -> Self {
        Self {
            uuid: item.uuid,
            model: item.model(),
            category: item.category(),
            title: item.title().to_string(),
            other_titles: item.kind.other_titles(),
            primary_id: item.get_primary_id().map(|(id_type, value)| (id_type, value.to_string())),
            parent: item.parent,
            cover: item.cover.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    /// The Item was created or changed and should be (re)indexed.
    Upsert(IndexProjection),
    /// The Item was deleted or merged away and should leave the index.
    Remove(Uuid),
}
impl IndexEvent {
    /// The right event for an Item's current state.
    pub fn for_item(item: &Item) -> Self {
        if item.is_live() { Self::Upsert(IndexProjection::from(item)) } else { Self::Remove(item.uuid) }
    }
}

pub trait IndexSink: Send + Sync {
    fn publish(&self, event: IndexEvent);
}

/// Discards every event.
pub struct NoopIndex;
impl IndexSink for NoopIndex {
    fn publish(&self, _event: IndexEvent) {}
}

/// Queues events on an unbounded channel for an indexing task to drain.
pub struct ChannelIndex {
    sender: mpsc::UnboundedSender<IndexEvent>,
}
impl ChannelIndex {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IndexEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}
impl IndexSink for ChannelIndex {
    fn publish(&self, event: IndexEvent) {
        if self.sender.send(event).is_err() {
            tracing::warn!("Search index receiver has gone away, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemKind, ItemStatus};

    #[test]
    fn test_event_follows_item_state() {
        let mut item = Item::new(ItemKind::empty(ItemModel::Album));
        assert!(matches!(IndexEvent::for_item(&item), IndexEvent::Upsert(p) if p.uuid == item.uuid));
        item.status = ItemStatus::Deleted;
        assert_eq!(IndexEvent::for_item(&item), IndexEvent::Remove(item.uuid));
    }

    #[tokio::test]
    async fn test_channel_index_queues_events() {
        let (index, mut receiver) = ChannelIndex::new();
        let uuid = Uuid::new_v4();
        index.publish(IndexEvent::Remove(uuid));
        assert_eq!(receiver.recv().await, Some(IndexEvent::Remove(uuid)));
        drop(receiver);
        // Publishing into a closed channel is not an error.
        index.publish(IndexEvent::Remove(uuid));
    }
}
