//! Coalescing of entity events into batches.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::entity::{EntityId, EntityRef};
use crate::lifecycle::{EntityEvent, Trigger};

/// Distinct entities of one pass, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    items: Vec<EntityEvent>,
    index: FxHashMap<EntityId, usize>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event. A later event for the same id replaces the entity
    /// (it may have been recreated); `Source` outranks `Dependency`.
    pub fn push(&mut self, event: EntityEvent) {
        let id = event.entity.id().clone();
        match self.index.get(&id) {
            Some(&i) => {
                let item = &mut self.items[i];
                if event.trigger == Trigger::Source {
                    item.trigger = Trigger::Source;
                }
                item.entity = event.entity;
            }
            None => {
                self.index.insert(id, self.items.len());
                self.items.push(event);
            }
        }
    }

    pub fn merge(&mut self, other: Batch) {
        for item in other.items {
            self.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[EntityEvent] {
        &self.items
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityRef> {
        self.items.iter().map(|item| &item.entity)
    }
}

impl FromIterator<EntityEvent> for Batch {
    fn from_iter<I: IntoIterator<Item = EntityEvent>>(iter: I) -> Self {
        let mut batch = Self::new();
        for event in iter {
            batch.push(event);
        }
        batch
    }
}

/// Pure timing state: a batch is ready once no event arrived for `window`.
pub(super) struct Collector {
    pending: Batch,
    last_event: Option<Instant>,
    window: Duration,
}

impl Collector {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            pending: Batch::new(),
            last_event: None,
            window,
        }
    }

    pub(super) fn add(&mut self, event: EntityEvent) {
        self.pending.push(event);
        self.last_event = Some(Instant::now());
    }

    pub(super) fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|last| last.elapsed() >= self.window && !self.pending.is_empty())
    }

    pub(super) fn take_if_ready(&mut self) -> Option<Batch> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending))
    }

    fn take(&mut self) -> Option<Batch> {
        self.last_event = None;
        let batch = std::mem::take(&mut self.pending);
        (!batch.is_empty()).then_some(batch)
    }

    /// Precise sleep duration until the pending batch can be released.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };
        self.window
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Collect events into batches until the event stream ends. A pending
/// batch is flushed on close.
pub(super) async fn run_collector(
    mut rx: mpsc::Receiver<EntityEvent>,
    tx: mpsc::Sender<Batch>,
    window: Duration,
) {
    let mut collector = Collector::new(window);
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => collector.add(event),
                None => {
                    if let Some(batch) = collector.take() {
                        let _ = tx.send(batch).await;
                    }
                    break;
                }
            },
            _ = tokio::time::sleep(collector.sleep_duration()) => {
                if let Some(batch) = collector.take_if_ready() {
                    crate::debug!("batch"; "{} entities", batch.len());
                    if tx.send(batch).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::testing::TestEntity;
    use std::sync::Arc;

    #[test]
    fn test_batch_dedups_and_source_wins() {
        let a = TestEntity::new("a").into_ref();
        let b = TestEntity::new("b").into_ref();
        let batch: Batch = vec![
            EntityEvent::dependency(a.clone()),
            EntityEvent::source(b),
            EntityEvent::source(a.clone()),
            EntityEvent::dependency(a.clone()),
        ]
        .into_iter()
        .collect();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.items()[0].entity.id().as_str(), "a");
        assert_eq!(batch.items()[0].trigger, Trigger::Source);
    }

    #[test]
    fn test_batch_keeps_latest_entity_object() {
        let old = TestEntity::new("a").into_ref();
        let new = TestEntity::new("a").into_ref();
        let mut batch = Batch::new();
        batch.push(EntityEvent::source(old));
        batch.push(EntityEvent::source(new.clone()));
        assert!(Arc::ptr_eq(&batch.items()[0].entity, &new));
    }

    #[test]
    fn test_collector_waits_for_quiet_window() {
        let mut collector = Collector::new(Duration::from_millis(30));
        assert!(collector.sleep_duration() >= Duration::from_secs(3600));

        collector.add(EntityEvent::source(TestEntity::new("a").into_ref()));
        assert!(collector.take_if_ready().is_none());
        assert!(collector.sleep_duration() <= Duration::from_millis(30));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(collector.take_if_ready().map(|b| b.len()), Some(1));
        assert!(collector.take_if_ready().is_none());
    }

    #[tokio::test]
    async fn test_rapid_events_coalesce_into_one_batch() {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (batch_tx, mut batch_rx) = mpsc::channel(4);
        tokio::spawn(run_collector(event_rx, batch_tx, Duration::from_millis(50)));

        let entity = TestEntity::new("a").into_ref();
        for _ in 0..10 {
            event_tx.send(EntityEvent::source(entity.clone())).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let batch = tokio::time::timeout(Duration::from_secs(2), batch_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(batch_rx.try_recv().is_err(), "exactly one batch");
    }

    #[tokio::test]
    async fn test_pending_batch_flushed_on_close() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (batch_tx, mut batch_rx) = mpsc::channel(4);
        let task = tokio::spawn(run_collector(event_rx, batch_tx, Duration::from_secs(60)));

        event_tx.send(EntityEvent::source(TestEntity::new("a").into_ref())).await.unwrap();
        drop(event_tx);
        task.await.unwrap();
        assert_eq!(batch_rx.recv().await.map(|b| b.len()), Some(1));
    }
}
