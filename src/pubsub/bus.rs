use super::event::{Event, EventType};
use crate::utils::error::{GangliaError, Result};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub type EventHandler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    table: RwLock<HashMap<EventType, Vec<(SubscriptionId, EventHandler)>>>,
}

impl Subscribers {
    fn handlers_for(&self, event_type: EventType) -> Vec<EventHandler> {
        let table = self.table.read().unwrap_or_else(|p| p.into_inner());
        table
            .get(&event_type)
            .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Calls every handler of the event's type in subscription order. The
    /// handler list is snapshotted first so handlers may (un)subscribe.
    fn dispatch(&self, event: &Event) {
        for handler in self.handlers_for(event.event_type) {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Error in event callback for {}: {:#}", event, e),
                Err(_) => tracing::error!("Event callback panicked while handling {}", event),
            }
        }
    }
}

type Queue = mpsc::UnboundedReceiver<Event>;

struct Worker {
    receiver: Option<Queue>,
    running: Option<(oneshot::Sender<()>, JoinHandle<Queue>)>,
}

/// Cheap handle that only publishes; safe to move into handlers.
#[derive(Clone)]
pub struct Publisher {
    sender: mpsc::UnboundedSender<Event>,
}

impl Publisher {
    pub fn publish(&self, event: Event) {
        tracing::debug!("Published event: {}", event);
        if self.sender.send(event).is_err() {
            tracing::warn!("PubSub queue closed, event dropped");
        }
    }
}

/// In-process event bus with one delivery task.
///
/// Events are delivered one at a time in publish order. Publishing while the
/// bus is stopped queues the event until the next [`start`](Self::start).
pub struct PubSub {
    subscribers: Arc<Subscribers>,
    publisher: Publisher,
    worker: Mutex<Worker>,
}

impl PubSub {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            subscribers: Arc::new(Subscribers::default()),
            publisher: Publisher { sender },
            worker: Mutex::new(Worker {
                receiver: Some(receiver),
                running: None,
            }),
        }
    }

    /// Spawns the delivery task on the current tokio runtime. Does nothing
    /// when already running.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GangliaError::config(format!("PubSub needs a tokio runtime: {}", e)))?;

        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if worker.running.is_some() {
            return Ok(());
        }
        let Some(mut queue) = worker.receiver.take() else {
            return Err(GangliaError::config("PubSub event queue was lost"));
        };

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let subscribers = Arc::clone(&self.subscribers);
        let handle = runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    next = queue.recv() => match next {
                        Some(event) => subscribers.dispatch(&event),
                        None => break,
                    },
                }
            }
            queue
        });

        worker.running = Some((shutdown_tx, handle));
        tracing::debug!("PubSub system started");
        Ok(())
    }

    /// Stops the delivery task after the event in flight. Undelivered events
    /// stay queued.
    pub async fn stop(&self) {
        let running = {
            let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
            worker.running.take()
        };
        let Some((shutdown_tx, handle)) = running else {
            return;
        };

        let _ = shutdown_tx.send(());
        match handle.await {
            Ok(queue) => {
                let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
                worker.receiver = Some(queue);
            }
            Err(e) => tracing::error!("PubSub worker ended abnormally: {}", e),
        }
        tracing::debug!("PubSub system stopped");
    }

    pub fn is_running(&self) -> bool {
        let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        worker
            .running
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.subscribers.next_id.fetch_add(1, Ordering::Relaxed));
        let mut table = self
            .subscribers
            .table
            .write()
            .unwrap_or_else(|p| p.into_inner());
        table
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(handler)));
        tracing::debug!("Subscribed to {} events", event_type);
        id
    }

    /// Returns false when `id` was not subscribed to `event_type`.
    pub fn unsubscribe(&self, event_type: EventType, id: SubscriptionId) -> bool {
        let mut table = self
            .subscribers
            .table
            .write()
            .unwrap_or_else(|p| p.into_inner());
        let Some(entries) = table.get_mut(&event_type) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if removed {
            tracing::debug!("Unsubscribed from {} events", event_type);
        }
        removed
    }

    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        let table = self
            .subscribers
            .table
            .read()
            .unwrap_or_else(|p| p.into_inner());
        table.get(&event_type).map_or(0, Vec::len)
    }

    pub fn publish(&self, event: Event) {
        self.publisher.publish(event);
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}
