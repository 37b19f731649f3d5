//! Generic list+watch relay.
//!
//! A [`ResourceWatcher`] turns a store's watch stream into typed lifecycle
//! events for one resource kind. Each watcher runs in its own task and hands
//! events to its consumer one at a time: the next event or update is only
//! sent once the previous one has been received, so a slow consumer stalls
//! the underlying watch.

use crate::selector::LabelSelector;
use crate::store::ResourceStore;
use futures::StreamExt;
use kube::{Resource, ResourceExt};
use kube_runtime::watcher;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle event for one object
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
}

impl<K: Resource> ResourceEvent<K> {
    pub fn object(&self) -> &K {
        match self {
            ResourceEvent::Added(obj) | ResourceEvent::Modified(obj) | ResourceEvent::Deleted(obj) => obj,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ResourceEvent::Added(_) => "added",
            ResourceEvent::Modified(_) => "modified",
            ResourceEvent::Deleted(_) => "deleted",
        }
    }
}

/// Before/after snapshots of a modified object
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUpdate<K> {
    pub old: K,
    pub new: K,
}

/// Receiving side of a running watcher
#[derive(Debug)]
pub struct WatchHandle<K> {
    pub events: mpsc::Receiver<ResourceEvent<K>>,
    /// Present only when the watcher was built with [`ResourceWatcher::with_updates`]
    pub updates: Option<mpsc::Receiver<ResourceUpdate<K>>>,
    pub task: JoinHandle<()>,
}

/// List+watch relay for one resource kind
pub struct ResourceWatcher<K>
where
    K: Clone + Send + 'static,
{
    kind: &'static str,
    store: Arc<dyn ResourceStore<K>>,
    selector: LabelSelector,
    updates: bool,
}

impl<K> ResourceWatcher<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    pub fn new(kind: &'static str, store: Arc<dyn ResourceStore<K>>, selector: LabelSelector) -> Self {
        Self {
            kind,
            store,
            selector,
            updates: false,
        }
    }

    /// Also emit a [`ResourceUpdate`] after every `Modified` event
    pub fn with_updates(mut self) -> Self {
        self.updates = true;
        self
    }

    /// Start watching in a background task until `shutdown` is cancelled
    /// or the consumer drops its receivers.
    pub fn spawn(self, shutdown: CancellationToken) -> WatchHandle<K> {
        let (event_tx, events) = mpsc::channel(1);
        let (update_tx, updates) = if self.updates {
            let (tx, rx) = mpsc::channel(1);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let kind = self.kind;
        let selector = self.selector.to_string();
        let stream = self.store.watch(&self.selector);
        let task = tokio::spawn(async move {
            info!("Starting {} watcher (selector: {:?})", kind, selector);
            relay(kind, stream, event_tx, update_tx, shutdown).await;
            info!("Stopped {} watcher", kind);
        });

        WatchHandle {
            events,
            updates,
            task,
        }
    }
}

async fn relay<K>(
    kind: &'static str,
    mut stream: crate::store::WatchStream<K>,
    event_tx: mpsc::Sender<ResourceEvent<K>>,
    update_tx: Option<mpsc::Sender<ResourceUpdate<K>>>,
    shutdown: CancellationToken,
) where
    K: Resource + Clone + Send + 'static,
{
    let mut cache = EventCache::default();

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return,
            next = stream.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                warn!("{} watch error, dropping event: {}", kind, e);
                continue;
            }
            None => {
                debug!("{} watch stream ended", kind);
                return;
            }
        };

        for change in cache.apply(event) {
            if let Change::Event(event) = &change {
                debug!("{} {}: {}", kind, event.verb(), event.object().name_any());
            }

            let delivered = match change {
                Change::Event(event) => hand_off(&event_tx, event, &shutdown).await,
                Change::Update(update) => match &update_tx {
                    Some(tx) => hand_off(tx, update, &shutdown).await,
                    None => true,
                },
            };
            if !delivered {
                return;
            }
        }
    }
}

/// Blocks until the consumer has received `item`. Returns false when the
/// watcher should stop (shutdown, or the consumer went away).
///
/// Events and updates travel on separate channels, so nothing may be sent
/// while an earlier item is still buffered. Reserving the slot again only
/// succeeds once the consumer has taken `item` out of it.
async fn hand_off<T>(tx: &mpsc::Sender<T>, item: T, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        delivered = async { tx.send(item).await.is_ok() && tx.reserve().await.is_ok() } => delivered,
    }
}

enum Change<K> {
    Event(ResourceEvent<K>),
    Update(ResourceUpdate<K>),
}

/// Last seen version of every object, keyed by name
struct EventCache<K> {
    objects: HashMap<String, K>,
    // Names seen since the current (re)list started
    relisting: Option<HashSet<String>>,
}

impl<K> Default for EventCache<K> {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            relisting: None,
        }
    }
}

impl<K> EventCache<K>
where
    K: Resource + Clone,
{
    fn apply(&mut self, event: watcher::Event<K>) -> Vec<Change<K>> {
        match event {
            watcher::Event::Init => {
                self.relisting = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.relisting.as_mut() {
                    seen.insert(obj.name_any());
                }
                self.upsert(obj)
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relisting.take() else {
                    return Vec::new();
                };
                let mut gone: Vec<String> = self
                    .objects
                    .keys()
                    .filter(|name| !seen.contains(*name))
                    .cloned()
                    .collect();
                gone.sort();
                gone.into_iter()
                    .filter_map(|name| self.objects.remove(&name))
                    .map(|obj| Change::Event(ResourceEvent::Deleted(obj)))
                    .collect()
            }
            watcher::Event::Apply(obj) => self.upsert(obj),
            watcher::Event::Delete(obj) => {
                self.objects.remove(&obj.name_any());
                vec![Change::Event(ResourceEvent::Deleted(obj))]
            }
        }
    }

    fn upsert(&mut self, obj: K) -> Vec<Change<K>> {
        let name = obj.name_any();
        match self.objects.insert(name, obj.clone()) {
            None => vec![Change::Event(ResourceEvent::Added(obj))],
            Some(old) if unchanged(&old, &obj) => Vec::new(),
            Some(old) => vec![
                Change::Event(ResourceEvent::Modified(obj.clone())),
                Change::Update(ResourceUpdate { old, new: obj }),
            ],
        }
    }
}

// Objects without a resourceVersion are always treated as changed.
fn unchanged<K: Resource>(old: &K, new: &K) -> bool {
    match (old.resource_version(), new.resource_version()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
