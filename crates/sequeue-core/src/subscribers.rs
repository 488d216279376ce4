//! Subscriber registry for the `item` and `done` notifications.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;

/// Consumer of dequeued items.
///
/// The drain loop awaits `handle` to completion before it moves on, so any
/// delay inside the handler counts towards the spacing between cycles.
#[async_trait]
pub trait ItemHandler<T>: Send + Sync {
    async fn handle(&self, item: &T) -> Result<(), HandlerError>;
}

/// Adapts an async closure taking an owned item into an [`ItemHandler`].
///
/// Each call receives its own clone of the item.
pub struct FnItemHandler<T, F> {
    f: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, F, Fut> FnItemHandler<T, F>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> ItemHandler<T> for FnItemHandler<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, item: &T) -> Result<(), HandlerError> {
        (self.f)(item.clone()).await
    }
}

pub type DoneListener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by `on_item` / `on_done`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Ordered lists of subscribers.
///
/// Mutated through `&mut` behind the queue's lock and read as cheap
/// snapshots, so dispatch never holds the lock across an `await`.
pub struct Subscribers<T> {
    items: Vec<(SubscriptionId, Arc<dyn ItemHandler<T>>)>,
    done: Vec<(SubscriptionId, DoneListener)>,
    next_id: u64,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            done: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_item(&mut self, handler: Arc<dyn ItemHandler<T>>) -> SubscriptionId {
        let id = self.allocate_id();
        self.items.push((id, handler));
        id
    }

    pub fn add_done(&mut self, listener: DoneListener) -> SubscriptionId {
        let id = self.allocate_id();
        self.done.push((id, listener));
        id
    }

    /// Remove a subscription of either kind. Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.items.len() + self.done.len();
        self.items.retain(|(sid, _)| *sid != id);
        self.done.retain(|(sid, _)| *sid != id);
        before != self.items.len() + self.done.len()
    }

    pub fn item_handlers(&self) -> Vec<Arc<dyn ItemHandler<T>>> {
        self.items.iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    pub fn done_listeners(&self) -> Vec<DoneListener> {
        self.done.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}
