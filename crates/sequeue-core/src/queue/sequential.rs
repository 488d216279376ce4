//! Sequential queue: a single drain chain hands items to the subscribers one
//! at a time, in FIFO order.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::{QueueBuilder, QueueState, Spacing};
use crate::config::{FailurePolicy, QueueConfig};
use crate::error::{HandlerError, QueueError};
use crate::observability::QueueStats;
use crate::subscribers::{FnItemHandler, ItemHandler, SubscriptionId, Subscribers};

/// Buffer and state, guarded together so the Idle -> Draining check-and-set
/// sees the buffer it is about to drain.
struct Core<T> {
    buffer: VecDeque<T>,
    state: QueueState,
    processed: u64,
    failed: u64,
    drains: u64,
    /// Id of the most recently started drain chain.
    chain: u64,
    /// Latest chain stopped by a handler failure under `Abort`.
    last_abort: Option<(u64, HandlerError)>,
}

struct Inner<T> {
    config: QueueConfig,
    spacing: Spacing,
    core: Mutex<Core<T>>,
    subscribers: Mutex<Subscribers<T>>,
    /// Mirrors `Core::state` for callers waiting on the active chain.
    state_tx: watch::Sender<QueueState>,
}

impl<T> Inner<T> {
    fn lock_core(&self) -> MutexGuard<'_, Core<T>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers<T>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the core lock held.
    fn transition(&self, core: &mut Core<T>, to: QueueState) {
        core.state = to;
        self.state_tx.send_replace(to);
    }

    /// Idle -> Draining. Returns the id of the new chain.
    fn begin_chain(&self, core: &mut Core<T>) -> u64 {
        core.chain += 1;
        self.transition(core, QueueState::Draining);
        core.chain
    }
}

/// Puts the queue back to `Idle` if a chain task ends while still owning the
/// `Draining` state (handler panic, runtime shutdown).
struct ChainGuard<T> {
    inner: Arc<Inner<T>>,
    chain: u64,
}

impl<T> Drop for ChainGuard<T> {
    fn drop(&mut self) {
        let mut core = self.inner.lock_core();
        if core.chain == self.chain && core.state == QueueState::Draining {
            self.inner.transition(&mut core, QueueState::Idle);
            warn!(queue = %self.inner.config.name, chain = self.chain, "drain chain ended abnormally");
        }
    }
}

/// What `dequeue` found when it looked at the state.
enum Entry {
    Run { runtime: Handle, chain: u64 },
    Wait {
        state_rx: watch::Receiver<QueueState>,
        chain: u64,
    },
}

/// Result of taking the next item off the buffer.
enum Next<T> {
    Item { item: T, pending: usize },
    Drained,
    Closed,
}

/// An in-memory FIFO drained by one async consumer chain.
///
/// Cloning is cheap and yields another handle to the same queue.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use sequeue_core::config::QueueConfig;
/// use sequeue_core::queue::SequentialQueue;
///
/// let queue = SequentialQueue::new(vec![1, 2, 3], QueueConfig::new("numbers"));
/// queue.on_item_fn(|n: u32| async move {
///     println!("got {n}");
///     Ok(())
/// });
/// queue.dequeue().await.unwrap();
/// assert_eq!(queue.count(), 0);
/// # }
/// ```
pub struct SequentialQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SequentialQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SequentialQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.lock_core();
        f.debug_struct("SequentialQueue")
            .field("name", &self.inner.config.name)
            .field("state", &core.state)
            .field("pending", &core.buffer.len())
            .finish_non_exhaustive()
    }
}

impl<T> SequentialQueue<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<I>(items: I, config: QueueConfig) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let (state_tx, _) = watch::channel(QueueState::Idle);
        Self {
            inner: Arc::new(Inner {
                spacing: Spacing::from_config(&config),
                config,
                core: Mutex::new(Core {
                    buffer: items.into_iter().collect(),
                    state: QueueState::Idle,
                    processed: 0,
                    failed: 0,
                    drains: 0,
                    chain: 0,
                    last_abort: None,
                }),
                subscribers: Mutex::new(Subscribers::new()),
                state_tx,
            }),
        }
    }

    pub fn builder() -> QueueBuilder<T> {
        QueueBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Subscribe to the `item` notification.
    pub fn on_item<H>(&self, handler: H) -> SubscriptionId
    where
        H: ItemHandler<T> + 'static,
    {
        self.inner.lock_subscribers().add_item(Arc::new(handler))
    }

    /// Subscribe an async closure to the `item` notification.
    pub fn on_item_fn<F, Fut>(&self, f: F) -> SubscriptionId
    where
        T: Clone,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.on_item(FnItemHandler::new(f))
    }

    /// Subscribe to the `done` notification.
    pub fn on_done<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lock_subscribers().add_done(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.lock_subscribers().remove(id)
    }

    /// Append items to the tail of the buffer.
    ///
    /// If the queue is idle a new drain chain is spawned on the current tokio
    /// runtime; this call does not wait for it. Subscribe before enqueueing
    /// into an idle queue, or the items may be consumed with no one listening.
    ///
    /// # Errors
    /// - [`QueueError::Closed`] if the queue has been closed.
    /// - [`QueueError::NoRuntime`] if a chain must be spawned outside a tokio
    ///   runtime. Nothing is appended in that case.
    pub fn enqueue<I>(&self, items: I) -> Result<&Self, QueueError>
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return if self.state().is_terminal() {
                Err(self.closed_error())
            } else {
                Ok(self)
            };
        }

        let runtime = {
            let mut core = self.inner.lock_core();
            if core.state.is_terminal() {
                return Err(self.closed_error());
            }

            let runtime = if core.state.can_start_drain() {
                let handle = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
                let chain = self.inner.begin_chain(&mut core);
                Some((handle, chain))
            } else {
                None
            };
            core.buffer.extend(items);
            debug!(
                queue = %self.name(),
                pending = core.buffer.len(),
                restart = runtime.is_some(),
                "items enqueued"
            );
            runtime
        };

        if let Some((runtime, chain)) = runtime {
            let queue = self.clone();
            let join = self.spawn_chain(&runtime, chain);
            runtime.spawn(async move {
                if let Ok(Err(err)) = join.await {
                    error!(queue = %queue.name(), error = %err, "drain chain stopped");
                }
            });
        }

        Ok(self)
    }

    /// Append a single item. See [`enqueue`](Self::enqueue).
    pub fn push(&self, item: T) -> Result<&Self, QueueError> {
        self.enqueue(std::iter::once(item))
    }

    /// Drain the queue until it is empty.
    ///
    /// The chain runs on its own task, so dropping this future (timeout,
    /// `select!`) stops the wait but not the draining. If a chain is already
    /// running, no second chain is started: this waits until the running
    /// chain leaves `Draining`.
    ///
    /// # Errors
    /// - [`QueueError::Closed`] if the queue has been closed.
    /// - [`QueueError::NoRuntime`] if called outside a tokio runtime.
    /// - [`QueueError::Handler`] if a handler failed under
    ///   [`FailurePolicy::Abort`], in the chain this call started or waited
    ///   on. The chain stops and the remaining items stay buffered.
    ///
    /// # Panics
    /// Resumes the panic of an item handler that panicked in this call's chain.
    pub async fn dequeue(&self) -> Result<(), QueueError> {
        match self.enter()? {
            Entry::Run { runtime, chain } => match self.spawn_chain(&runtime, chain).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                // cancelled: the runtime is shutting down
                Err(_) => Ok(()),
            },
            Entry::Wait {
                mut state_rx,
                chain,
            } => {
                // the sender lives as long as the queue, so this cannot fail
                let _ = state_rx
                    .wait_for(|state| *state != QueueState::Draining)
                    .await;
                self.aborted_since(chain)
            }
        }
    }

    /// Number of items not yet handed to a handler.
    pub fn count(&self) -> usize {
        self.inner.lock_core().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock_core().state
    }

    /// Close the queue and discard the buffer.
    ///
    /// An in-flight handler runs to completion; the chain then stops without
    /// emitting `done`. Closing twice is a no-op.
    pub fn close(&self) {
        let discarded = {
            let mut core = self.inner.lock_core();
            if core.state.is_terminal() {
                return;
            }
            let discarded = core.buffer.len();
            core.buffer.clear();
            self.inner.transition(&mut core, QueueState::Closed);
            discarded
        };
        debug!(queue = %self.name(), discarded, "queue closed");
    }

    pub fn stats(&self) -> QueueStats {
        let core = self.inner.lock_core();
        QueueStats {
            name: self.name().to_string(),
            state: core.state,
            pending: core.buffer.len(),
            processed: core.processed,
            failed: core.failed,
            drains: core.drains,
        }
    }

    fn closed_error(&self) -> QueueError {
        QueueError::Closed {
            name: self.name().to_string(),
        }
    }

    fn enter(&self) -> Result<Entry, QueueError> {
        let mut core = self.inner.lock_core();
        match core.state {
            QueueState::Closed => Err(self.closed_error()),
            QueueState::Idle => {
                let runtime = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
                let chain = self.inner.begin_chain(&mut core);
                Ok(Entry::Run { runtime, chain })
            }
            QueueState::Draining => Ok(Entry::Wait {
                state_rx: self.inner.state_tx.subscribe(),
                chain: core.chain,
            }),
        }
    }

    /// Error of the latest chain aborted at or after `chain`, if any.
    fn aborted_since(&self, chain: u64) -> Result<(), QueueError> {
        let core = self.inner.lock_core();
        match &core.last_abort {
            Some((aborted, source)) if *aborted >= chain => Err(QueueError::Handler {
                name: self.name().to_string(),
                source: source.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn spawn_chain(&self, runtime: &Handle, chain: u64) -> JoinHandle<Result<(), QueueError>> {
        let queue = self.clone();
        runtime.spawn(async move {
            let _guard = ChainGuard {
                inner: Arc::clone(&queue.inner),
                chain,
            };
            queue.drain().await
        })
    }

    /// The drain chain. The caller must have moved the state to `Draining`.
    async fn drain(&self) -> Result<(), QueueError> {
        debug!(queue = %self.name(), pending = self.count(), "drain started");

        loop {
            let item = match self.next_item() {
                Next::Item { item, pending } => {
                    debug!(queue = %self.name(), pending, "item dequeued");
                    item
                }
                Next::Drained => {
                    self.finish_drain();
                    return Ok(());
                }
                Next::Closed => {
                    debug!(queue = %self.name(), "drain stopped on closed queue");
                    return Ok(());
                }
            };

            let started = Instant::now();
            self.dispatch(&item).await?;

            let delay = self.inner.spacing.next_delay(started.elapsed());
            tokio::time::sleep(delay).await;
        }
    }

    fn next_item(&self) -> Next<T> {
        let mut core = self.inner.lock_core();
        if core.state.is_terminal() {
            return Next::Closed;
        }
        match core.buffer.pop_front() {
            Some(item) => Next::Item {
                item,
                pending: core.buffer.len(),
            },
            None => {
                core.drains += 1;
                self.inner.transition(&mut core, QueueState::Idle);
                Next::Drained
            }
        }
    }

    /// Hand one item to every item subscriber, in subscription order.
    async fn dispatch(&self, item: &T) -> Result<(), QueueError> {
        let handlers = self.inner.lock_subscribers().item_handlers();

        let mut failed = false;
        for handler in handlers {
            let Err(source) = handler.handle(item).await else {
                continue;
            };
            failed = true;

            match self.inner.config.on_failure {
                FailurePolicy::Abort => {
                    self.abort_drain(&source);
                    return Err(QueueError::Handler {
                        name: self.name().to_string(),
                        source,
                    });
                }
                FailurePolicy::Continue => {
                    warn!(queue = %self.name(), error = %source, "item handler failed, continuing");
                }
            }
        }

        let mut core = self.inner.lock_core();
        if failed {
            core.failed += 1;
        } else {
            core.processed += 1;
        }
        Ok(())
    }

    fn abort_drain(&self, source: &HandlerError) {
        let mut core = self.inner.lock_core();
        core.failed += 1;
        core.last_abort = Some((core.chain, source.clone()));
        // close() may have run while the handler was in flight
        if core.state == QueueState::Draining {
            self.inner.transition(&mut core, QueueState::Idle);
        }
        debug!(queue = %self.name(), pending = core.buffer.len(), "drain aborted");
    }

    /// Emit `done`. The state is already `Idle`, so listeners may enqueue.
    ///
    /// On a multi-thread runtime an `enqueue` from another thread may start
    /// the next chain in this window, so its first `item` can run before
    /// these `done` listeners.
    fn finish_drain(&self) {
        debug!(queue = %self.name(), "queue drained");

        let listeners = self.inner.lock_subscribers().done_listeners();
        for listener in listeners {
            listener();
        }

        if self.inner.config.close_when_drained {
            self.close();
        }
    }
}
