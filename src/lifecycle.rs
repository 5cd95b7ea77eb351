//! Application lifecycle notifications.
//!
//! A [`NotificationCenter`] delivers [`LifecycleEvent`]s to subscribed
//! handlers. Handlers run synchronously on the posting thread, in
//! subscription order. [`forward_os_signals`] turns process signals into
//! lifecycle events for hosts without a native lifecycle.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Host lifecycle transitions that should trigger a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The process is about to exit.
    WillTerminate,
    /// The application moved to the background and may be suspended.
    DidEnterBackground,
}

impl LifecycleEvent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WillTerminate => "will_terminate",
            Self::DidEnterBackground => "did_enter_background",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`NotificationCenter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    event: LifecycleEvent,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Subject side of the lifecycle observer pattern. Cheap to clone; clones
/// share subscriptions.
#[derive(Clone, Default)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("subscriptions", &self.inner.subscriptions.lock().len())
            .finish()
    }
}

impl NotificationCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    pub fn subscribe<F>(&self, event: LifecycleEvent, handler: F) -> SubscriptionId
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscriptions.lock().push(Subscription {
            id,
            event,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.inner.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Deliver `event` to its subscribers and return how many ran.
    ///
    /// The subscriber list is snapshotted first, so handlers may subscribe
    /// or unsubscribe while running.
    pub fn post(&self, event: LifecycleEvent) -> usize {
        let handlers: Vec<Handler> = self
            .inner
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.event == event)
            .map(|s| s.handler.clone())
            .collect();

        debug!(%event, handlers = handlers.len(), "Posting lifecycle event");
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }
}

/// Map OS signals onto lifecycle events until the process should stop.
///
/// Ctrl-C and SIGTERM post `WillTerminate` and end the loop; SIGHUP posts
/// `DidEnterBackground` and keeps listening. Handlers run on the blocking
/// pool, since a flush waits on queue threads.
///
/// # Errors
///
/// Returns `Io` if a signal handler cannot be installed.
pub async fn forward_os_signals(center: NotificationCenter) -> crate::error::Result<()> {
    loop {
        let event = next_signal_event().await?;
        info!(%event, "Received lifecycle signal");
        let poster = center.clone();
        tokio::task::spawn_blocking(move || poster.post(event))
            .await
            .map_err(|e| crate::error::Error::Other(format!("Lifecycle handler failed: {e}")))?;
        if event == LifecycleEvent::WillTerminate {
            return Ok(());
        }
    }
}

#[cfg(unix)]
async fn next_signal_event() -> crate::error::Result<LifecycleEvent> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok(LifecycleEvent::WillTerminate)
        }
        _ = terminate.recv() => Ok(LifecycleEvent::WillTerminate),
        _ = hangup.recv() => Ok(LifecycleEvent::DidEnterBackground),
    }
}

#[cfg(not(unix))]
async fn next_signal_event() -> crate::error::Result<LifecycleEvent> {
    tokio::signal::ctrl_c().await?;
    Ok(LifecycleEvent::WillTerminate)
}
