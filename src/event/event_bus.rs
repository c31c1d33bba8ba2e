use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::task::Context;
use std::task::Poll;
use std::thread;

use anyhow::Result;
use log::debug;
use log::warn;
use tokio::runtime;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::BusError;
use crate::error::BusResult;
use crate::event::Event;
use crate::event::pattern::TopicPattern;
use crate::subscriber::Subscriber;

type HandlerFn<P> =
    Arc<dyn Fn(Event<P>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// A registered subscription: compiled pattern, optional version filter,
/// and the handler in its normalized invocable form.
struct Observer<P> {
    id: Uuid,
    pattern: TopicPattern,
    version: Option<String>,
    handler: HandlerFn<P>,
}

impl<P> Observer<P> {
    fn accepts(&self, event: &Event<P>) -> bool {
        self.pattern.matches(&event.topic)
            && (self.version.is_none() || self.version == event.version)
    }
}

/// Snapshot of one matched subscription, taken per dispatch.
struct Match<P> {
    pattern: String,
    handler: HandlerFn<P>,
}

/// A handler that was matched by a dispatch but returned an error.
///
/// Captured per handler in the dispatch outcome set; a failure never aborts
/// sibling handlers and never fails the bus itself.
#[derive(Debug, thiserror::Error)]
#[error("handler for \"{pattern}\" failed: {error}")]
pub struct HandlerFailure {
    /// The subscription pattern the failing handler was registered under.
    pub pattern: String,
    /// The error the handler returned.
    pub error: anyhow::Error,
}

/// Per-handler result of a dispatch.
pub type Outcome = Result<(), HandlerFailure>;

/// Identifies a subscription for later [`EventBus::unsubscribe`] or
/// [`EventBus::suspend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: Uuid,
}

/// Resolves to the per-handler outcomes of a single dispatch.
///
/// Await it from async code, or call [`DispatchHandle::wait`] from a
/// synchronous call site. Dropping the handle never cancels the dispatch;
/// every matched handler runs to completion either way.
#[derive(Debug)]
pub struct DispatchHandle {
    rx: oneshot::Receiver<Vec<Outcome>>,
}

impl DispatchHandle {
    /// Block the calling thread until every matched handler has finished.
    pub fn wait(self) -> Vec<Outcome> {
        // The sender is only dropped without sending if the worker was torn
        // down mid-flight, which close() prevents by draining first.
        self.rx.blocking_recv().unwrap_or_default()
    }
}

impl Future for DispatchHandle {
    type Output = Vec<Outcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or_default())
    }
}

/// Temporarily detaches a subscription; dropping the guard re-attaches it
/// at the end of the registry.
///
/// Lets a code path run with a handler unplugged, e.g. to avoid a handler
/// reacting to events that the guarded section itself publishes.
#[must_use = "the subscription stays detached only while the guard is alive"]
pub struct SuspendGuard<P> {
    observers: Arc<RwLock<Vec<Observer<P>>>>,
    observer: Option<Observer<P>>,
}

impl<P> Drop for SuspendGuard<P> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.take()
            && let Ok(mut observers) = self.observers.write()
        {
            observers.push(observer);
        }
    }
}

/// In-process publish/subscribe bus with wildcard topic routing.
///
/// The bus owns a dedicated single-worker runtime; every dispatch is handed
/// off to that worker, so publishing is thread-safe from any call site and
/// all matched handlers of one dispatch run concurrently within the worker's
/// domain. Failures are collected per handler (join-all-then-report), never
/// propagated across siblings.
pub struct EventBus<P> {
    observers: Arc<RwLock<Vec<Observer<P>>>>,
    runtime: Mutex<Option<Runtime>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl<P> EventBus<P> {
    pub fn new() -> Self {
        let rt = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("Error spawning tokio runtime for EventBus");
        Self {
            observers: Arc::new(RwLock::new(Vec::new())),
            runtime: Mutex::new(Some(rt)),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Register an async handler for every event whose topic matches
    /// `topic` and whose version passes the optional `version` filter
    /// (`None` matches any event version).
    ///
    /// The pattern is compiled here, once; an unparsable pattern fails the
    /// subscription immediately with [`BusError::InvalidPattern`].
    pub fn subscribe<F, Fut>(
        &self,
        topic: &str,
        version: Option<&str>,
        handler: F,
    ) -> BusResult<SubscriptionHandle>
    where
        F: Fn(Event<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if self.runtime.lock().unwrap().is_none() {
            return Err(BusError::Closed);
        }
        let pattern = TopicPattern::compile(topic)?;
        let handler: HandlerFn<P> = Arc::new(move |event| Box::pin(handler(event)));
        let id = Uuid::new_v4();
        debug!("Subscribed {} to \"{}\" (version: {:?})", id, topic, version);
        self.observers.write().unwrap().push(Observer {
            id,
            pattern,
            version: version.map(str::to_string),
            handler,
        });
        Ok(SubscriptionHandle { id })
    }

    /// Register a plain synchronous handler.
    ///
    /// The function is adapted once, at subscribe time, into the same
    /// invocable contract async handlers use; its body runs on the bus
    /// worker alongside the other handlers of a dispatch.
    pub fn subscribe_fn<F>(
        &self,
        topic: &str,
        version: Option<&str>,
        handler: F,
    ) -> BusResult<SubscriptionHandle>
    where
        F: Fn(Event<P>) -> Result<()> + Send + Sync + 'static,
        P: Send + 'static,
    {
        let handler = Arc::new(handler);
        self.subscribe(topic, version, move |event| {
            let handler = handler.clone();
            async move { handler(event) }
        })
    }

    /// Register a [`Subscriber`] object; its `callback` receives every
    /// matching event.
    pub fn register_subscriber<S>(
        &self,
        topic: &str,
        version: Option<&str>,
        subscriber: Arc<S>,
    ) -> BusResult<SubscriptionHandle>
    where
        S: Subscriber<P> + 'static,
        P: Send + Sync + 'static,
    {
        self.subscribe(topic, version, move |event| {
            let subscriber = subscriber.clone();
            async move { subscriber.callback(event).await }
        })
    }

    /// Remove a subscription. Events dispatched afterwards no longer reach
    /// its handler; a dispatch already in flight may still invoke it.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> BusResult<()> {
        let mut observers = self.observers.write().unwrap();
        let before = observers.len();
        observers.retain(|observer| observer.id != handle.id);
        if observers.len() == before {
            return Err(BusError::UnknownSubscription { id: handle.id });
        }
        debug!("Unsubscribed {}", handle.id);
        Ok(())
    }

    /// Detach a subscription until the returned guard is dropped.
    pub fn suspend(&self, handle: &SubscriptionHandle) -> BusResult<SuspendGuard<P>> {
        let mut observers = self.observers.write().unwrap();
        let position = observers
            .iter()
            .position(|observer| observer.id == handle.id)
            .ok_or(BusError::UnknownSubscription { id: handle.id })?;
        let observer = observers.remove(position);
        Ok(SuspendGuard {
            observers: Arc::clone(&self.observers),
            observer: Some(observer),
        })
    }

    /// Publish an event to every matching subscription.
    ///
    /// The match set is snapshotted here; the handler invocations are handed
    /// off to the bus worker, where they all run concurrently. The returned
    /// handle resolves once every matched handler has finished, with one
    /// [`Outcome`] per handler. The caller is never blocked unless it waits
    /// on the handle.
    pub fn dispatch(&self, event: Event<P>) -> BusResult<DispatchHandle>
    where
        P: Clone + Send + 'static,
    {
        let matched = self.matching(&event);
        debug!(
            "Dispatching \"{}\" to {} handler(s)",
            event.topic,
            matched.len()
        );
        let (tx, rx) = oneshot::channel();
        let runtime = self.runtime.lock().unwrap();
        let runtime = runtime.as_ref().ok_or(BusError::Closed)?;
        let handle = runtime.spawn(async move {
            let invocations: Vec<_> = matched
                .iter()
                .map(|m| (m.handler)(event.clone()))
                .collect();
            let results = futures::future::join_all(invocations).await;
            let outcomes: Vec<Outcome> = results
                .into_iter()
                .zip(matched)
                .map(|(result, m)| {
                    result.map_err(|error| {
                        warn!("Handler for \"{}\" failed: {:#}", m.pattern, error);
                        HandlerFailure {
                            pattern: m.pattern,
                            error,
                        }
                    })
                })
                .collect();
            // The receiver may have been dropped by a fire-and-forget caller.
            let _ = tx.send(outcomes);
        });
        // Registered while still holding the runtime lock, so close() cannot
        // miss this task when it drains.
        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight.retain(|task| !task.is_finished());
        in_flight.push(handle);
        Ok(DispatchHandle { rx })
    }

    /// Stop accepting new work, let in-flight dispatches run to completion,
    /// then stop the worker. Idempotent; also invoked on drop.
    pub fn close(&self) {
        let Some(runtime) = self.runtime.lock().unwrap().take() else {
            return;
        };
        let in_flight = std::mem::take(&mut *self.in_flight.lock().unwrap());
        debug!(
            "Closing event bus, draining {} in-flight dispatch(es)",
            in_flight.len()
        );
        // Drain on a helper thread so close() stays safe to call from async
        // contexts, where blocking on the runtime would panic.
        let drain = thread::spawn(move || {
            runtime.block_on(async move {
                for task in in_flight {
                    let _ = task.await;
                }
            });
            // Dropping the runtime joins its worker thread.
            drop(runtime);
        });
        if drain.join().is_err() {
            warn!("Event bus worker panicked during shutdown");
        }
    }

    fn matching(&self, event: &Event<P>) -> Vec<Match<P>> {
        self.observers
            .read()
            .unwrap()
            .iter()
            .filter(|observer| observer.accepts(event))
            .map(|observer| Match {
                pattern: observer.pattern.as_str().to_string(),
                handler: Arc::clone(&observer.handler),
            })
            .collect()
    }
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Drop for EventBus<P> {
    fn drop(&mut self) {
        self.close();
    }
}
