//! Named publish/subscribe channel owned by every stateful object.
//!
//! Event names are a structured `(topic, namespace)` pair. Emitting or
//! removing a bare topic fans out over every namespaced variant of that
//! topic; a namespaced name addresses exactly one variant. Internal plumbing
//! (child-change propagation) registers under its own namespace with the
//! `protected` flag so user `off` calls cannot detach it.

use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;

use crate::element::ElementNode;
use crate::validation::{Rule, Validation};
use crate::value::Value;

/// Structured event name: a topic plus an optional namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventName {
    topic: String,
    namespace: Option<String>,
}

impl EventName {
    /// A bare topic name.
    pub fn of(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            namespace: None,
        }
    }

    /// A namespaced topic name.
    pub fn scoped(topic: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// The topic part.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The namespace part, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

/// `"topic"` or `"topic:namespace"`, for callers coming from string keys.
impl From<&str> for EventName {
    fn from(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((topic, ns)) => Self::scoped(topic, ns),
            None => Self::of(raw),
        }
    }
}

impl From<String> for EventName {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

/// Payload delivered to event handlers.
#[derive(Clone)]
pub enum EventData {
    /// No payload.
    None,
    /// The acting element.
    Element(ElementNode),
    /// The acting rule.
    Rule(Rule),
    /// The acting validation.
    Validation(Validation),
    /// An element's observable value changed.
    Changed {
        /// The element whose value changed.
        element: ElementNode,
        /// Value before the change.
        old: Value,
        /// Value after the change.
        new: Value,
    },
    /// A child of a composite changed, bubbled by the parent.
    ChildChanged {
        /// The composite that owns the child.
        parent: ElementNode,
        /// The child that changed.
        child: ElementNode,
    },
    /// A child was removed from a composite.
    Removed {
        /// The composite the child was removed from.
        parent: ElementNode,
        /// The detached child.
        child: ElementNode,
    },
}

/// A delivered event: its resolved name and payload.
#[derive(Clone)]
pub struct Event {
    /// The exact (possibly namespaced) name the handler was registered under.
    pub name: EventName,
    /// The payload.
    pub data: EventData,
}

type SyncFn = Arc<dyn Fn(&Event) + Send + Sync>;
type AsyncFn = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// An event handler: a plain closure or an async closure.
///
/// Handler identity is the inner `Arc`, so a cloned `Callback` re-registered
/// under the same name is a no-op and `off_handler` can remove exactly the
/// registration it was given.
#[derive(Clone)]
pub enum Callback {
    /// Synchronous handler.
    Sync(SyncFn),
    /// Asynchronous handler; `emit` awaits it before moving on.
    Async(AsyncFn),
}

impl Callback {
    /// Wrap a plain closure.
    pub fn sync(f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(f))
    }

    /// Wrap an async closure.
    pub fn future(f: impl Fn(Event) -> BoxFuture<'static, ()> + Send + Sync + 'static) -> Self {
        Self::Async(Arc::new(f))
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Sync(a), Self::Sync(b)) => Arc::ptr_eq(a, b),
            (Self::Async(a), Self::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Registration options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subscribe {
    /// Remove the registration after its first delivery.
    pub once: bool,
    /// Keep the registration alive through `off` calls.
    pub protected: bool,
}

struct Registration {
    name: EventName,
    callback: Callback,
    once: bool,
    protected: bool,
}

/// A named event channel.
///
/// Cloning shares the underlying registration list, so every handle onto one
/// stateful object observes the same subscribers.
#[derive(Clone, Default)]
pub struct Events {
    inner: Arc<RwLock<Vec<Registration>>>,
}

impl Events {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Idempotent per `Callback` instance and name.
    pub fn on(&self, name: impl Into<EventName>, callback: Callback) {
        self.subscribe(name, callback, Subscribe::default());
    }

    /// Register a handler with explicit options.
    pub fn subscribe(&self, name: impl Into<EventName>, callback: Callback, opts: Subscribe) {
        let name = name.into();
        let mut regs = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if regs
            .iter()
            .any(|r| r.name == name && r.callback.same(&callback))
        {
            return;
        }

        regs.push(Registration {
            name,
            callback,
            once: opts.once,
            protected: opts.protected,
        });
    }

    /// Register a handler that auto-removes after its first delivery.
    pub fn once(&self, name: impl Into<EventName>, callback: Callback) {
        self.subscribe(
            name,
            callback,
            Subscribe {
                once: true,
                ..Subscribe::default()
            },
        );
    }

    /// Remove registrations for a name.
    ///
    /// A bare topic removes every variant of that topic; a namespaced name
    /// removes only the exact variant. Protected registrations stay.
    pub fn off(&self, name: impl Into<EventName>) {
        let name = name.into();
        let mut regs = self.inner.write().unwrap_or_else(|e| e.into_inner());
        regs.retain(|r| r.protected || !matches(&r.name, &name));
    }

    /// Remove one specific handler registration, same fan-out rules as `off`.
    pub fn off_handler(&self, name: impl Into<EventName>, callback: &Callback) {
        let name = name.into();
        let mut regs = self.inner.write().unwrap_or_else(|e| e.into_inner());
        regs.retain(|r| r.protected || !(matches(&r.name, &name) && r.callback.same(callback)));
    }

    /// Deliver an event to every matching handler in registration order.
    ///
    /// A bare topic reaches every namespaced variant; a namespaced name
    /// reaches only the exact variant. Async handlers are awaited in order,
    /// so by the time `emit` returns, all listeners have fully run.
    pub async fn emit(&self, name: impl Into<EventName>, data: EventData) {
        let name = name.into();
        let selected: Vec<(EventName, Callback)> = {
            let mut regs = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let picked = regs
                .iter()
                .filter(|r| matches(&r.name, &name))
                .map(|r| (r.name.clone(), r.callback.clone()))
                .collect();
            regs.retain(|r| !(r.once && matches(&r.name, &name)));
            picked
        };

        for (reg_name, callback) in selected {
            let event = Event {
                name: reg_name,
                data: data.clone(),
            };
            match callback {
                Callback::Sync(f) => f(&event),
                Callback::Async(f) => f(event).await,
            }
        }
    }

    /// Drop every registration under a namespace, protected ones included.
    ///
    /// Used when a child is detached, so the parent's bubbling wiring does
    /// not outlive the attachment.
    pub(crate) fn purge_namespace(&self, namespace: &str) {
        let mut regs = self.inner.write().unwrap_or_else(|e| e.into_inner());
        regs.retain(|r| r.name.namespace() != Some(namespace));
    }

    /// Number of live registrations for a name, fan-out rules included.
    pub fn count(&self, name: impl Into<EventName>) -> usize {
        let name = name.into();
        let regs = self.inner.read().unwrap_or_else(|e| e.into_inner());
        regs.iter().filter(|r| matches(&r.name, &name)).count()
    }
}

/// Does a registration under `registered` receive traffic addressed to
/// `addressed`?
fn matches(registered: &EventName, addressed: &EventName) -> bool {
    if registered.topic != addressed.topic {
        return false;
    }
    match addressed.namespace() {
        Some(ns) => registered.namespace() == Some(ns),
        None => true,
    }
}
