//! State shared by every node in the element tree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::config::{Config, Options};
use crate::error::SchemaError;
use crate::event::Events;
use crate::pending::Pending;
use crate::props::Props;
use crate::schema::{ElementSchema, HandlerSchema, PropSchema, RuleSchema, TypeTag};
use crate::validation::{normalize_rules, Validation};
use crate::value::Value;

use super::node::{ElementNode, WeakNode};

#[derive(Debug, Default)]
struct BaseState {
    shaked: bool,
    /// Forced invalidation, independent of the validation: `Some(message)`.
    forced: Option<Option<String>>,
}

/// Constructor inputs common to every element kind.
pub(crate) struct BaseParts<'a> {
    pub form_id: &'a str,
    pub model: Option<&'a str>,
    pub rules: &'a [RuleSchema],
    pub props: &'a [(String, PropSchema)],
    pub on: &'a [HandlerSchema],
    pub options: Option<Options>,
    pub tag: TypeTag,
}

/// The state every element kind shares: identity, parent linkage, options,
/// props, events, the owned validation, interaction flags and the caches
/// that keep `schema()` stable.
///
/// Cloning shares all mutable state; a clone is another handle onto the same
/// element.
#[derive(Clone)]
pub struct ElementBase {
    uid: Uuid,
    form_id: String,
    model: String,
    parent: Option<Box<WeakNode>>,
    config: Arc<Config>,
    options: Options,
    props: Props,
    events: Events,
    validation: Validation,
    state: Arc<RwLock<BaseState>>,
    pending: Pending,
    run_counter: Arc<AtomicU64>,
    committed: Arc<AtomicU64>,
    structure_gen: Arc<AtomicU64>,
    schema_cache: Arc<RwLock<Option<(u64, Arc<ElementSchema>)>>>,
}

impl std::fmt::Debug for ElementBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementBase")
            .field("uid", &self.uid)
            .field("form_id", &self.form_id)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ElementBase {
    pub(crate) fn new(
        parts: BaseParts<'_>,
        parent: Option<WeakNode>,
        config: Arc<Config>,
    ) -> Result<Self, SchemaError> {
        let options = parts.options.unwrap_or_else(|| config.options());

        let props = Props::new();
        for (name, prop) in parts.props {
            match prop {
                PropSchema::Plain(value) => props.set(name.clone(), value.clone()),
                PropSchema::Derived(compute) => props.derive(name.clone(), compute.clone()),
            }
        }

        let events = Events::new();
        for handler in parts.on {
            events.on(handler.event.clone(), handler.callback.clone());
        }

        let validation = Validation::from_schemas(normalize_rules(parts.rules, parts.tag))?;

        Ok(Self {
            uid: Uuid::new_v4(),
            form_id: parts.form_id.to_string(),
            model: parts
                .model
                .map(str::to_string)
                .unwrap_or_else(|| parts.form_id.to_string()),
            parent: parent.map(Box::new),
            config,
            options,
            props,
            events,
            validation,
            state: Arc::new(RwLock::new(BaseState::default())),
            pending: Pending::new(),
            run_counter: Arc::new(AtomicU64::new(0)),
            committed: Arc::new(AtomicU64::new(0)),
            structure_gen: Arc::new(AtomicU64::new(0)),
            schema_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Stable instance identity, shared by every handle onto this element.
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// The declared id.
    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    /// The display/binding key.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The merged element options.
    pub fn options(&self) -> Options {
        self.options
    }

    /// The owning configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The element's user-defined properties.
    pub fn props(&self) -> &Props {
        &self.props
    }

    /// The element's event channel.
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// The owned validation.
    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    /// The in-flight operation tracker.
    pub fn pending(&self) -> &Pending {
        &self.pending
    }

    /// The parent element, if attached and still alive.
    pub fn parent(&self) -> Option<ElementNode> {
        self.parent.as_ref().and_then(|parent| parent.upgrade())
    }

    /// Ancestor path, root first.
    pub fn ancestors(&self) -> Vec<ElementNode> {
        let mut path = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            path.push(node);
        }
        path.reverse();
        path
    }

    /// Own-props lookup by dotted path.
    pub fn prop(&self, path: &str) -> Option<Value> {
        self.props.get_path(path)
    }

    /// Props lookup walking up through ancestors on a miss.
    pub fn prop_up(&self, path: &str) -> Option<Value> {
        self.prop(path)
            .or_else(|| self.parent().and_then(|p| p.prop_up(path)))
    }

    /// Mark the element as having surfaced its errors to the user.
    pub fn shake(&self) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).shaked = true;
    }

    /// Whether the element has been shaken.
    pub fn shaked(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).shaked
    }

    /// Force the element invalid independent of its validation.
    pub fn invalidate(&self, message: Option<String>) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).forced = Some(message);
    }

    /// Whether a forced invalidation is active.
    pub fn invalidated(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .forced
            .is_some()
    }

    /// Clear the shaken flag and any forced invalidation.
    pub fn clean_up(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.shaked = false;
        state.forced = None;
    }

    /// The user-visible error, given the element's overall validity.
    ///
    /// `None` unless shaken and invalid; a forced invalidation message wins
    /// over rule errors.
    pub fn error_with(&self, valid: bool) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if !state.shaked || valid {
            return None;
        }
        if let Some(forced) = &state.forced {
            return Some(
                forced
                    .clone()
                    .unwrap_or_else(|| "invalidated".to_string()),
            );
        }
        self.validation.errors().and_then(|errors| errors.first().cloned())
    }

    // -------------------------------------------------------------------------
    // Overlapping-validate arbitration
    // -------------------------------------------------------------------------

    /// Take a token for a new validation run. Higher token = later start.
    pub(crate) fn begin_run(&self) -> u64 {
        self.run_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Try to commit observable state for a run.
    ///
    /// The latest-started run wins: once it commits, earlier runs that settle
    /// afterwards are refused.
    pub(crate) fn try_commit(&self, token: u64) -> bool {
        self.committed.fetch_max(token, Ordering::SeqCst) <= token
    }

    // -------------------------------------------------------------------------
    // Schema reconstruction cache
    // -------------------------------------------------------------------------

    /// Bump on any structural mutation (child added/removed, template edit).
    pub(crate) fn bump_structure(&self) {
        self.structure_gen.fetch_add(1, Ordering::SeqCst);
    }

    /// Bump by a given amount; used when detaching a child so the combined
    /// schema generation stays monotonic without the child's share.
    pub(crate) fn bump_structure_by(&self, amount: u64) {
        self.structure_gen.fetch_add(amount, Ordering::SeqCst);
    }

    pub(crate) fn structure_generation(&self) -> u64 {
        self.structure_gen.load(Ordering::SeqCst)
    }

    /// Return the cached schema if `generation` still matches, else rebuild.
    ///
    /// Repeated calls with no mutation in between return the same `Arc`.
    pub(crate) fn cached_schema(
        &self,
        generation: u64,
        build: impl FnOnce() -> ElementSchema,
    ) -> Arc<ElementSchema> {
        {
            let cache = self.schema_cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some((cached_gen, schema)) = cache.as_ref() {
                if *cached_gen == generation {
                    return schema.clone();
                }
            }
        }

        let built = Arc::new(build());
        let mut cache = self.schema_cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = Some((generation, built.clone()));
        built
    }
}
