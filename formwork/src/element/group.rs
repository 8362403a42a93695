//! Composite element over an ordered, model-keyed set of children.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use futures::future::join_all;
use log::debug;

use crate::config::Config;
use crate::error::SchemaError;
use crate::event::{Callback, EventData, EventName, Events, Subscribe};
use crate::schema::{ElementSchema, GroupSchema, ItemSchema, TypeTag};
use crate::validation::{cascade_rules, ValidateOptions};
use crate::value::Value;

use super::base::{BaseParts, ElementBase};
use super::node::{ElementNode, WeakNode};
use super::TREE_NS;

/// How a group participates in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    /// A declared group.
    Plain,
    /// A repeatable collection item; identity is positional.
    Item,
    /// A collection's non-participating template.
    Template,
}

struct GroupInner {
    children: Vec<ElementNode>,
    /// Aggregate value, maintained on child events and nulled when invalid.
    value: Option<Value>,
}

/// A composite element holding named children.
///
/// Children live in an explicit ordered container keyed by model; the
/// aggregate value is a map of child values, nulled in its entirety while
/// any child is invalid. Cloning shares state.
#[derive(Clone)]
pub struct Group {
    base: ElementBase,
    decl: Arc<GroupSchema>,
    role: GroupRole,
    inner: Arc<RwLock<GroupInner>>,
}

/// Weak handle to a group, used for child-to-parent wiring.
#[derive(Clone)]
pub struct WeakGroup {
    base: ElementBase,
    decl: Arc<GroupSchema>,
    role: GroupRole,
    inner: Weak<RwLock<GroupInner>>,
}

impl WeakGroup {
    /// Upgrade back to a live handle, if the group is still alive.
    pub fn upgrade(&self) -> Option<Group> {
        self.inner.upgrade().map(|inner| Group {
            base: self.base.clone(),
            decl: self.decl.clone(),
            role: self.role,
            inner,
        })
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("form_id", &self.form_id())
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Group {
    pub(crate) fn build(
        schema: GroupSchema,
        parent: Option<WeakNode>,
        config: Arc<Config>,
    ) -> Result<Self, SchemaError> {
        Self::build_with_role(schema, parent, config, GroupRole::Plain)
    }

    pub(crate) fn build_with_role(
        schema: GroupSchema,
        parent: Option<WeakNode>,
        config: Arc<Config>,
        role: GroupRole,
    ) -> Result<Self, SchemaError> {
        let base = ElementBase::new(
            BaseParts {
                form_id: &schema.form_id,
                model: schema.model.as_deref(),
                rules: &schema.rules,
                props: &schema.props,
                on: &schema.on,
                options: schema.options,
                tag: TypeTag::Group,
            },
            parent,
            config,
        )?;

        let group = Self {
            base,
            decl: Arc::new(schema.clone()),
            role,
            inner: Arc::new(RwLock::new(GroupInner {
                children: Vec::new(),
                value: None,
            })),
        };

        for child_schema in schema.fields {
            group.attach_child(child_schema, None)?;
        }

        Ok(group)
    }

    /// Apply declared initial values across the children.
    pub(crate) async fn init(&self) {
        for child in self.children() {
            child.init().await;
        }
    }

    pub(crate) fn downgrade(&self) -> WeakGroup {
        WeakGroup {
            base: self.base.clone(),
            decl: self.decl.clone(),
            role: self.role,
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn node(&self) -> ElementNode {
        ElementNode::Group(self.clone())
    }

    /// Shared element state.
    pub fn base(&self) -> &ElementBase {
        &self.base
    }

    /// This group's role in the tree.
    pub fn role(&self) -> GroupRole {
        self.role
    }

    /// The group's id.
    ///
    /// Collection items derive theirs from the owning collection and their
    /// current position, so it changes when siblings are removed.
    pub fn form_id(&self) -> String {
        if self.role == GroupRole::Item {
            if let Some(ElementNode::Collection(collection)) = self.base.parent() {
                if let Some(index) = collection.position_of(self.base.uid()) {
                    return format!("{}{}", collection.form_id(), index);
                }
            }
        }
        self.base.form_id().to_string()
    }

    /// Current position within the owning collection, for items.
    pub fn index(&self) -> Option<usize> {
        match (self.role, self.base.parent()) {
            (GroupRole::Item, Some(ElementNode::Collection(collection))) => {
                collection.position_of(self.base.uid())
            }
            _ => None,
        }
    }

    /// Ordered snapshot of the children.
    pub fn children(&self) -> Vec<ElementNode> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .children
            .clone()
    }

    /// Look up a child by model.
    pub fn child(&self, model: &str) -> Option<ElementNode> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .children
            .iter()
            .find(|c| c.model() == model)
            .cloned()
    }

    /// The aggregate value: a map of child values while everything is
    /// valid, `Null` otherwise.
    pub fn value(&self) -> Value {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .clone()
            .unwrap_or(Value::Null)
    }

    /// Valid iff the own rules pass, nothing forced it invalid, and every
    /// child is valid.
    pub fn is_valid(&self) -> bool {
        !self.base.invalidated()
            && self.base.validation().valid()
            && !self.children().iter().any(|c| !c.valid())
    }

    /// Mark errors as user-visible; cascades to children unless told not to.
    pub fn shake(&self, cascade: bool) {
        self.base.shake();
        if cascade {
            for child in self.children() {
                child.shake(true);
            }
        }
    }

    /// Construct a child from its schema and splice it in.
    ///
    /// The group's own cascading rules are merged into the child schema
    /// first; a duplicate model is a structural error and nothing changes.
    pub async fn add_field(
        &self,
        schema: ElementSchema,
        at: Option<usize>,
    ) -> Result<ElementNode, SchemaError> {
        let child = self.attach_child(schema, at)?;
        child.init().await;
        Ok(child)
    }

    fn attach_child(
        &self,
        schema: ElementSchema,
        at: Option<usize>,
    ) -> Result<ElementNode, SchemaError> {
        let mut schema = schema;
        cascade_rules(&self.decl.rules, &mut schema);

        let child = self.base.config().registry().build(
            schema,
            Some(WeakNode::Group(self.downgrade())),
            self.base.config(),
        )?;

        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let model = child.model();
            if inner.children.iter().any(|c| c.model() == model) {
                return Err(SchemaError::DuplicateChild {
                    form_id: self.form_id(),
                    model,
                });
            }
            let index = at.unwrap_or(inner.children.len()).min(inner.children.len());
            inner.children.insert(index, child.clone());
        }

        wire_child(child.events(), WeakNode::Group(self.downgrade()));
        self.base.bump_structure();
        Ok(child)
    }

    /// Detach a child by id or model.
    ///
    /// Removing an absent child is a structural error. The child's bubbling
    /// wiring is purged so it does not leak into the detached subtree.
    pub async fn remove_field(&self, target: &str) -> Result<ElementNode, SchemaError> {
        let removed = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let index = inner
                .children
                .iter()
                .position(|c| c.form_id() == target || c.model() == target)
                .ok_or_else(|| SchemaError::UnknownChild {
                    form_id: self.form_id(),
                    target: target.to_string(),
                })?;
            inner.children.remove(index)
        };

        removed.events().purge_namespace(TREE_NS);
        self.base.bump_structure_by(removed.schema_generation() + 1);
        self.recompute_value();

        self.base
            .events()
            .emit(
                "fieldremoved",
                EventData::Removed {
                    parent: self.node(),
                    child: removed.clone(),
                },
            )
            .await;

        Ok(removed)
    }

    /// Recompute the aggregate from the current children.
    pub(crate) fn recompute_value(&self) {
        let children = self.children();
        let aggregate = if children.iter().any(|c| !c.valid()) {
            None
        } else {
            let mut map = BTreeMap::new();
            for child in &children {
                map.insert(child.model(), child.value());
            }
            Some(Value::Map(map))
        };
        self.inner.write().unwrap_or_else(|e| e.into_inner()).value = aggregate;
    }

    /// React to a child's `changed` event: refresh the aggregate, re-run own
    /// validation when silent, and bubble.
    pub(crate) async fn on_child_changed(&self, child: ElementNode) {
        self.base.pending().add("children");

        let old = self.value();
        self.recompute_value();

        if self.base.options().silent {
            self.validate(false).await;
        }

        let new = self.value();

        self.base
            .events()
            .emit(
                "fieldchanged",
                EventData::ChildChanged {
                    parent: self.node(),
                    child,
                },
            )
            .await;
        self.base
            .events()
            .emit(
                "changed",
                EventData::Changed {
                    element: self.node(),
                    old,
                    new,
                },
            )
            .await;
    }

    /// Delegate a keyed map of values to the matching children.
    ///
    /// Non-map input is a structural error; value shapes are pre-checked
    /// against the subtree before anything mutates. Keys with no matching
    /// child are ignored.
    pub async fn set_value(&self, value: Value) -> Result<Value, SchemaError> {
        let Value::Map(entries) = value else {
            return Err(SchemaError::InvalidValue {
                form_id: self.form_id(),
                expected: "an object value",
            });
        };

        let children = self.children();
        for (key, entry) in &entries {
            if let Some(child) = children.iter().find(|c| c.model() == *key) {
                child.check_shape(entry)?;
            }
        }

        let assignments: Vec<(ElementNode, Value)> = entries
            .into_iter()
            .filter_map(|(key, entry)| {
                children
                    .iter()
                    .find(|c| c.model() == key)
                    .map(|c| (c.clone(), entry))
            })
            .collect();

        let results = join_all(
            assignments
                .iter()
                .map(|(child, entry)| child.set_value(entry.clone())),
        )
        .await;
        for result in results {
            result?;
        }

        Ok(self.value())
    }

    /// Validate the subtree.
    ///
    /// With `cascade`, every child validates first (concurrently, no
    /// short-circuit); the group's own rules then run against the settled
    /// aggregate. The stored value ends up `Null` unless the whole subtree
    /// is valid. Overlapping calls race deliberately: the latest-started
    /// call commits the final state.
    pub async fn validate(&self, cascade: bool) -> bool {
        let token = self.base.begin_run();
        self.base
            .events()
            .emit("validate", EventData::Element(self.node()))
            .await;

        if cascade {
            let children = self.children();
            join_all(children.iter().map(|c| c.validate(true))).await;
            self.recompute_value();
        }

        let aggregate = self.value();
        let props = self.base.props().snapshot();

        let committed = Arc::new(AtomicBool::new(false));
        let guard = {
            let base = self.base.clone();
            let committed = committed.clone();
            move || {
                let won = base.try_commit(token);
                committed.store(won, Ordering::SeqCst);
                won
            }
        };
        self.base
            .validation()
            .validate_guarded(&aggregate, &props, ValidateOptions::default(), Some(&guard))
            .await;

        if committed.load(Ordering::SeqCst) {
            if !self.is_valid() {
                self.inner.write().unwrap_or_else(|e| e.into_inner()).value = None;
            }
            self.base.pending().clear("children");
        }

        self.base
            .events()
            .emit("validated", EventData::Element(self.node()))
            .await;

        debug!("group {} validated: {}", self.form_id(), self.is_valid());
        self.is_valid()
    }

    /// Reset every child, then the group's own state.
    pub fn reset(&self) {
        self.base.clean_up();
        for child in self.children() {
            child.reset();
        }
        self.base.validation().reset();
    }

    /// Clear every child, then the group's own interaction state.
    pub async fn clear(&self) {
        self.base.clean_up();
        let children = self.children();
        join_all(children.iter().map(|c| c.clear())).await;
    }

    /// Reconstruct the group's declaration with its live children and rules.
    pub fn schema(&self) -> Arc<ElementSchema> {
        let generation = self.schema_generation();
        self.base.cached_schema(generation, || {
            let mut decl = (*self.decl).clone();
            decl.rules = self.base.validation().to_schema();
            decl.fields = self
                .children()
                .iter()
                .map(|c| (*c.schema()).clone())
                .collect();
            ElementSchema::Group(decl)
        })
    }

    pub(crate) fn schema_generation(&self) -> u64 {
        self.base.validation().generation()
            + self.base.structure_generation()
            + self
                .children()
                .iter()
                .map(|c| c.schema_generation())
                .sum::<u64>()
    }

    /// This group's shape as a collection item template.
    pub(crate) fn to_item_schema(&self) -> ItemSchema {
        let schema = self.schema();
        let ElementSchema::Group(group) = (*schema).clone() else {
            return ItemSchema::new();
        };
        ItemSchema {
            fields: group.fields,
            rules: group.rules,
            props: group.props,
            on: group.on,
            options: group.options,
        }
    }
}

/// Subscribe a parent to a child's bubbling events, under the protected
/// tree namespace.
pub(crate) fn wire_child(child_events: &Events, parent: WeakNode) {
    let on_changed = {
        let parent = parent.clone();
        Callback::future(move |event| {
            let parent = parent.clone();
            Box::pin(async move {
                let Some(node) = parent.upgrade() else { return };
                let EventData::Changed { element: child, .. } = event.data else {
                    return;
                };
                match node {
                    ElementNode::Group(group) => group.on_child_changed(child).await,
                    ElementNode::Collection(collection) => {
                        collection.on_item_changed(child).await
                    }
                    ElementNode::Field(_) => {}
                }
            })
        })
    };
    child_events.subscribe(
        EventName::scoped("changed", TREE_NS),
        on_changed,
        Subscribe {
            protected: true,
            ..Subscribe::default()
        },
    );

    let on_validated = Callback::future(move |_event| {
        let parent = parent.clone();
        Box::pin(async move {
            let Some(node) = parent.upgrade() else { return };
            match node {
                ElementNode::Group(group) => group.recompute_value(),
                ElementNode::Collection(collection) => collection.recompute_value(),
                ElementNode::Field(_) => {}
            }
        })
    });
    child_events.subscribe(
        EventName::scoped("validated", TREE_NS),
        on_validated,
        Subscribe {
            protected: true,
            ..Subscribe::default()
        },
    );
}
