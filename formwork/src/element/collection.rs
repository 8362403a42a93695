//! Composite element over a dynamically sized list of repeatable items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use futures::future::join_all;
use log::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::error::SchemaError;
use crate::event::EventData;
use crate::schema::{CollectionSchema, ElementSchema, GroupSchema, TypeTag};
use crate::validation::{cascade_rule_set, ValidateOptions};
use crate::value::Value;

use super::base::{BaseParts, ElementBase};
use super::group::{wire_child, Group, GroupRole};
use super::node::{ElementNode, WeakNode};
use super::TREE_NS;

/// Targeting options for [`Collection::set_value_with`].
#[derive(Debug, Clone, Copy)]
pub struct SetListOptions {
    /// First item offset the incoming entries map onto.
    pub from: usize,
    /// Create new items for entries beyond the existing ones.
    pub auto_add: bool,
}

impl Default for SetListOptions {
    fn default() -> Self {
        Self {
            from: 0,
            auto_add: true,
        }
    }
}

struct CollectionInner {
    groups: Vec<Group>,
    /// Aggregate value, maintained on item events and nulled when invalid.
    value: Option<Value>,
    /// Template item: never validates, only carries the current item shape.
    dummy: Option<Group>,
}

/// A composite element holding an ordered list of repeatable group items.
///
/// All items share one schema, held by a non-participating template; the
/// aggregate value is an array of item values, nulled in its entirety while
/// any item is invalid. Cloning shares state.
#[derive(Clone)]
pub struct Collection {
    base: ElementBase,
    decl: Arc<CollectionSchema>,
    inner: Arc<RwLock<CollectionInner>>,
}

/// Weak handle to a collection, used for item-to-parent wiring.
#[derive(Clone)]
pub struct WeakCollection {
    base: ElementBase,
    decl: Arc<CollectionSchema>,
    inner: Weak<RwLock<CollectionInner>>,
}

impl WeakCollection {
    /// Upgrade back to a live handle, if the collection is still alive.
    pub fn upgrade(&self) -> Option<Collection> {
        self.inner.upgrade().map(|inner| Collection {
            base: self.base.clone(),
            decl: self.decl.clone(),
            inner,
        })
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("form_id", &self.form_id())
            .finish_non_exhaustive()
    }
}

impl Collection {
    pub(crate) fn build(
        schema: CollectionSchema,
        parent: Option<WeakNode>,
        config: Arc<Config>,
    ) -> Result<Self, SchemaError> {
        let base = ElementBase::new(
            BaseParts {
                form_id: &schema.form_id,
                model: schema.model.as_deref(),
                rules: &schema.rules,
                props: &schema.props,
                on: &schema.on,
                options: schema.options,
                tag: TypeTag::Collection,
            },
            parent,
            config,
        )?;

        let collection = Self {
            base,
            decl: Arc::new(schema),
            inner: Arc::new(RwLock::new(CollectionInner {
                groups: Vec::new(),
                value: None,
                dummy: None,
            })),
        };

        let dummy = collection.build_item(GroupRole::Template)?;
        collection
            .inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .dummy = Some(dummy);

        Ok(collection)
    }

    pub(crate) fn downgrade(&self) -> WeakCollection {
        WeakCollection {
            base: self.base.clone(),
            decl: self.decl.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn node(&self) -> ElementNode {
        ElementNode::Collection(self.clone())
    }

    /// Shared element state.
    pub fn base(&self) -> &ElementBase {
        &self.base
    }

    /// The collection's id.
    pub fn form_id(&self) -> String {
        self.base.form_id().to_string()
    }

    /// Ordered snapshot of the items.
    pub fn groups(&self) -> Vec<Group> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .groups
            .clone()
    }

    /// The non-participating template item.
    pub fn dummy(&self) -> Option<Group> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .dummy
            .clone()
    }

    /// Current position of an item, by instance identity.
    pub(crate) fn position_of(&self, uid: Uuid) -> Option<usize> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .groups
            .iter()
            .position(|g| g.base().uid() == uid)
    }

    /// The aggregate value: an array of item values while everything is
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
    /// item is valid. The template never participates.
    pub fn is_valid(&self) -> bool {
        !self.base.invalidated()
            && self.base.validation().valid()
            && !self.groups().iter().any(|g| !g.is_valid())
    }

    /// Mark errors as user-visible; cascades to items unless told not to.
    pub fn shake(&self, cascade: bool) {
        self.base.shake();
        if cascade {
            for group in self.groups() {
                group.shake(true);
            }
        }
    }

    /// Build a fresh item from the current template shape, with the
    /// collection's cascading rules merged in.
    fn build_item(&self, role: GroupRole) -> Result<Group, SchemaError> {
        let template = match self.dummy() {
            Some(dummy) => dummy.to_item_schema(),
            None => self.decl.group.clone(),
        };

        let group_schema = GroupSchema {
            form_id: String::new(),
            model: None,
            fields: template.fields,
            rules: cascade_rule_set(&self.decl.rules, template.rules),
            props: template.props,
            on: template.on,
            options: template.options,
        };

        Group::build_with_role(
            group_schema,
            Some(WeakNode::Collection(self.downgrade())),
            self.base.config().clone(),
            role,
        )
    }

    /// Append a new item built from the item schema.
    ///
    /// Resolves only once the item has completed its initial-value pass, so
    /// callers can rely on it being fully initialized.
    pub async fn add_group(&self) -> Result<Group, SchemaError> {
        let item = self.build_item(GroupRole::Item)?;

        wire_child(item.base().events(), WeakNode::Collection(self.downgrade()));
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .groups
            .push(item.clone());
        self.base.bump_structure();

        ElementNode::Group(item.clone()).init().await;

        debug!("collection {} added item {}", self.form_id(), item.form_id());
        Ok(item)
    }

    /// Remove the item at an index.
    ///
    /// Subsequent items' derived ids update automatically, since identity is
    /// positional. Emits `groupremoved` and the collection-changed flow.
    pub async fn remove_group(&self, index: usize) -> Result<Group, SchemaError> {
        let old = self.value();

        let removed = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            if index >= inner.groups.len() {
                return Err(SchemaError::UnknownItem {
                    form_id: self.form_id(),
                    index,
                });
            }
            inner.groups.remove(index)
        };

        removed.base().events().purge_namespace(TREE_NS);
        self.base.bump_structure_by(removed.schema_generation() + 1);
        self.recompute_value();

        self.base
            .events()
            .emit(
                "groupremoved",
                EventData::Removed {
                    parent: self.node(),
                    child: ElementNode::Group(removed.clone()),
                },
            )
            .await;

        if self.base.options().silent {
            self.validate(false).await;
        }

        let new = self.value();
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

        Ok(removed)
    }

    /// Remove an item by handle.
    pub async fn remove_item(&self, item: &Group) -> Result<Group, SchemaError> {
        let index =
            self.position_of(item.base().uid())
                .ok_or_else(|| SchemaError::UnknownChild {
                    form_id: self.form_id(),
                    target: item.base().uid().to_string(),
                })?;
        self.remove_group(index).await
    }

    /// Add a field to the template and to every existing item.
    pub async fn add_field(
        &self,
        schema: ElementSchema,
        at: Option<usize>,
    ) -> Result<Vec<ElementNode>, SchemaError> {
        if let Some(dummy) = self.dummy() {
            dummy.add_field(schema.clone(), at).await?;
        }

        let mut added = Vec::new();
        for group in self.groups() {
            added.push(group.add_field(schema.clone(), at).await?);
        }

        self.base.bump_structure();
        Ok(added)
    }

    /// Remove a field from the template and from every existing item.
    pub async fn remove_field(&self, target: &str) -> Result<Vec<ElementNode>, SchemaError> {
        if let Some(dummy) = self.dummy() {
            dummy.remove_field(target).await?;
        }

        let mut removed = Vec::new();
        for group in self.groups() {
            removed.push(group.remove_field(target).await?);
        }

        self.base.bump_structure();
        Ok(removed)
    }

    /// Recompute the aggregate from the current items.
    pub(crate) fn recompute_value(&self) {
        let groups = self.groups();
        let aggregate = if groups.iter().any(|g| !g.is_valid()) {
            None
        } else {
            Some(Value::List(groups.iter().map(Group::value).collect()))
        };
        self.inner.write().unwrap_or_else(|e| e.into_inner()).value = aggregate;
    }

    /// React to an item's `changed` event: refresh the aggregate, re-run own
    /// validation when silent, and bubble.
    pub(crate) async fn on_item_changed(&self, child: ElementNode) {
        self.base.pending().add("items");

        let old = self.value();
        self.recompute_value();

        if self.base.options().silent {
            self.validate(false).await;
        }

        let new = self.value();

        self.base
            .events()
            .emit(
                "groupchanged",
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

    /// Delegate a list of item values, reusing or creating items.
    pub async fn set_value(&self, value: Value) -> Result<Value, SchemaError> {
        self.set_value_with(value, SetListOptions::default()).await
    }

    /// Delegate a list of item values with explicit targeting.
    ///
    /// Entries map onto existing items starting at `from`; the surplus
    /// creates new items when `auto_add`, and is dropped otherwise.
    pub async fn set_value_with(
        &self,
        value: Value,
        opts: SetListOptions,
    ) -> Result<Value, SchemaError> {
        let Value::List(entries) = value else {
            return Err(SchemaError::InvalidValue {
                form_id: self.form_id(),
                expected: "an array value",
            });
        };

        for entry in &entries {
            if !matches!(entry, Value::Map(_)) {
                return Err(SchemaError::InvalidValue {
                    form_id: self.form_id(),
                    expected: "an object value per item",
                });
            }
        }

        let existing = self.groups().len().saturating_sub(opts.from);
        let limit = if opts.auto_add {
            entries.len()
        } else {
            existing.min(entries.len())
        };

        for (offset, entry) in entries.into_iter().take(limit).enumerate() {
            let target = {
                let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
                inner.groups.get(opts.from + offset).cloned()
            };
            match target {
                Some(group) => {
                    group.set_value(entry).await?;
                }
                None => {
                    let group = self.add_group().await?;
                    group.set_value(entry).await?;
                }
            }
        }

        Ok(self.value())
    }

    /// Validate the subtree.
    ///
    /// With `cascade`, every item validates first (concurrently, no
    /// short-circuit); the collection's own rules then run against the
    /// settled aggregate. The stored value ends up `Null` unless the whole
    /// subtree is valid. Overlapping calls race deliberately: the
    /// latest-started call commits the final state.
    pub async fn validate(&self, cascade: bool) -> bool {
        let token = self.base.begin_run();
        self.base
            .events()
            .emit("validate", EventData::Element(self.node()))
            .await;

        if cascade {
            let groups = self.groups();
            join_all(groups.iter().map(|g| g.validate(true))).await;
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
            self.base.pending().clear("items");
        }

        self.base
            .events()
            .emit("validated", EventData::Element(self.node()))
            .await;

        debug!(
            "collection {} validated: {}",
            self.form_id(),
            self.is_valid()
        );
        self.is_valid()
    }

    /// Reset every item, then the collection's own state.
    pub fn reset(&self) {
        self.base.clean_up();
        for group in self.groups() {
            group.reset();
        }
        self.base.validation().reset();
    }

    /// Clear every item, then the collection's own interaction state.
    pub async fn clear(&self) {
        self.base.clean_up();
        let groups = self.groups();
        join_all(groups.iter().map(|g| g.clear())).await;
    }

    /// Reconstruct the collection's declaration with its live rules and the
    /// current item shape.
    pub fn schema(&self) -> Arc<ElementSchema> {
        let generation = self.schema_generation();
        self.base.cached_schema(generation, || {
            let mut decl = (*self.decl).clone();
            decl.rules = self.base.validation().to_schema();
            decl.group = match self.groups().first() {
                Some(first) => first.to_item_schema(),
                None => match self.dummy() {
                    Some(dummy) => dummy.to_item_schema(),
                    None => decl.group,
                },
            };
            ElementSchema::Collection(decl)
        })
    }

    pub(crate) fn schema_generation(&self) -> u64 {
        self.base.validation().generation()
            + self.base.structure_generation()
            + self.dummy().map(|d| d.schema_generation()).unwrap_or(0)
            + self
                .groups()
                .iter()
                .map(Group::schema_generation)
                .sum::<u64>()
    }
}
