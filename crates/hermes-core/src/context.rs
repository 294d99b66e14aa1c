//! Invocation context types.
//!
//! A [`Context`] bundles everything one invocation works with: the request
//! view, the response controller, the capability bundle and the
//! per-invocation [`InvocationSlots`]. Handlers receive it with the concrete
//! bundle type; plugin hooks receive the erased [`HookContext`].

use crate::aux::Capabilities;
use crate::request::HandlerRequest;
use crate::response::HandlerResponse;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A unique identifier for each invocation, using UUID v7.
///
/// # Example
///
/// ```
/// use hermes_core::InvocationId;
///
/// let id = InvocationId::new();
/// println!("Invocation ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Creates a new time-ordered invocation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an `InvocationId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-keyed store for state that lives exactly as long as one invocation.
///
/// Plugins are shared by every invocation of a deployment, so they keep
/// per-request state here instead of in their own fields. One value per type
/// is stored; define a private newtype per plugin to avoid clashes.
///
/// # Example
///
/// ```
/// use hermes_core::InvocationSlots;
///
/// #[derive(Clone, Default)]
/// struct Seen(u32);
///
/// let slots = InvocationSlots::new();
/// slots.with_or_default(|seen: &mut Seen| seen.0 += 1);
/// slots.with_or_default(|seen: &mut Seen| seen.0 += 1);
/// assert_eq!(slots.get::<Seen>().map(|s| s.0), Some(2));
/// ```
#[derive(Default)]
pub struct InvocationSlots {
    entries: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
}

impl InvocationSlots {
    /// Creates an empty slot store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, returning the previous value of the same type.
    pub fn insert<T: Send + 'static>(&self, value: T) -> Option<T> {
        self.entries
            .lock()
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    /// Returns a clone of the stored value.
    pub fn get<T: Clone + Send + 'static>(&self) -> Option<T> {
        self.entries
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Runs `f` on the stored value, if present.
    ///
    /// The store is locked while `f` runs; `f` must not touch the slots again.
    pub fn with<T: Send + 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut entries = self.entries.lock();
        entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
            .map(f)
    }

    /// Runs `f` on the stored value, inserting `T::default()` first if absent.
    pub fn with_or_default<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default + Send + 'static,
    {
        let mut entries = self.entries.lock();
        let value = entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match value.downcast_mut::<T>() {
            Some(value) => f(value),
            // The entry is keyed by `TypeId::of::<T>()`, so the downcast holds.
            None => f(&mut T::default()),
        }
    }

    /// Removes and returns the stored value.
    pub fn remove<T: Send + 'static>(&self) -> Option<T> {
        self.entries
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// Returns `true` if a value of type `T` is stored.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.lock().contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for InvocationSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationSlots")
            .field("len", &self.len())
            .finish()
    }
}

/// Per-invocation context handed to handlers and plugin hooks.
///
/// `C` is the capability bundle. Handlers get the concrete bundle built by
/// the plugin chain; hooks get `dyn Capabilities` (see [`HookContext`]).
/// Cloning is cheap: every part sits behind an `Arc`.
pub struct Context<C: ?Sized> {
    id: InvocationId,
    request: Arc<HandlerRequest>,
    response: Arc<HandlerResponse>,
    aux: Arc<C>,
    slots: Arc<InvocationSlots>,
}

/// Context as seen by plugin hooks, with the bundle erased.
pub type HookContext = Context<dyn Capabilities>;

impl<C: ?Sized> Clone for Context<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            request: Arc::clone(&self.request),
            response: Arc::clone(&self.response),
            aux: Arc::clone(&self.aux),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<C: ?Sized> Context<C> {
    /// Creates a context from its parts.
    #[must_use]
    pub fn new(
        id: InvocationId,
        request: Arc<HandlerRequest>,
        response: Arc<HandlerResponse>,
        aux: Arc<C>,
        slots: Arc<InvocationSlots>,
    ) -> Self {
        Self {
            id,
            request,
            response,
            aux,
            slots,
        }
    }

    /// Returns the invocation ID.
    pub const fn id(&self) -> InvocationId {
        self.id
    }

    /// Returns the request view.
    pub fn request(&self) -> &HandlerRequest {
        &self.request
    }

    /// Returns the response controller.
    pub fn response(&self) -> &HandlerResponse {
        &self.response
    }

    /// Returns the capability bundle.
    pub fn aux(&self) -> &C {
        &self.aux
    }

    /// Returns the per-invocation slots.
    pub fn slots(&self) -> &InvocationSlots {
        &self.slots
    }
}

impl<C: Capabilities + ?Sized> Context<C> {
    /// Looks up a fragment by type, last declared plugin first.
    pub fn find<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.aux
            .lookup(TypeId::of::<T>())
            .and_then(|fragment| fragment.downcast_ref::<T>())
    }
}

impl<C: Capabilities> Context<C> {
    /// Returns the same context with the bundle erased, as hooks see it.
    #[must_use]
    pub fn erase(&self) -> HookContext {
        let aux: Arc<dyn Capabilities> = self.aux.clone();
        Context {
            id: self.id,
            request: Arc::clone(&self.request),
            response: Arc::clone(&self.response),
            aux,
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Context<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("completed", &self.response.is_completed())
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aux::{AuxLayer, AuxNil};
    use serde_json::json;

    fn context<C>(aux: C) -> Context<C> {
        Context::new(
            InvocationId::new(),
            Arc::new(HandlerRequest::new(json!({}), json!({}))),
            Arc::new(HandlerResponse::new(Box::new(|_| {}))),
            Arc::new(aux),
            Arc::new(InvocationSlots::new()),
        )
    }

    #[test]
    fn test_invocation_id_unique() {
        assert_ne!(InvocationId::new(), InvocationId::new());
    }

    #[test]
    fn test_invocation_id_display_is_uuid() {
        let id = InvocationId::new();
        assert_eq!(id.to_string().len(), 36);
        assert_eq!(InvocationId::from_uuid(*id.as_uuid()), id);
    }

    #[test]
    fn test_slots_insert_get_remove() {
        let slots = InvocationSlots::new();
        assert!(slots.is_empty());
        assert_eq!(slots.insert(5_u32), None);
        assert_eq!(slots.insert(7_u32), Some(5));
        assert_eq!(slots.get::<u32>(), Some(7));
        assert!(slots.contains::<u32>());
        assert_eq!(slots.remove::<u32>(), Some(7));
        assert!(!slots.contains::<u32>());
    }

    #[test]
    fn test_slots_with() {
        let slots = InvocationSlots::new();
        assert_eq!(slots.with(|v: &mut Vec<u8>| v.len()), None);
        slots.with_or_default(|v: &mut Vec<u8>| v.push(1));
        slots.with_or_default(|v: &mut Vec<u8>| v.push(2));
        assert_eq!(slots.with(|v: &mut Vec<u8>| v.clone()), Some(vec![1, 2]));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_erased_context_shares_parts() {
        let ctx = context(AuxLayer::new(AuxNil, 42_u64));
        ctx.slots().insert("hello");

        let hook = ctx.erase();
        assert_eq!(hook.id(), ctx.id());
        assert_eq!(hook.find::<u64>(), Some(&42));
        assert_eq!(hook.slots().get::<&str>(), Some("hello"));
        assert_eq!(ctx.find::<u64>(), Some(&42));
    }

    #[test]
    fn test_clone_is_shallow() {
        let ctx = context(AuxNil);
        let clone = ctx.clone();
        clone.slots().insert(1_i32);
        assert_eq!(ctx.slots().get::<i32>(), Some(1));
    }
}
