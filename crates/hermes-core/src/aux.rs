//! The capability bundle ("aux") shared by handlers and plugins.
//!
//! Every plugin declares one fragment type through [`Plugin::Aux`]. The
//! middleware chain merges those fragments into a nested structure built from
//! [`AuxNil`] and [`AuxLayer`], one layer per plugin, in declared order:
//!
//! ```text
//! [A, B, C]  =>  AuxLayer<AuxLayer<AuxLayer<AuxNil, A>, B>, C>
//! ```
//!
//! Handlers see the concrete type and use [`AuxLayer::get`], which only
//! compiles when some plugin declares the requested fragment. Plugin hooks see
//! the bundle erased behind [`Capabilities`] and look fragments up by type.
//! When two plugins declare the same fragment type, erased lookup returns the
//! later-declared one.
//!
//! [`Plugin::Aux`]: crate::Plugin::Aux

use crate::error::{HermesError, HermesResult};
use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;

/// Type-erased view of a capability bundle.
pub trait Capabilities: Send + Sync + 'static {
    /// Looks up the fragment with the given type id.
    ///
    /// The outermost (last declared) layer is searched first.
    fn lookup(&self, type_id: TypeId) -> Option<&(dyn Any + Send + Sync)>;

    /// Returns the fragment type names in declared order.
    fn fragment_names(&self) -> Vec<&'static str>;
}

impl dyn Capabilities {
    /// Returns the fragment of type `T`, if any plugin provides it.
    pub fn find<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.lookup(TypeId::of::<T>())
            .and_then(|fragment| fragment.downcast_ref::<T>())
    }

    /// Returns `true` if a plugin provides a fragment of type `T`.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.lookup(TypeId::of::<T>()).is_some()
    }

    /// Returns the fragment of type `T` or an internal error naming it.
    pub fn require<T: Any + Send + Sync>(&self) -> HermesResult<&T> {
        self.find::<T>().ok_or_else(|| {
            HermesError::internal(format!("capability `{}` is not provided", type_name::<T>()))
        })
    }
}

/// The empty bundle, produced by a chain without plugins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuxNil;

impl Capabilities for AuxNil {
    fn lookup(&self, _type_id: TypeId) -> Option<&(dyn Any + Send + Sync)> {
        None
    }

    fn fragment_names(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// One plugin's fragment stacked on top of the fragments declared before it.
#[derive(Debug, Clone, Default)]
pub struct AuxLayer<Init, Last> {
    /// Fragments of the plugins declared earlier.
    pub init: Init,
    /// Fragment of the plugin declared last.
    pub last: Last,
}

impl<Init, Last> AuxLayer<Init, Last> {
    /// Stacks `last` on top of `init`.
    pub const fn new(init: Init, last: Last) -> Self {
        Self { init, last }
    }

    /// Typed access to a fragment.
    ///
    /// The index parameter is inferred; write `aux.get::<Db, _>()`. If two
    /// plugins declare the same fragment type the index becomes ambiguous and
    /// must be spelled out, or the erased [`Capabilities`] lookup used.
    pub fn get<T, I>(&self) -> &T
    where
        Self: Has<T, I>,
    {
        self.pick()
    }
}

impl<Init, Last> Capabilities for AuxLayer<Init, Last>
where
    Init: Capabilities,
    Last: Send + Sync + 'static,
{
    fn lookup(&self, type_id: TypeId) -> Option<&(dyn Any + Send + Sync)> {
        if type_id == TypeId::of::<Last>() {
            return Some(&self.last);
        }
        self.init.lookup(type_id)
    }

    fn fragment_names(&self) -> Vec<&'static str> {
        let mut names = self.init.fragment_names();
        names.push(type_name::<Last>());
        names
    }
}

/// Index marker: the fragment is in the outermost layer.
#[derive(Debug)]
pub enum Here {}

/// Index marker: the fragment is somewhere below the outermost layer.
#[derive(Debug)]
pub struct There<I>(PhantomData<I>);

/// Compile-time proof that a bundle contains a fragment of type `T` at index `I`.
pub trait Has<T, I> {
    /// Returns the fragment.
    fn pick(&self) -> &T;
}

impl<Init, T> Has<T, Here> for AuxLayer<Init, T> {
    fn pick(&self) -> &T {
        &self.last
    }
}

impl<Init, Last, T, I> Has<T, There<I>> for AuxLayer<Init, Last>
where
    Init: Has<T, I>,
{
    fn pick(&self) -> &T {
        self.init.pick()
    }
}
