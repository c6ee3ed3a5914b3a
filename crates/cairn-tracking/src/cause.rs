//! Named causes.
//!
//! A [`NamedCause`] explains why a mutation happened: the entity that died,
//! the chunk being populated, the phase being unwound. Values are arbitrary
//! `'static` types behind an `Rc<dyn Any>` so that lookups can ask for "the
//! first cause that is an `EntityId`" without the context knowing every
//! possible cause type up front.

use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;

/// Well-known cause names.
pub mod keys {
    /// The direct source of the operation (dying entity, populated chunk).
    pub const SOURCE: &str = "Source";
    /// Chunk column being generated.
    pub const CHUNK_POS: &str = "ChunkPos";
    /// Name of the generator populating a chunk.
    pub const CHUNK_PROVIDER: &str = "ChunkProvider";
    /// The block whose neighbour update triggered a notification.
    pub const NOTIFIER: &str = "Notifier";
    /// The phase state currently being unwound.
    pub const UNWINDING_STATE: &str = "UnwindingState";
    /// The context of the phase currently being unwound.
    pub const UNWINDING_CONTEXT: &str = "UnwindingContext";
}

/// A cause value paired with its name.
///
/// Cloning is cheap: the value is shared.
#[derive(Clone)]
pub struct NamedCause {
    name: String,
    value: Rc<dyn Any>,
    type_name: &'static str,
}

impl NamedCause {
    pub fn of<T: Any>(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: Rc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Shorthand for a cause named [`keys::SOURCE`].
    pub fn source<T: Any>(value: T) -> Self {
        Self::of(keys::SOURCE, value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value, if it is a `T`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }

    /// Rust type name of the stored value, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for NamedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_name)
    }
}
