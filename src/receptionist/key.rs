//! `ServiceKey` and `Listing`: the receptionist's index and its snapshot type.

// Layer 1: Standard library imports
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

// Layer 3: Internal module imports
use crate::actor::ActorRef;
use crate::message::Message;

/// A typed key indexing the receptionist: equality is by *both* the string
/// id and the message type `M` (spec.md §3 `ServiceKey<M>`), so two actors
/// registered under the same string id but different message types never
/// collide.
pub struct ServiceKey<M: Message> {
    id: String,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Message> ServiceKey<M> {
    /// Build a key from a string id, e.g. `ServiceKey::<Work>::new("pool")`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            _marker: PhantomData,
        }
    }

    /// The key's string id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn type_id(&self) -> TypeId {
        TypeId::of::<M>()
    }
}

impl<M: Message> Clone for ServiceKey<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: Message> PartialEq for ServiceKey<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M: Message> Eq for ServiceKey<M> {}

impl<M: Message> fmt::Debug for ServiceKey<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKey").field("id", &self.id).finish()
    }
}

/// An immutable snapshot of the actors registered under a [`ServiceKey`] at
/// some point in time, carrying a monotonically increasing `generation`
/// (spec.md §3 `Listing<M>`).
#[derive(Debug)]
pub struct Listing<M: Message> {
    key_id: String,
    refs: Arc<Vec<ActorRef<M>>>,
    generation: u64,
}

impl<M: Message> Listing<M> {
    pub(crate) fn new(key_id: String, refs: Vec<ActorRef<M>>, generation: u64) -> Self {
        Self {
            key_id,
            refs: Arc::new(refs),
            generation,
        }
    }

    /// The service key's string id this listing was taken for.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The actors registered at the moment this listing was produced.
    pub fn refs(&self) -> &[ActorRef<M>] {
        &self.refs
    }

    /// The generation counter; strictly increases each time the listing changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if no actors are currently registered under the key.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl<M: Message> Clone for Listing<M> {
    fn clone(&self) -> Self {
        Self {
            key_id: self.key_id.clone(),
            refs: Arc::clone(&self.refs),
            generation: self.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Work;
    impl Message for Work {
        const MESSAGE_TYPE: &'static str = "work";
    }

    #[derive(Debug, Clone)]
    struct OtherWork;
    impl Message for OtherWork {
        const MESSAGE_TYPE: &'static str = "other-work";
    }

    #[test]
    fn test_keys_with_same_id_are_equal_regardless_of_message_type_param() {
        // PartialEq only compares the string id (the real key-space is
        // disambiguated by (TypeId, id) inside the receptionist's map).
        let a = ServiceKey::<Work>::new("pool");
        let b = ServiceKey::<Work>::new("pool");
        assert_eq!(a, b);
    }

    #[test]
    fn test_type_id_distinguishes_same_string_id() {
        let a = ServiceKey::<Work>::new("pool");
        let b = ServiceKey::<OtherWork>::new("pool");
        assert_ne!(a.type_id(), b.type_id());
    }

    #[test]
    fn test_empty_listing() {
        let listing = Listing::<Work>::new("pool".to_string(), Vec::new(), 0);
        assert!(listing.is_empty());
        assert_eq!(listing.generation(), 0);
    }
}
