//! Receptionist: system-wide `ServiceKey -> Listing` discovery (spec.md §4.5).
//!
//! Actors register themselves under a [`ServiceKey`] instead of being looked
//! up by path; routers, topics, and application code subscribe to the
//! resulting [`Listing`] to react as registrants come and go, without
//! depending on any fixed actor path.

mod error;
mod key;
mod registry;

pub use error::ReceptionistError;
pub use key::{Listing, ServiceKey};
pub use registry::Receptionist;
