//! Run coordination.
//!
//! The only public entry points are [`Enumeration`] and its
//! [`EnumerationBuilder`].
//!
//! Internal modules:
//! - [`builder`]: bus wiring and service construction;
//! - [`enumeration`]: start, idle detection, graceful shutdown;
//! - [`shutdown`]: OS termination signals.

mod builder;
mod enumeration;
mod shutdown;

pub use builder::EnumerationBuilder;
pub use enumeration::Enumeration;
