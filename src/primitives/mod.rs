//! Shared-state primitives: the permit pool bounding in-flight resolutions
//! and the deduplication filter. Each guards its own state; none is ever
//! locked together with another.

mod filter;
mod semaphore;

pub use filter::StringFilter;
pub use semaphore::{Permit, Semaphore};
