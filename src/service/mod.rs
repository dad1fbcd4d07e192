//! Service lifecycle shared by every producer and consumer.
//!
//! - [`ServiceState`], [`Lifecycle`]: state machine, stop token, pause signal
//! - [`ServiceBase`]: composition block embedded by concrete services
//! - [`Service`]: the capability set {start, pause, resume, stop, active, stats}

mod base;
mod lifecycle;
mod service;

pub use base::ServiceBase;
pub use lifecycle::{Lifecycle, ServiceState};
pub use service::Service;
