//! Pipeline events: data model and topic-keyed bus.
//!
//! ## Contents
//! - [`Request`], [`DnsAnswer`], [`RecordType`], [`Tag`]: the discovered-name record
//! - [`Topic`], [`Event`]: what is published and on which channel
//! - [`EventBus`]: the publish/subscribe hub
//!
//! ## Quick reference
//! - **`NewName`**: published by intelligence sources, consumed by the name service.
//! - **`NameResolved`**: published by the brute-force engine and the name service,
//!   consumed by the brute-force engine (immediate recursion), the name service
//!   (subdomain counting) and the run coordinator (results).
//! - **`NewSubdomain`**: published by the name service, consumed by the
//!   brute-force engine (threshold-gated recursion).

mod bus;
mod event;
mod request;
mod topic;

pub use bus::EventBus;
pub use event::Event;
pub use request::{DnsAnswer, RecordType, Request, Tag};
pub use topic::Topic;
