//! # LogWriter: event tracer
//!
//! A minimal subscriber that traces every event it receives at `debug` level.
//! Subscribe it to the topics you want to watch.
//!
//! ## Example output
//! ```text
//! DEBUG subvisor: [new-name] seq=12 name="api.example.com" source="crt.sh" tag=cert
//! DEBUG subvisor: [resolved] seq=40 name="www.example.com" source="Brute Forcing" records=2
//! DEBUG subvisor: [new-subdomain] seq=41 name="dev.example.com" times=3
//! ```

use async_trait::async_trait;
use tracing::debug;

use crate::events::{Event, Topic};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let req = &e.request;
        match e.topic {
            Topic::NewName => {
                debug!(
                    seq = e.seq,
                    name = %req.name,
                    source = %req.source,
                    tag = %req.tag,
                    "[new-name]"
                );
            }
            Topic::NameResolved => {
                debug!(
                    seq = e.seq,
                    name = %req.name,
                    source = %req.source,
                    records = req.records.len(),
                    "[resolved]"
                );
            }
            Topic::NewSubdomain => {
                debug!(
                    seq = e.seq,
                    name = %req.name,
                    times = e.times.unwrap_or(0),
                    "[new-subdomain]"
                );
            }
        }
    }

    fn name(&self) -> &str {
        "LogWriter"
    }
}
