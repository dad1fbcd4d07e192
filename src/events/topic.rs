use std::fmt;

/// Topics carried by the [`EventBus`](crate::events::EventBus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A freshly generated or scraped candidate, not yet resolved.
    NewName,
    /// A candidate that resolved and passed wildcard filtering.
    NameResolved,
    /// A name confirmed as a genuinely new subdomain, with a running discovery count.
    NewSubdomain,
}

impl Topic {
    /// All topics, in pipeline order.
    pub const ALL: [Topic; 3] = [Topic::NewName, Topic::NameResolved, Topic::NewSubdomain];

    /// Stable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::NewName => "new_name",
            Topic::NameResolved => "name_resolved",
            Topic::NewSubdomain => "new_subdomain",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
