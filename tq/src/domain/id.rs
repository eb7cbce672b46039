//! Message ID generation
//!
//! Generated IDs are UUIDv7 strings, optionally prefixed: `{prefix}-{uuid}`.
//! Example: `job-01943046-6f4e-7c3a-9a51-0d2c5c4a9b10`

use std::sync::atomic::{AtomicU64, Ordering};

use eyre::Result;

/// Source of unique message IDs
///
/// Injected into the queue so tests can use predictable IDs.
pub trait IdGenerator: Send + Sync {
    /// Produce an ID not handed out before by this generator
    fn generate(&self) -> Result<String>;
}

/// UUIDv7-backed generator (time ordered, negligible collision probability)
#[derive(Debug, Clone, Default)]
pub struct UuidIdGenerator {
    prefix: Option<String>,
}

impl UuidIdGenerator {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Generate IDs of the form `{slug(prefix)}-{uuid}`
    pub fn with_prefix(prefix: &str) -> Self {
        let slug = slugify(prefix);
        Self {
            prefix: (!slug.is_empty()).then_some(slug),
        }
    }
}

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> Result<String> {
        let uuid = uuid::Uuid::now_v7();
        Ok(match &self.prefix {
            Some(prefix) => format!("{}-{}", prefix, uuid),
            None => uuid.to_string(),
        })
    }
}

/// Counter-backed generator: `{prefix}-1`, `{prefix}-2`, ...
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> Result<String> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        if n == u64::MAX {
            return Err(eyre::eyre!("Sequential id space exhausted for prefix '{}'", self.prefix));
        }
        Ok(format!("{}-{}", self.prefix, n))
    }
}

/// Slugify a name for use in IDs
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
