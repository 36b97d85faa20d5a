//! Per-record logical version stamp.

use serde::{Deserialize, Serialize};

/// Logical version of a stored record.
///
/// `index` grows by exactly one on every save to the same key, whichever
/// replica performed it. The tag only answers "has this changed"; it is never
/// used to reject a concurrent write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ModificationTag {
    /// Owner generation, fixed for the lifetime of the record
    pub guid: String,
    /// Save counter within the generation
    pub index: u32,
}

impl ModificationTag {
    /// Fresh tag for a record that did not exist before.
    pub fn new() -> Self {
        Self { guid: uuid::Uuid::new_v4().to_string(), index: 0 }
    }

    /// Bump the save counter.
    ///
    /// A counter that would overflow starts a new generation instead, so the
    /// tag still reads as changed.
    pub fn increment(&mut self) {
        match self.index.checked_add(1) {
            Some(next) => self.index = next,
            None => *self = Self::new(),
        }
    }
}
