//! Alert snapshot

use serde::{Deserialize, Serialize};

/// Named boolean results of one evaluation, in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub entries: Vec<(String, bool)>,
}

impl AlertSnapshot {
    pub fn new(entries: Vec<(String, bool)>) -> Self {
        Self { entries }
    }

    /// True iff the snapshot is non-empty and every entry holds.
    pub fn all_true(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|(_, v)| *v)
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for AlertSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}={}", if *value { "on" } else { "off" })?;
        }
        Ok(())
    }
}
