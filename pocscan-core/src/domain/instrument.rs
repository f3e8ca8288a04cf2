//! Instrument: a screenable symbol and the universe groups it belongs to.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    /// Group names in first-seen order, without duplicates.
    pub groups: Vec<String>,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            groups: vec![group.into()],
        }
    }

    /// Record membership in another group; repeated names are ignored.
    pub fn add_group(&mut self, group: &str) {
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
    }

    /// Membership rendered for tabular output, e.g. `"sp500, nasdaq100"`.
    pub fn membership(&self) -> String {
        self.groups.join(", ")
    }
}
