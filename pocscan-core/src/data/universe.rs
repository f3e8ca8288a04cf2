//! Universe configuration: named groups of ticker symbols.
//!
//! Stored as TOML with a single `[groups]` table mapping group names to symbol
//! lists. Group order in the file is preserved. A symbol listed in several groups
//! becomes one instrument carrying every membership.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Instrument;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("universe has no symbols")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Universe {
    pub groups: IndexMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        let universe: Universe = toml::from_str(content)?;
        if universe.symbol_count() == 0 {
            return Err(UniverseError::Empty);
        }
        Ok(universe)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Flatten into instruments in first-seen order, merging memberships.
    pub fn instruments(&self) -> Vec<Instrument> {
        let mut index: IndexMap<&str, Instrument> = IndexMap::new();
        for (group, symbols) in &self.groups {
            for symbol in symbols {
                let symbol = symbol.trim();
                if symbol.is_empty() {
                    continue;
                }
                index
                    .entry(symbol)
                    .and_modify(|inst| inst.add_group(group))
                    .or_insert_with(|| Instrument::new(symbol, group.as_str()));
            }
        }
        index.into_values().collect()
    }

    /// Restrict to the named groups (unknown names are ignored).
    pub fn select_groups(&self, names: &[String]) -> Universe {
        Universe {
            groups: self
                .groups
                .iter()
                .filter(|(name, _)| names.iter().any(|n| n == *name))
                .map(|(name, symbols)| (name.clone(), symbols.clone()))
                .collect(),
        }
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Symbol entries across all groups, duplicates included.
    pub fn symbol_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Built-in universe: major index constituents, European blue chips, futures and crypto.
    pub fn default_markets() -> Self {
        let group = |symbols: &[&str]| symbols.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut groups = IndexMap::new();

        groups.insert(
            "S&P 500".to_string(),
            group(&[
                "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "BRK-B", "AVGO", "JPM", "LLY",
                "V", "XOM", "UNH", "MA", "COST", "HD", "PG", "JNJ", "WMT", "NFLX",
            ]),
        );
        groups.insert(
            "NASDAQ 100".to_string(),
            group(&[
                "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "AVGO", "COST", "NFLX", "AMD",
                "ADBE", "PEP", "CSCO", "TMUS", "INTC", "QCOM", "TXN", "AMGN", "ISRG", "BKNG",
            ]),
        );
        groups.insert(
            "DAX".to_string(),
            group(&[
                "SAP.DE", "SIE.DE", "ALV.DE", "DTE.DE", "MUV2.DE", "AIR.DE", "MBG.DE", "BMW.DE",
                "BAS.DE", "IFX.DE",
            ]),
        );
        groups.insert(
            "FTSE MIB".to_string(),
            group(&[
                "ENEL.MI", "ISP.MI", "UCG.MI", "ENI.MI", "STLAM.MI", "RACE.MI", "G.MI", "STM.MI",
            ]),
        );
        groups.insert(
            "CAC 40".to_string(),
            group(&["MC.PA", "OR.PA", "TTE.PA", "SAN.PA", "AIR.PA", "BNP.PA", "SU.PA", "AI.PA"]),
        );
        groups.insert(
            "Other".to_string(),
            group(&["^GSPC", "^NDX", "^GDAXI", "GC=F", "SI=F", "CL=F", "BTC-USD", "ETH-USD"]),
        );

        Self { groups }
    }
}
