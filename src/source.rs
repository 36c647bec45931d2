//! Date keys and the catalog mapping each key to its trip-start CSV.
//!
//! The built-in catalog points at the January 1-5, 2019 samples. A JSON file
//! can override any subset of keys:
//! ```json
//! {
//!   "1": "https://mirror.example/20190101.csv",
//!   "3": "data/20190103.csv.gz"
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{PipelineError, Result};

const BUILTIN_SOURCES: [(DateKey, &str); 5] = [
    (
        DateKey::Jan1,
        "https://raw.githubusercontent.com/Maplub/odsample/master/20190101.csv",
    ),
    (
        DateKey::Jan2,
        "https://raw.githubusercontent.com/Maplub/odsample/master/20190102.csv",
    ),
    (
        DateKey::Jan3,
        "https://raw.githubusercontent.com/Maplub/odsample/master/20190103.csv",
    ),
    (
        DateKey::Jan4,
        "https://raw.githubusercontent.com/Maplub/odsample/master/20190104.csv",
    ),
    (
        DateKey::Jan5,
        "https://raw.githubusercontent.com/Maplub/odsample/master/20190105.csv",
    ),
];

/// Which day's dataset to load. Selected by the text `"1"` through `"5"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateKey {
    Jan1,
    Jan2,
    Jan3,
    Jan4,
    Jan5,
}

impl DateKey {
    pub const ALL: [DateKey; 5] = [
        DateKey::Jan1,
        DateKey::Jan2,
        DateKey::Jan3,
        DateKey::Jan4,
        DateKey::Jan5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DateKey::Jan1 => "1",
            DateKey::Jan2 => "2",
            DateKey::Jan3 => "3",
            DateKey::Jan4 => "4",
            DateKey::Jan5 => "5",
        }
    }
}

impl FromStr for DateKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(DateKey::Jan1),
            "2" => Ok(DateKey::Jan2),
            "3" => Ok(DateKey::Jan3),
            "4" => Ok(DateKey::Jan4),
            "5" => Ok(DateKey::Jan5),
            other => Err(PipelineError::UnrecognizedSelector(other.to_string())),
        }
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps every [`DateKey`] to exactly one source location (URL or local path).
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    entries: BTreeMap<DateKey, String>,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SourceCatalog {
    /// The five fixed January 2019 sources.
    pub fn builtin() -> Self {
        let entries = BUILTIN_SOURCES
            .iter()
            .map(|(key, url)| (*key, url.to_string()))
            .collect();
        Self { entries }
    }

    /// Loads overrides from a JSON file at `path` on top of the built-ins.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let overrides: HashMap<String, String> = serde_json::from_str(content)?;
        let mut catalog = Self::builtin();
        for (key, location) in overrides {
            let key: DateKey = key.parse()?;
            debug!(date_key = %key, location = %location, "Catalog override");
            catalog.set(key, location);
        }
        Ok(catalog)
    }

    /// Points `key` at `location`, replacing the previous binding.
    pub fn set(&mut self, key: DateKey, location: impl Into<String>) {
        self.entries.insert(key, location.into());
    }

    /// Returns the source bound to `key`.
    pub fn resolve(&self, key: DateKey) -> &str {
        // Every key is seeded by `builtin`, overrides only replace.
        self.entries
            .get(&key)
            .map(String::as_str)
            .unwrap_or(BUILTIN_SOURCES[key as usize].1)
    }

    /// Iterates over all `(key, location)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (DateKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Resolves raw selector text against `catalog`.
///
/// # Errors
///
/// Returns [`PipelineError::UnrecognizedSelector`] for anything other than
/// `"1"` through `"5"`.
pub fn resolve_source<'a>(catalog: &'a SourceCatalog, selector: &str) -> Result<&'a str> {
    let key: DateKey = selector.parse()?;
    Ok(catalog.resolve(key))
}
