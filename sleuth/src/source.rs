//! The data source whose usages are being surveyed.

use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

/// A data source, identified by a primary name and any number of aliases.
///
/// Data sources are frequently cited by acronym in one place and by their full name in another
/// (e.g. `MEPS` and `Medical Expenditure Panel Survey`), so every search matches any of the
/// names.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl DataSource {
    /// A data source with no aliases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: vec![],
        }
    }

    /// Parse a data source from user input, rejecting blank names.
    pub fn parse(name: &str, aliases: impl IntoIterator<Item = String>) -> Result<Self, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::msg("data source name cannot be empty"));
        }
        Ok(Self::new(name).with_aliases(aliases))
    }

    /// Add aliases to this data source.
    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = String>) -> Self {
        self.aliases
            .extend(aliases.into_iter().map(|alias| alias.trim().to_string()));
        self
    }

    /// All distinct, non-blank names of this data source, primary name first.
    pub fn names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(&self.name)
            .chain(&self.aliases)
            .map(|name| name.trim())
            .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
            .collect()
    }

    /// A search expression matching any name of this data source as an exact phrase.
    pub fn phrase_query(&self) -> String {
        self.names()
            .into_iter()
            .map(|name| format!("\"{}\"", name.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

impl Display for DataSource {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
