//! Backend table names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Tables exposed by the hosted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableName {
    /// Console modules.
    Modules,
    /// Movies.
    Movies,
    /// Characters.
    Characters,
    /// Locations.
    Locations,
    /// Technologies.
    Technologies,
}

impl TableName {
    /// All tables.
    pub const ALL: [TableName; 5] = [
        TableName::Modules,
        TableName::Movies,
        TableName::Characters,
        TableName::Locations,
        TableName::Technologies,
    ];

    /// Wire name of the table.
    pub fn as_str(self) -> &'static str {
        match self {
            TableName::Modules => "modules",
            TableName::Movies => "movies",
            TableName::Characters => "characters",
            TableName::Locations => "locations",
            TableName::Technologies => "technologies",
        }
    }

    /// Name of the push-change channel scoped to this table.
    pub fn channel_name(self) -> String {
        format!("{}_changes", self.as_str())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableName::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownTable(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        assert_eq!("movies".parse::<TableName>().unwrap(), TableName::Movies);
        assert_eq!("Technologies".parse::<TableName>().unwrap(), TableName::Technologies);
        assert!("suits".parse::<TableName>().is_err());
    }

    #[test]
    fn test_channel_name() {
        assert_eq!(TableName::Characters.channel_name(), "characters_changes");
    }
}
