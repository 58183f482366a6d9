//! Typed entity records.
//!
//! Each entity has three shapes: the full row as the backend returns it, a
//! `New*` insert draft without backend-assigned fields, and a `*Patch` where
//! every field is optional and absent fields are left out of the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clearance::ClearanceLevel;
use crate::record::{Entity, Record};
use crate::table::TableName;

macro_rules! entity_record {
    ($entity:ty, $draft:ty, $patch:ty, $table:expr) => {
        impl Record for $entity {
            type Draft = $draft;
            type Patch = $patch;

            fn id(&self) -> &str {
                &self.id
            }

            fn clearance_level(&self) -> Option<ClearanceLevel> {
                Some(self.clearance_level)
            }

            fn created_at(&self) -> Option<DateTime<Utc>> {
                Some(self.created_at)
            }

            fn updated_at(&self) -> Option<DateTime<Utc>> {
                Some(self.updated_at)
            }
        }

        impl Entity for $entity {
            const TABLE: TableName = $table;
        }
    };
}

/// A console module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub name: String,
    pub description: String,
    pub clearance_level: ClearanceLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`Module`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewModule {
    pub name: String,
    pub description: String,
    pub clearance_level: ClearanceLevel,
}

/// Partial update for [`Module`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_level: Option<ClearanceLevel>,
}

entity_record!(Module, NewModule, ModulePatch, TableName::Modules);

/// A movie in the DCCU catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub year: i32,
    pub director: String,
    pub rating: f64,
    pub synopsis: String,
    pub clearance_level: ClearanceLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`Movie`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub year: i32,
    pub director: String,
    pub rating: f64,
    pub synopsis: String,
    pub clearance_level: ClearanceLevel,
}

/// Partial update for [`Movie`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoviePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_level: Option<ClearanceLevel>,
}

entity_record!(Movie, NewMovie, MoviePatch, TableName::Movies);

/// A character dossier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub alias: String,
    pub description: String,
    pub clearance_level: ClearanceLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`Character`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCharacter {
    pub name: String,
    pub alias: String,
    pub description: String,
    pub clearance_level: ClearanceLevel,
}

/// Partial update for [`Character`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_level: Option<ClearanceLevel>,
}

entity_record!(Character, NewCharacter, CharacterPatch, TableName::Characters);

/// A location file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub description: String,
    pub coordinates: String,
    pub clearance_level: ClearanceLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`Location`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub description: String,
    pub coordinates: String,
    pub clearance_level: ClearanceLevel,
}

/// Partial update for [`Location`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_level: Option<ClearanceLevel>,
}

entity_record!(Location, NewLocation, LocationPatch, TableName::Locations);

/// A technology spec sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    pub id: String,
    pub name: String,
    pub description: String,
    pub specifications: String,
    pub clearance_level: ClearanceLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`Technology`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTechnology {
    pub name: String,
    pub description: String,
    pub specifications: String,
    pub clearance_level: ClearanceLevel,
}

/// Partial update for [`Technology`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnologyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_level: Option<ClearanceLevel>,
}

entity_record!(Technology, NewTechnology, TechnologyPatch, TableName::Technologies);
