//! Core data model shared by the record store, the corpus builder and the
//! search pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a listing record.
///
/// Ids are assigned by the record store, never reused and never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RecordId(pub u32);

impl RecordId {
    pub fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Converts to little-endian bytes for snapshot storage.
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Creates from little-endian bytes. Returns `None` for zero.
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        Self::new(u32::from_le_bytes(bytes))
    }
}

impl TryFrom<u32> for RecordId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "record id must be non-zero".to_string())
    }
}

impl From<RecordId> for u32 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A property listing as owned by the record store.
///
/// Every attribute except the id is optional: scraped listings routinely
/// miss fields, and consumers must omit what is absent rather than invent
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Categorical type such as "Apartment" or "House"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,

    /// Free-form condition such as "New" or "Used"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,

    /// Asking price in the listing currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,

    /// Built area in square meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parking_spaces: Option<u32>,

    /// Socio-economic stratum (1-6)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stratum: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pets_allowed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furnished: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Creates a record with only an id set.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            title: None,
            description: None,
            location: None,
            property_type: None,
            condition: None,
            amenities: Vec::new(),
            price: None,
            area_m2: None,
            rooms: None,
            bathrooms: None,
            parking_spaces: None,
            stratum: None,
            pets_allowed: None,
            furnished: None,
            listing_url: None,
            created_at: None,
        }
    }

    /// Free-text fields searched by the keyword fallback.
    pub fn keyword_fields(&self) -> impl Iterator<Item = &str> {
        [&self.title, &self.description, &self.location]
            .into_iter()
            .filter_map(|field| field.as_deref())
    }
}
