//! Domain models for pins and their photo albums

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Stable identifier of a pin. Survives moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PinId(String);

impl PinId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PinId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a photo row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PhotoId(String);

impl PhotoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A user-placed map marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Pin {
    pub id: PinId,
    pub latitude: f64,
    pub longitude: f64,
    /// Unix milliseconds; set once at creation
    pub creation_date: i64,
}

impl Pin {
    pub fn new(latitude: f64, longitude: f64, creation_date: i64) -> Self {
        Self {
            id: PinId::new(),
            latitude,
            longitude,
            creation_date,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// A fetched image reference belonging to exactly one pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: PhotoId,
    pub pin_id: PinId,
    /// Source URL of the medium-size image
    pub url_string: String,
    /// Unix milliseconds; shared by every photo of a batch
    pub download_date: i64,
    /// Index within the fetched batch
    pub position: i64,
}

impl Photo {
    pub fn new(pin_id: PinId, url_string: impl Into<String>, download_date: i64, position: i64) -> Self {
        Self {
            id: PhotoId::new(),
            pin_id,
            url_string: url_string.into(),
            download_date,
            position,
        }
    }
}

/// Latitude in [-90, 90], longitude in [-180, 180], both finite.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), String> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("latitude {} is outside [-90, 90]", latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("longitude {} is outside [-180, 180]", longitude));
    }
    Ok(())
}
