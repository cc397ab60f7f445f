//! Last map viewport and first-launch flag
//!
//! Stored as plain keys in the host's [`SettingsStore`]; nothing else in the
//! core reads them.

use bridge_traits::SettingsStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

const KEY_LATITUDE: &str = "map_region.latitude";
const KEY_LONGITUDE: &str = "map_region.longitude";
const KEY_LATITUDE_DELTA: &str = "map_region.latitude_delta";
const KEY_LONGITUDE_DELTA: &str = "map_region.longitude_delta";
const KEY_HAS_LAUNCHED_BEFORE: &str = "has_launched_before";

/// Visible map area: center plus spans, all in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Region shown on first launch (continental United States).
    pub const DEFAULT: MapRegion = MapRegion {
        latitude: 37.13284,
        longitude: -95.78558,
        latitude_delta: 75.41927,
        longitude_delta: 61.27601,
    };
}

impl Default for MapRegion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub async fn save_map_region(settings: &dyn SettingsStore, region: &MapRegion) -> Result<()> {
    settings.set_f64(KEY_LATITUDE, region.latitude).await?;
    settings.set_f64(KEY_LONGITUDE, region.longitude).await?;
    settings.set_f64(KEY_LATITUDE_DELTA, region.latitude_delta).await?;
    settings.set_f64(KEY_LONGITUDE_DELTA, region.longitude_delta).await?;
    debug!(?region, "Map region saved");
    Ok(())
}

/// Saved region, or `None` if any of its keys is missing.
pub async fn load_map_region(settings: &dyn SettingsStore) -> Result<Option<MapRegion>> {
    let latitude = settings.get_f64(KEY_LATITUDE).await?;
    let longitude = settings.get_f64(KEY_LONGITUDE).await?;
    let latitude_delta = settings.get_f64(KEY_LATITUDE_DELTA).await?;
    let longitude_delta = settings.get_f64(KEY_LONGITUDE_DELTA).await?;

    Ok(match (latitude, longitude, latitude_delta, longitude_delta) {
        (Some(latitude), Some(longitude), Some(latitude_delta), Some(longitude_delta)) => {
            Some(MapRegion {
                latitude,
                longitude,
                latitude_delta,
                longitude_delta,
            })
        }
        _ => None,
    })
}

/// Region to show at startup.
///
/// On first launch, sets the launch flag and stores [`MapRegion::DEFAULT`].
pub async fn prepare_first_launch(settings: &dyn SettingsStore) -> Result<MapRegion> {
    let launched_before = settings
        .get_bool(KEY_HAS_LAUNCHED_BEFORE)
        .await?
        .unwrap_or(false);

    if !launched_before {
        info!("First launch; storing default map region");
        settings.set_bool(KEY_HAS_LAUNCHED_BEFORE, true).await?;
        save_map_region(settings, &MapRegion::DEFAULT).await?;
        return Ok(MapRegion::DEFAULT);
    }

    Ok(load_map_region(settings).await?.unwrap_or_default())
}
