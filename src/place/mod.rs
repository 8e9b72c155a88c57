//! Reverse geocoding of GPS coordinates into the place part of a file name.
pub mod error;
pub mod nominatim;
pub mod offline;

use crate::place::error::PlaceError;
use crate::structs::{GeoCoordinate, PlaceLabel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use nominatim::NominatimResolver;
pub use offline::OfflineResolver;

/// One reverse geocoding candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub locality: Option<String>,
    pub country_name: Option<String>,
}

#[async_trait]
pub trait PlaceResolver: Send + Sync {
    /// Returns up to `limit` candidates, best match first. May be empty.
    async fn lookup(
        &self,
        coordinate: GeoCoordinate,
        limit: usize,
    ) -> Result<Vec<Address>, PlaceError>;
}

/// Joins the non-empty locality and country name with `_`.
///
/// Whitespace is removed and path separators become `-` so the label is safe inside a file name.
pub fn label_from_address(address: &Address) -> Option<String> {
    let parts: Vec<String> = [&address.locality, &address.country_name]
        .into_iter()
        .flatten()
        .map(|part| {
            part.chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == '/' || c == '\\' { '-' } else { c })
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("_"))
}

/// Produces the place label for an optional coordinate.
///
/// The resolver is only consulted when a coordinate is present.
pub async fn resolve_place_label(
    resolver: &dyn PlaceResolver,
    coordinate: Option<GeoCoordinate>,
) -> PlaceLabel {
    let Some(coordinate) = coordinate else {
        return PlaceLabel::NoGeo;
    };
    match resolver.lookup(coordinate, 1).await {
        Ok(candidates) => match candidates.first().and_then(label_from_address) {
            Some(label) => PlaceLabel::Resolved(label),
            None => {
                debug!(?coordinate, "Geocoder returned no usable address");
                PlaceLabel::Unknown
            }
        },
        Err(e) => {
            warn!(?coordinate, error = %e, "Geocoding failed");
            PlaceLabel::Unknown
        }
    }
}
