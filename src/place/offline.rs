use super::{Address, PlaceResolver};
use crate::place::error::PlaceError;
use crate::structs::GeoCoordinate;
use async_trait::async_trait;
use reverse_geocoder::ReverseGeocoder;

/// Reverse geocoder backed by the bundled GeoNames city table. No network access.
pub struct OfflineResolver {
    geocoder: ReverseGeocoder,
}

impl OfflineResolver {
    pub fn new() -> Self {
        Self {
            geocoder: ReverseGeocoder::new(),
        }
    }

    pub fn nearest(&self, coordinate: GeoCoordinate) -> Address {
        let search_result = self
            .geocoder
            .search((coordinate.latitude, coordinate.longitude));
        let record = search_result.record;
        let country_name = rust_iso3166::from_alpha2(&record.cc).map(|c| c.name.to_string());
        Address {
            locality: Some(record.name.clone()).filter(|name| !name.is_empty()),
            country_name,
        }
    }
}

impl Default for OfflineResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaceResolver for OfflineResolver {
    async fn lookup(
        &self,
        coordinate: GeoCoordinate,
        limit: usize,
    ) -> Result<Vec<Address>, PlaceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        // The city table only yields the single nearest match.
        Ok(vec![self.nearest(coordinate)])
    }
}
