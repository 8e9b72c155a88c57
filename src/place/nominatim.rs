use super::{Address, PlaceResolver};
use crate::place::error::PlaceError;
use crate::structs::GeoCoordinate;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Deserialize, Debug, Default)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize, Debug)]
struct NominatimResponse {
    #[serde(default)]
    address: Option<NominatimAddress>,
    error: Option<String>,
}

/// Reverse geocoder backed by a Nominatim compatible HTTP endpoint.
pub struct NominatimResolver {
    client: reqwest::Client,
    base_url: String,
    language: String,
}

impl NominatimResolver {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PlaceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("photo_renamer/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: "en".to_string(),
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

#[async_trait]
impl PlaceResolver for NominatimResolver {
    async fn lookup(
        &self,
        coordinate: GeoCoordinate,
        limit: usize,
    ) -> Result<Vec<Address>, PlaceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
                ("zoom", "10".to_string()),
                ("accept-language", self.language.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<NominatimResponse>()
            .await?;

        if let Some(error) = response.error {
            return Err(PlaceError::Rejected(error));
        }
        let Some(address) = response.address else {
            return Ok(Vec::new());
        };
        let locality = address
            .city
            .or(address.town)
            .or(address.village)
            .or(address.municipality);
        Ok(vec![Address {
            locality,
            country_name: address.country,
        }])
    }
}
