//! Nominatim reverse-geocoding client.

use crate::error::{Result, WayfarerError};
use crate::models::Coordinate;
use crate::ports::ReverseGeocoder;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_RETRIES: u32 = 3;

/// The administrative address fields a reverse lookup yields.
///
/// Nominatim reports at most one of city/town/village/municipality
/// depending on the OSM admin level; [`locality`](Self::locality)
/// applies the preference order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocality {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub town: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl ResolvedLocality {
    /// The most specific populated-place name: city > town > village >
    /// municipality.
    pub fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
            .or(self.municipality.as_deref())
    }

    /// Canonical region name: "City, State, CC". Parts that are missing
    /// are omitted along with their separator.
    pub fn region_name(&self) -> Option<String> {
        let locality = self.locality()?;
        let mut parts = vec![locality.to_string()];
        if let Some(state) = &self.state {
            parts.push(state.clone());
        }
        if let Some(cc) = &self.country_code {
            parts.push(cc.to_uppercase());
        }
        Some(parts.join(", "))
    }
}

/// Envelope of a Nominatim `/reverse` response; only the `address`
/// object matters to us.
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: ResolvedLocality,
    #[serde(default)]
    error: Option<String>,
}

impl ReverseResponse {
    /// An `error` body ("Unable to geocode") is a definitive answer for
    /// the coordinate, not an outage, so it must not be retried.
    fn into_locality(self) -> std::result::Result<ResolvedLocality, CallError> {
        if let Some(error) = self.error {
            // Nominatim reports "Unable to geocode" with HTTP 200.
            return Err(CallError {
                error: WayfarerError::GeocoderUnavailable {
                    reason: format!("geocoder error: {}", error),
                },
                retryable: false,
            });
        }
        Ok(self.address)
    }
}

/// A failed upstream call plus whether retrying can help.
#[derive(Debug)]
struct CallError {
    error: WayfarerError,
    retryable: bool,
}

impl CallError {
    fn transient(error: WayfarerError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }
}

/// Blocking HTTP client for the Nominatim reverse endpoint.
pub struct NominatimClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| WayfarerError::GeocoderUnavailable {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn reverse_once(&self, coordinate: Coordinate) -> std::result::Result<ResolvedLocality, CallError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
                ("format", "jsonv2".to_string()),
                ("accept-language", "en".to_string()),
            ])
            .send()
            .map_err(|e| {
                CallError::transient(WayfarerError::GeocoderUnavailable {
                    reason: format!("request failed: {}", e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::transient(WayfarerError::GeocoderUnavailable {
                reason: format!("geocoder returned HTTP {}", status),
            }));
        }

        let body: ReverseResponse = response.json().map_err(|e| {
            CallError::transient(WayfarerError::GeocoderUnavailable {
                reason: format!("invalid response body: {}", e),
            })
        })?;

        body.into_locality()
    }
}

impl ReverseGeocoder for NominatimClient {
    /// Resolve with retries and exponential backoff; transient network
    /// failures should not abort a long batch run.
    fn reverse(&self, coordinate: Coordinate) -> Result<ResolvedLocality> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.reverse_once(coordinate) {
                Ok(locality) => return Ok(locality),
                Err(call) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        retryable = call.retryable,
                        "reverse geocode failed: {}",
                        call.error
                    );
                    let retryable = call.retryable;
                    last_err = Some(call.error);
                    if !retryable {
                        break;
                    }
                    if attempt + 1 < MAX_RETRIES {
                        thread::sleep(Duration::from_millis(500 * 2u64.pow(attempt)));
                    }
                }
            }
        }
        Err(last_err.unwrap_or(WayfarerError::GeocoderUnavailable {
            reason: "exhausted retries".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locality_preference_order() {
        let full = ResolvedLocality {
            city: Some("Austin".to_string()),
            town: Some("Pflugerville".to_string()),
            village: Some("Elsewhere".to_string()),
            ..Default::default()
        };
        assert_eq!(full.locality(), Some("Austin"));

        let town_only = ResolvedLocality {
            town: Some("Pflugerville".to_string()),
            municipality: Some("Travis".to_string()),
            ..Default::default()
        };
        assert_eq!(town_only.locality(), Some("Pflugerville"));

        assert_eq!(ResolvedLocality::default().locality(), None);
    }

    #[test]
    fn test_region_name_formats() {
        let full = ResolvedLocality {
            city: Some("Austin".to_string()),
            state: Some("Texas".to_string()),
            country_code: Some("us".to_string()),
            ..Default::default()
        };
        assert_eq!(full.region_name(), Some("Austin, Texas, US".to_string()));

        let no_state = ResolvedLocality {
            city: Some("Singapore".to_string()),
            country_code: Some("sg".to_string()),
            ..Default::default()
        };
        assert_eq!(no_state.region_name(), Some("Singapore, SG".to_string()));

        let nothing = ResolvedLocality {
            state: Some("Texas".to_string()),
            ..Default::default()
        };
        assert_eq!(nothing.region_name(), None);
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "place_id": 12345,
            "address": {
                "house_number": "900",
                "road": "East 11th Street",
                "city": "Austin",
                "state": "Texas",
                "postcode": "78702",
                "country_code": "us"
            }
        }"#;
        let parsed: ReverseResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.address.city.as_deref(), Some("Austin"));
        assert_eq!(parsed.address.country_code.as_deref(), Some("us"));
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_error_body_is_not_retryable() {
        let json = r#"{"error": "Unable to geocode"}"#;
        let parsed: ReverseResponse = serde_json::from_str(json).unwrap();

        let call = parsed.into_locality().unwrap_err();
        assert!(!call.retryable);
        assert!(matches!(
            call.error,
            WayfarerError::GeocoderUnavailable { ref reason } if reason.contains("Unable to geocode")
        ));
    }

    #[test]
    fn test_clean_body_yields_address() {
        let json = r#"{"address": {"city": "Austin"}}"#;
        let parsed: ReverseResponse = serde_json::from_str(json).unwrap();
        let locality = parsed.into_locality().unwrap();
        assert_eq!(locality.city.as_deref(), Some("Austin"));
    }
}
