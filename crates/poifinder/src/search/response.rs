//! Wire shapes of the search and geolocation responses.
//!
//! The REST API answers `{"stat": "ok", ...}` on success and
//! `{"stat": "fail", "code": .., "message": ..}` on failure, with a 200 status either way.
//! Numeric fields are inconsistently typed (ids as strings, coordinates as numbers or as
//! numeric strings), so the deserializers here accept both.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::record::Point;

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
}

#[derive(Debug, Deserialize)]
struct ApiFailure {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Checks the `stat` envelope, then deserializes the payload.
pub(crate) fn parse<T: DeserializeOwned>(document: Value) -> Result<T, ResponseError> {
    if document.get("stat").and_then(Value::as_str) == Some("fail") {
        let failure: ApiFailure = serde_json::from_value(document)?;
        return Err(ResponseError::Api {
            code: failure.code,
            message: failure.message,
        });
    }
    Ok(serde_json::from_value(document)?)
}

/// One hit of the initial search, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoDescriptor {
    pub title: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub server: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoSearchPage {
    pub photos: PhotoList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoList {
    pub photo: Vec<PhotoDescriptor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeoLocationResponse {
    photo: GeoPhoto,
}

#[derive(Debug, Deserialize)]
struct GeoPhoto {
    location: GeoLocation,
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    #[serde(deserialize_with = "f64_or_string")]
    latitude: f64,
    #[serde(deserialize_with = "f64_or_string")]
    longitude: f64,
}

impl From<GeoLocationResponse> for Point {
    fn from(response: GeoLocationResponse) -> Self {
        let location = response.photo.location;
        Self::from_lng_lat(location.longitude, location.latitude)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Number(n) => n.to_string(),
        Scalar::Text(s) => s,
    })
}

fn f64_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom(format!("{n} is not representable as f64"))),
        Scalar::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid coordinate {s:?}"))),
    }
}
