//! The composite result of resolving one search hit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::thumbnail::Thumbnail;

/// Longest raw title kept before truncation, in characters. A blank title falls back to
/// the photo id verbatim, which is not subject to this cap.
pub const MAX_TITLE_CHARS: usize = 40;

/// A geographic coordinate, longitude first as in GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
}

impl Point {
    pub const fn from_lng_lat(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.longitude, self.latitude)
    }
}

/// A fully enriched search hit.
///
/// Records are only built once every stage for the hit has resolved, and are immutable
/// afterwards. The location is absent when the geolocation lookup failed; the thumbnail is
/// a placeholder when the image fetch or decode failed (see [`Thumbnail::is_placeholder`]).
///
/// Cloning is cheap: pixel data is reference counted.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRecord {
    title: String,
    photo_id: String,
    server: String,
    secret: String,
    location: Option<Point>,
    thumbnail: Thumbnail,
}

impl SearchRecord {
    pub fn new(
        raw_title: &str,
        photo_id: impl Into<String>,
        server: impl Into<String>,
        secret: impl Into<String>,
        location: Option<Point>,
        thumbnail: Thumbnail,
    ) -> Self {
        let photo_id = photo_id.into();
        Self {
            title: derive_title(raw_title, &photo_id),
            photo_id,
            server: server.into(),
            secret: secret.into(),
            location,
            thumbnail,
        }
    }

    /// Display title: never empty, at most [`MAX_TITLE_CHARS`] characters.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn photo_id(&self) -> &str {
        &self.photo_id
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub const fn location(&self) -> Option<Point> {
        self.location
    }

    pub const fn thumbnail(&self) -> &Thumbnail {
        &self.thumbnail
    }
}

impl fmt::Display for SearchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(point) => write!(f, "{} [{}] at {point}", self.title, self.photo_id),
            None => write!(f, "{} [{}] (no location)", self.title, self.photo_id),
        }
    }
}

/// Titles longer than the cap are cut at a character boundary, even when blank. Shorter
/// blank titles fall back to the photo id, which is used as-is.
fn derive_title(raw_title: &str, photo_id: &str) -> String {
    if raw_title.chars().count() > MAX_TITLE_CHARS {
        raw_title.chars().take(MAX_TITLE_CHARS).collect()
    } else if raw_title.trim().is_empty() {
        photo_id.to_string()
    } else {
        raw_title.to_string()
    }
}
