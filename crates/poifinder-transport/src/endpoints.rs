use std::fmt;

use url::Url;

use super::error::Result;

pub const DEFAULT_REST_BASE: &str = "https://api.flickr.com/services/rest/";
pub const DEFAULT_IMAGE_BASE: &str = "https://live.staticflickr.com/";

const SEARCH_METHOD: &str = "flickr.photos.search";
const GEO_LOCATION_METHOD: &str = "flickr.photos.geo.getLocation";
/// Size suffix of the 150x150 square crop.
const IMAGE_SIZE_SUFFIX: &str = "q";

/// Distance unit for the search radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadiusUnits {
    #[default]
    Miles,
    Kilometers,
}

impl RadiusUnits {
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Miles => "mi",
            Self::Kilometers => "km",
        }
    }
}

/// Parameters of a single page of `flickr.photos.search`.
#[derive(Debug, Clone, Copy)]
pub struct PhotoSearchParams<'a> {
    pub text: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub radius_units: RadiusUnits,
    pub per_page: u32,
}

/// Addresses for the search, geolocation and image requests.
///
/// Base URLs are configurable so a run can be pointed at a proxy or a local fake.
#[derive(Clone, PartialEq, Eq)]
pub struct FlickrEndpoints {
    api_key: String,
    rest_base: Url,
    image_base: Url,
}

impl fmt::Debug for FlickrEndpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlickrEndpoints")
            .field("api_key", &"<redacted>")
            .field("rest_base", &self.rest_base.as_str())
            .field("image_base", &self.image_base.as_str())
            .finish()
    }
}

impl FlickrEndpoints {
    /// Endpoints on the public Flickr hosts.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_bases(api_key, DEFAULT_REST_BASE, DEFAULT_IMAGE_BASE)
    }

    pub fn with_bases(api_key: impl Into<String>, rest_base: &str, image_base: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            rest_base: Url::parse(rest_base)?,
            image_base: parse_directory(image_base)?,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn rest_base(&self) -> &Url {
        &self.rest_base
    }

    pub fn image_base(&self) -> &Url {
        &self.image_base
    }

    pub fn search_url(&self, params: &PhotoSearchParams<'_>) -> Url {
        let mut url = self.rest_call(SEARCH_METHOD);
        url.query_pairs_mut()
            .append_pair("text", params.text)
            .append_pair("lat", &params.latitude.to_string())
            .append_pair("lon", &params.longitude.to_string())
            .append_pair("radius", &params.radius.to_string())
            .append_pair("radius_units", params.radius_units.as_param())
            .append_pair("per_page", &params.per_page.to_string());
        url
    }

    pub fn geo_location_url(&self, photo_id: &str) -> Url {
        let mut url = self.rest_call(GEO_LOCATION_METHOD);
        url.query_pairs_mut().append_pair("photo_id", photo_id);
        url
    }

    /// `{image_base}/{server}/{id}_{secret}_q.jpg`
    pub fn image_url(&self, server: &str, photo_id: &str, secret: &str) -> Result<Url> {
        Ok(self
            .image_base
            .join(&format!("{server}/{photo_id}_{secret}_{IMAGE_SIZE_SUFFIX}.jpg"))?)
    }

    fn rest_call(&self, method: &str) -> Url {
        let mut url = self.rest_base.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("method", method)
            .append_pair("api_key", &self.api_key)
            .append_pair("format", "json")
            .append_pair("nojsoncallback", "1");
        url
    }
}

/// `Url::join` drops the last path segment unless it ends with a slash.
fn parse_directory(base: &str) -> Result<Url> {
    if base.ends_with('/') {
        Ok(Url::parse(base)?)
    } else {
        Ok(Url::parse(&format!("{base}/"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_search_url_carries_fixed_parameters() {
        let endpoints = FlickrEndpoints::new("key123").unwrap();
        let url = endpoints.search_url(&PhotoSearchParams {
            text: "cats",
            latitude: 37.7,
            longitude: -122.4,
            radius: 20.0,
            radius_units: RadiusUnits::Miles,
            per_page: 25,
        });

        assert_eq!(url.host_str(), Some("api.flickr.com"));
        assert_eq!(query_value(&url, "method").as_deref(), Some("flickr.photos.search"));
        assert_eq!(query_value(&url, "api_key").as_deref(), Some("key123"));
        assert_eq!(query_value(&url, "text").as_deref(), Some("cats"));
        assert_eq!(query_value(&url, "lat").as_deref(), Some("37.7"));
        assert_eq!(query_value(&url, "lon").as_deref(), Some("-122.4"));
        assert_eq!(query_value(&url, "radius").as_deref(), Some("20"));
        assert_eq!(query_value(&url, "radius_units").as_deref(), Some("mi"));
        assert_eq!(query_value(&url, "per_page").as_deref(), Some("25"));
        assert_eq!(query_value(&url, "format").as_deref(), Some("json"));
        assert_eq!(query_value(&url, "nojsoncallback").as_deref(), Some("1"));
    }

    #[test]
    fn test_search_text_is_encoded() {
        let endpoints = FlickrEndpoints::new("k").unwrap();
        let url = endpoints.search_url(&PhotoSearchParams {
            text: "golden gate & bridge",
            latitude: 0.0,
            longitude: 0.0,
            radius: 5.0,
            radius_units: RadiusUnits::Kilometers,
            per_page: 10,
        });

        assert_eq!(
            query_value(&url, "text").as_deref(),
            Some("golden gate & bridge")
        );
        assert_eq!(query_value(&url, "radius_units").as_deref(), Some("km"));
    }

    #[test]
    fn test_geo_location_url() {
        let endpoints = FlickrEndpoints::new("k").unwrap();
        let url = endpoints.geo_location_url("52345");

        assert_eq!(
            query_value(&url, "method").as_deref(),
            Some("flickr.photos.geo.getLocation")
        );
        assert_eq!(query_value(&url, "photo_id").as_deref(), Some("52345"));
    }

    #[test]
    fn test_image_url_layout() {
        let endpoints = FlickrEndpoints::new("k").unwrap();
        let url = endpoints.image_url("65535", "52345", "abcdef").unwrap();
        assert_eq!(
            url.as_str(),
            "https://live.staticflickr.com/65535/52345_abcdef_q.jpg"
        );
    }

    #[test]
    fn test_image_base_without_trailing_slash() {
        let endpoints =
            FlickrEndpoints::with_bases("k", "http://localhost:9000/rest", "http://localhost:9000/img")
                .unwrap();
        let url = endpoints.image_url("1", "2", "3").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/img/1/2_3_q.jpg");
    }

    #[test]
    fn test_invalid_base_is_rejected() {
        assert!(FlickrEndpoints::with_bases("k", "not a url", DEFAULT_IMAGE_BASE).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let endpoints = FlickrEndpoints::new("super-secret").unwrap();
        let debug = format!("{endpoints:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }
}
