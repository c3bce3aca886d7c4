use std::time::Duration;

use poifinder_transport::{FlickrEndpoints, PhotoSearchParams, RadiusUnits, endpoints};

use crate::{error::PoiFinderError, record::Point, thumbnail::PLACEHOLDER_SIZE};

pub const DEFAULT_RADIUS: f64 = 20.0;
pub const DEFAULT_PER_PAGE: u32 = 25;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_ENV: &str = "FLICKR_API_KEY";
pub const REST_BASE_ENV: &str = "POIFINDER_REST_BASE";
pub const IMAGE_BASE_ENV: &str = "POIFINDER_IMAGE_BASE";
pub const ENRICHMENT_CONCURRENCY_ENV: &str = "POIFINDER_ENRICHMENT_CONCURRENCY";

/// Configuration for a search run.
///
/// Radius, units and page size are fixed per deployment: every run searches a 20 mile
/// radius and returns at most one page of 25 hits unless overridden here.
///
/// # Examples
///
/// ```rust
/// use poifinder::SearchConfig;
///
/// let config = SearchConfig::builder("my-api-key")
///     .enrichment_concurrency(4)
///     .build()?;
/// assert_eq!(config.per_page, 25);
/// # Ok::<(), poifinder::error::PoiFinderError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Where the three requests of a run are sent
    pub endpoints: FlickrEndpoints,
    /// Search radius around the center point
    pub radius: f64,
    pub radius_units: RadiusUnits,
    /// Maximum number of hits per run
    pub per_page: u32,
    /// Edge length of the thumbnail substituted when the image stage fails
    pub placeholder_size: u32,
    /// Per-request timeout handed to the HTTP client
    pub request_timeout: Duration,
    /// How many hits are enriched at once. Delivery stays in response order regardless.
    pub enrichment_concurrency: usize,
}

impl SearchConfig {
    pub fn builder(api_key: impl Into<String>) -> SearchConfigBuilder {
        SearchConfigBuilder::new(api_key)
    }

    /// Build a configuration from `FLICKR_API_KEY` and the optional
    /// `POIFINDER_REST_BASE`, `POIFINDER_IMAGE_BASE` and
    /// `POIFINDER_ENRICHMENT_CONCURRENCY` variables.
    pub fn from_env() -> Result<Self, PoiFinderError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PoiFinderError> {
        let api_key = lookup(API_KEY_ENV).ok_or_else(|| {
            PoiFinderError::ConfigError(format!("{API_KEY_ENV} is not set"))
        })?;

        let mut builder = Self::builder(api_key);
        if let Some(rest_base) = lookup(REST_BASE_ENV) {
            builder = builder.rest_base(rest_base);
        }
        if let Some(image_base) = lookup(IMAGE_BASE_ENV) {
            builder = builder.image_base(image_base);
        }
        if let Some(concurrency) = lookup(ENRICHMENT_CONCURRENCY_ENV) {
            let concurrency = concurrency.trim().parse().map_err(|_| {
                PoiFinderError::ConfigError(format!(
                    "{ENRICHMENT_CONCURRENCY_ENV} must be a positive integer, got {concurrency:?}"
                ))
            })?;
            builder = builder.enrichment_concurrency(concurrency);
        }
        builder.build()
    }

    pub(crate) const fn search_params<'a>(&self, query: &'a str, center: Point) -> PhotoSearchParams<'a> {
        PhotoSearchParams {
            text: query,
            latitude: center.latitude,
            longitude: center.longitude,
            radius: self.radius,
            radius_units: self.radius_units,
            per_page: self.per_page,
        }
    }
}

/// Builder for [`SearchConfig`] with the deployment defaults pre-filled.
#[derive(Debug, Clone)]
pub struct SearchConfigBuilder {
    api_key: String,
    rest_base: String,
    image_base: String,
    radius: f64,
    radius_units: RadiusUnits,
    per_page: u32,
    placeholder_size: u32,
    request_timeout: Duration,
    enrichment_concurrency: usize,
}

impl SearchConfigBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            rest_base: endpoints::DEFAULT_REST_BASE.to_string(),
            image_base: endpoints::DEFAULT_IMAGE_BASE.to_string(),
            radius: DEFAULT_RADIUS,
            radius_units: RadiusUnits::Miles,
            per_page: DEFAULT_PER_PAGE,
            placeholder_size: PLACEHOLDER_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enrichment_concurrency: 1,
        }
    }

    /// Base URL of the REST API (search and geolocation)
    pub fn rest_base(mut self, url: impl Into<String>) -> Self {
        self.rest_base = url.into();
        self
    }

    /// Base URL images are served from
    pub fn image_base(mut self, url: impl Into<String>) -> Self {
        self.image_base = url.into();
        self
    }

    pub const fn radius(mut self, radius: f64, units: RadiusUnits) -> Self {
        self.radius = radius;
        self.radius_units = units;
        self
    }

    pub const fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub const fn placeholder_size(mut self, size: u32) -> Self {
        self.placeholder_size = size;
        self
    }

    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enrich up to `concurrency` hits at once
    pub const fn enrichment_concurrency(mut self, concurrency: usize) -> Self {
        self.enrichment_concurrency = concurrency;
        self
    }

    pub fn build(self) -> Result<SearchConfig, PoiFinderError> {
        if self.api_key.trim().is_empty() {
            return Err(PoiFinderError::ConfigError("API key must not be empty".into()));
        }
        if self.per_page == 0 {
            return Err(PoiFinderError::ConfigError("Page size must be at least 1".into()));
        }
        if self.enrichment_concurrency == 0 {
            return Err(PoiFinderError::ConfigError(
                "Enrichment concurrency must be at least 1".into(),
            ));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(PoiFinderError::ConfigError(format!(
                "Search radius must be positive, got {}",
                self.radius
            )));
        }

        Ok(SearchConfig {
            endpoints: FlickrEndpoints::with_bases(self.api_key, &self.rest_base, &self.image_base)?,
            radius: self.radius,
            radius_units: self.radius_units,
            per_page: self.per_page,
            placeholder_size: self.placeholder_size,
            request_timeout: self.request_timeout,
            enrichment_concurrency: self.enrichment_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_builder() {
        let config = SearchConfig::builder("key").build().unwrap();
        assert_eq!(config.radius, 20.0);
        assert_eq!(config.radius_units, RadiusUnits::Miles);
        assert_eq!(config.per_page, 25);
        assert_eq!(config.placeholder_size, 75);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.enrichment_concurrency, 1);
        assert_eq!(config.endpoints.api_key(), "key");
        assert_eq!(config.endpoints.rest_base().as_str(), endpoints::DEFAULT_REST_BASE);
    }

    #[test]
    fn test_method_chaining() {
        let config = SearchConfig::builder("key")
            .rest_base("http://localhost:8080/rest/")
            .image_base("http://localhost:8080/img")
            .radius(5.0, RadiusUnits::Kilometers)
            .per_page(10)
            .placeholder_size(32)
            .request_timeout(Duration::from_secs(5))
            .enrichment_concurrency(4)
            .build()
            .unwrap();

        assert_eq!(config.endpoints.image_base().as_str(), "http://localhost:8080/img/");
        assert_eq!(config.radius, 5.0);
        assert_eq!(config.radius_units, RadiusUnits::Kilometers);
        assert_eq!(config.per_page, 10);
        assert_eq!(config.placeholder_size, 32);
        assert_eq!(config.enrichment_concurrency, 4);
    }

    #[test]
    fn test_validation() {
        assert!(SearchConfig::builder("  ").build().is_err());
        assert!(SearchConfig::builder("k").per_page(0).build().is_err());
        assert!(SearchConfig::builder("k").enrichment_concurrency(0).build().is_err());
        assert!(SearchConfig::builder("k").radius(0.0, RadiusUnits::Miles).build().is_err());
        assert!(SearchConfig::builder("k").radius(f64::NAN, RadiusUnits::Miles).build().is_err());
        assert!(matches!(
            SearchConfig::builder("k").rest_base("::nope").build(),
            Err(PoiFinderError::TransportError(_))
        ));
    }

    #[test]
    fn test_search_params_from_center() {
        let config = SearchConfig::builder("k").build().unwrap();
        let params = config.search_params("cats", Point::from_lng_lat(-122.4, 37.7));
        assert_eq!(params.text, "cats");
        assert_eq!(params.longitude, -122.4);
        assert_eq!(params.latitude, 37.7);
        assert_eq!(params.per_page, 25);
    }

    #[test]
    fn test_from_lookup_requires_api_key() {
        let err = SearchConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = SearchConfig::from_lookup(lookup(&[
            (API_KEY_ENV, "abc"),
            (REST_BASE_ENV, "http://127.0.0.1:1/rest/"),
            (IMAGE_BASE_ENV, "http://127.0.0.1:1/img/"),
            (ENRICHMENT_CONCURRENCY_ENV, " 3 "),
        ]))
        .unwrap();

        assert_eq!(config.endpoints.api_key(), "abc");
        assert_eq!(config.endpoints.rest_base().as_str(), "http://127.0.0.1:1/rest/");
        assert_eq!(config.enrichment_concurrency, 3);
    }

    #[test]
    fn test_from_lookup_rejects_bad_concurrency() {
        let result = SearchConfig::from_lookup(lookup(&[
            (API_KEY_ENV, "abc"),
            (ENRICHMENT_CONCURRENCY_ENV, "many"),
        ]));
        assert!(matches!(result, Err(PoiFinderError::ConfigError(_))));
    }
}
