//! Router and static route configuration.

use std::time::Duration;

use serde::Deserialize;

/// Construction-time settings for a [`Router`](crate::Router).
///
/// Deserializable so hosts can load it alongside their own configuration;
/// missing fields take their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// How long a served static file stays in the in-memory cache.
    pub static_cache_ttl_secs: u64,
    /// Compress dynamic responses when the client accepts it.
    pub compress_responses: bool,
    /// Bodies shorter than this are sent uncompressed.
    pub min_compress_size: usize,
    /// Body of the built-in 404 response.
    pub not_found_message: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            static_cache_ttl_secs: 300,
            compress_responses: true,
            min_compress_size: 0,
            not_found_message: "Not Found".to_string(),
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn static_cache_ttl(mut self, ttl: Duration) -> Self {
        self.static_cache_ttl_secs = ttl.as_secs();
        self
    }

    #[must_use]
    pub fn compress_responses(mut self, enabled: bool) -> Self {
        self.compress_responses = enabled;
        self
    }

    #[must_use]
    pub fn min_compress_size(mut self, bytes: usize) -> Self {
        self.min_compress_size = bytes;
        self
    }

    #[must_use]
    pub fn not_found_message(mut self, message: impl Into<String>) -> Self {
        self.not_found_message = message.into();
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.static_cache_ttl_secs)
    }
}

/// Serving options for one static route.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Compress file bodies per `Accept-Encoding`.
    pub compress: bool,
    /// Honor single `Range: bytes=...` requests.
    pub byte_range: bool,
    /// Value of the `Cache-Control` header, if any.
    pub cache_control: Option<String>,
    /// Render an HTML listing for directories instead of the index file.
    pub directory_listing: bool,
    /// Codec-specific compression level; `None` uses the defaults.
    pub compression_level: Option<u32>,
    /// File served for directory requests.
    pub index: String,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            compress: false,
            byte_range: false,
            cache_control: None,
            directory_listing: false,
            compression_level: None,
            index: "index.html".to_string(),
        }
    }
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use]
    pub fn byte_range(mut self, enabled: bool) -> Self {
        self.byte_range = enabled;
        self
    }

    #[must_use]
    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    #[must_use]
    pub fn directory_listing(mut self, enabled: bool) -> Self {
        self.directory_listing = enabled;
        self
    }

    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = Some(level);
        self
    }

    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = name.into();
        self
    }
}
