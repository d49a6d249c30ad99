use std::time::Duration;

use poem_openapi::Object;
use thiserror::Error;

mod ip_api;
pub use ip_api::IpApiProvider;

/// Placeholder substituted with the looked-up address in the upstream URL template.
pub const IP_PLACEHOLDER: &str = "{ip}";

/// Upstream endpoint settings, fixed for the lifetime of a provider.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// URL containing at least one `{ip}` placeholder, e.g. `http://ip-api.com/json/{ip}`.
    pub url_template: String,
    /// Hard deadline for the whole upstream exchange, body included.
    pub timeout: Duration,
}

/// Geolocation metadata for a single IPv4 address.
#[derive(Debug, Clone, PartialEq, Object)]
pub struct IpGeolocation {
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub isp: String,
}

#[derive(Debug, Error)]
pub enum LookupError {
    /// The provider answered, but not with its success marker.
    #[error("geolocation provider reported failure: {}", .message.as_deref().unwrap_or("no message"))]
    NotFound { message: Option<String> },
    /// Connection failure, timeout, or the body could not be read.
    #[error("geolocation provider unreachable: {0}")]
    Unavailable(#[source] reqwest::Error),
    #[error("geolocation provider returned a non-JSON payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
}
