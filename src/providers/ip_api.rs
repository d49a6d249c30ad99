use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;

use super::{IpGeolocation, LookupError, ResolverConfig, IP_PLACEHOLDER};

/// Value of the payload's `status` field when the provider has data for the address.
const SUCCESS_STATUS: &str = "success";

/// Resolves addresses against an ip-api.com compatible JSON endpoint.
///
/// Exactly one upstream request is made per lookup; there is no caching and no retry.
#[derive(Debug)]
pub struct IpApiProvider {
    client: Client,
    url_template: String,
}

impl IpApiProvider {
    pub fn new(config: ResolverConfig) -> anyhow::Result<Self> {
        if !config.url_template.contains(IP_PLACEHOLDER) {
            anyhow::bail!(
                "upstream URL template must contain an {} placeholder: {}",
                IP_PLACEHOLDER,
                config.url_template
            );
        }
        if config.timeout.is_zero() {
            anyhow::bail!("upstream timeout must be greater than zero");
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url_template: config.url_template,
        })
    }

    /// Looks up `ip`, which the caller must already have validated.
    pub async fn lookup(&self, ip: &str) -> Result<IpGeolocation, LookupError> {
        let url = self.url_template.replace(IP_PLACEHOLDER, ip);

        // The template may carry an API key, so URLs are stripped from errors before they are
        // logged or kept.
        let response = self.client.get(&url).send().await.map_err(|err| {
            let err = err.without_url();
            warn!("Upstream request for {} failed: {}", ip, err);
            LookupError::Unavailable(err)
        })?;

        let body = response.bytes().await.map_err(|err| {
            let err = err.without_url();
            warn!("Reading upstream response for {} failed: {}", ip, err);
            LookupError::Unavailable(err)
        })?;

        let payload: Value = serde_json::from_slice(&body).map_err(|err| {
            warn!("Upstream response for {} is not valid JSON: {}", ip, err);
            LookupError::MalformedPayload(err)
        })?;

        from_payload(ip, &payload)
    }
}

fn from_payload(ip: &str, payload: &Value) -> Result<IpGeolocation, LookupError> {
    if payload["status"].as_str() != Some(SUCCESS_STATUS) {
        let message = payload["message"].as_str().map(String::from);
        debug!(
            "Upstream has no data for {}: status={}, message={:?}",
            ip, payload["status"], message
        );
        return Err(LookupError::NotFound { message });
    }

    // Indexing a missing key yields `Value::Null`, so absent and mistyped fields both fall back
    // to their defaults.
    let text = |key: &str| payload[key].as_str().unwrap_or_default().to_owned();
    let number = |key: &str| payload[key].as_f64().unwrap_or_default();

    Ok(IpGeolocation {
        ip: ip.to_owned(),
        country: text("country"),
        region: text("regionName"),
        city: text("city"),
        latitude: number("lat"),
        longitude: number("lon"),
        timezone: text("timezone"),
        isp: text("isp"),
    })
}
