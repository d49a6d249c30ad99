use log::debug;
use poem::{
    http::StatusCode,
    middleware::{Cors, Tracing},
    web::RemoteAddr,
    EndpointExt, Response, Route,
};
use poem_openapi::{
    param::Path,
    payload::Json,
    registry::{MetaMediaType, MetaResponse, MetaResponses, Registry},
    types::{ToJSON, Type},
    ApiResponse, Object, OpenApi, OpenApiService,
};

use crate::{
    providers::{IpApiProvider, IpGeolocation, LookupError},
    validator::validate_ipv4,
};

pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug)]
struct Api {
    provider: IpApiProvider,
}

#[derive(Debug)]
pub enum ApiError {
    InvalidIpAddress,
    InvalidClientIpAddress(String),
    IpAddressNotFound,
    UpstreamUnavailable,
}

#[derive(Debug, Object)]
struct ApiErrorResponse {
    error: String,
}

#[derive(Debug, Object)]
struct HealthStatus {
    status: String,
}

/// Builds the full application: the versioned API plus its OpenAPI document and Swagger UI.
pub fn build_app(provider: IpApiProvider) -> Route {
    let api_service =
        OpenApiService::new(Api::new(provider), "ipgeo-proxy", env!("CARGO_PKG_VERSION"))
            .server(API_PREFIX);

    Route::new()
        .nest("/openapi", api_service.spec_endpoint())
        .nest("/swagger", api_service.swagger_ui())
        .nest(API_PREFIX, api_service.with(Cors::new()).with(Tracing))
}

impl Api {
    fn new(provider: IpApiProvider) -> Self {
        Self { provider }
    }

    async fn resolve(&self, ip: &str) -> Result<Json<IpGeolocation>, ApiError> {
        Ok(Json(self.provider.lookup(ip).await?))
    }
}

#[OpenApi]
impl Api {
    #[oai(path = "/health", method = "get")]
    /// Liveness probe; never touches the geolocation provider
    async fn health(&self) -> Json<HealthStatus> {
        Json(HealthStatus {
            status: "ok".into(),
        })
    }

    #[oai(path = "/geo/:ip", method = "get")]
    /// Gets geolocation metadata for the IPv4 address in the path
    async fn get_geo(&self, ip: Path<String>) -> Result<Json<IpGeolocation>, ApiError> {
        if !validate_ipv4(&ip.0) {
            debug!("Rejected invalid IP address {:?}", ip.0);
            return Err(ApiError::InvalidIpAddress);
        }

        self.resolve(&ip.0).await
    }

    #[oai(path = "/geo", method = "get")]
    /// Gets geolocation metadata for the IPv4 address of the calling client
    async fn get_client_geo(
        &self,
        remote_addr: &RemoteAddr,
    ) -> Result<Json<IpGeolocation>, ApiError> {
        // IPv4 clients on a dual-stack listener show up as `::ffff:a.b.c.d`.
        let client_ip = match remote_addr.0.as_socket_addr() {
            Some(addr) => addr.ip().to_canonical().to_string(),
            None => remote_addr.0.to_string(),
        };

        if !validate_ipv4(&client_ip) {
            debug!("Rejected invalid client IP address {:?}", client_ip);
            return Err(ApiError::InvalidClientIpAddress(client_ip));
        }

        self.resolve(&client_ip).await
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIpAddress | Self::InvalidClientIpAddress(_) => StatusCode::BAD_REQUEST,
            Self::IpAddressNotFound => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::NotFound { .. } => Self::IpAddressNotFound,
            LookupError::Unavailable(_) | LookupError::MalformedPayload(_) => {
                Self::UpstreamUnavailable
            }
        }
    }
}

fn error_meta(status: u16, description: &'static str) -> MetaResponse {
    MetaResponse {
        description,
        status: Some(status),
        content: vec![MetaMediaType {
            content_type: "application/json",
            schema: ApiErrorResponse::schema_ref(),
        }],
        headers: vec![],
    }
}

impl ApiResponse for ApiError {
    fn meta() -> MetaResponses {
        MetaResponses {
            responses: vec![
                error_meta(400, "Invalid IPv4 address"),
                error_meta(404, "No geolocation data for the address"),
                error_meta(502, "Geolocation provider unreachable"),
            ],
        }
    }

    fn register(registry: &mut Registry) {
        <ApiErrorResponse as Type>::register(registry);
    }
}

impl From<ApiError> for poem::Error {
    fn from(value: ApiError) -> Self {
        let status_code = value.status_code();
        let response: ApiErrorResponse = value.into();

        Self::from_response(
            Response::builder()
                .status(status_code)
                .content_type("application/json")
                .body(response.to_json_string()),
        )
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(value: ApiError) -> Self {
        let error = match value {
            ApiError::InvalidIpAddress => "Invalid IP address".into(),
            ApiError::InvalidClientIpAddress(ip) => format!("Invalid client IP address: {ip}"),
            ApiError::IpAddressNotFound => "IP information not found".into(),
            ApiError::UpstreamUnavailable => "Failed to fetch data from geolocation service".into(),
        };

        Self { error }
    }
}
