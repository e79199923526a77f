mod service;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_scalar::{Scalar, Servable};

use blurplefier::palette::ReferencePalette;
use blurplefier::{
    check_image_with, convert_image, Classification, ColorShare, ConvertedImage, Registry,
    RemapError,
};

use crate::service::cache::ConversionCache;
use crate::service::config::Config;
use crate::service::error::AppError;
use crate::service::source::{check_size, HttpImageSource, ImageSource};

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    cache: Arc<ConversionCache>,
    source: Arc<dyn ImageSource>,
    config: Arc<Config>,
}

impl AppState {
    fn new(config: Config, source: Arc<dyn ImageSource>) -> Self {
        Self {
            registry: Arc::new(Registry::builtin()),
            cache: Arc::new(ConversionCache::new(config.cache_ttl, config.cache_capacity)),
            source,
            config: Arc::new(config),
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Blurplefier API",
        description = "Recolor images with themed palettes and check palette conformance",
        version = "0.1.0"
    ),
    tags(
        (name = "Convert", description = "Palette recoloring"),
        (name = "Check", description = "Palette classification")
    ),
    paths(health, list_themes, convert, convert_url, check),
    components(schemas(
        ThemesResponse,
        ThemeInfo,
        ModifierInfo,
        PaletteInfo,
        NamedColor,
        ConvertUrlRequest,
        Classification,
        ColorShare
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Loaded config: {:?}", config);

    let source = Arc::new(
        HttpImageSource::new(Client::new(), config.max_image_bytes)
            .allow_private_hosts(config.allow_private_fetch),
    );
    let port = config.port;
    let app = router(AppState::new(config, source));

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    let body_limit = state.config.max_image_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/themes", get(list_themes))
        .route("/convert", post(convert))
        .route("/convert/url", post(convert_url))
        .route("/check", post(check))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .route("/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health() -> &'static str {
    "ok"
}

/// Get OpenAPI JSON specification
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(Serialize, ToSchema)]
struct NamedColor {
    name: String,
    /// `#rrggbb`
    hex: String,
}

#[derive(Serialize, ToSchema)]
struct ModifierInfo {
    name: String,
    /// Dark, middle and light slot
    colors: Vec<NamedColor>,
    /// Variation flags accepted with this modifier
    flags: Vec<String>,
}

#[derive(Serialize, ToSchema)]
struct PaletteInfo {
    name: String,
    colors: Vec<NamedColor>,
}

#[derive(Serialize, ToSchema)]
struct ThemeInfo {
    name: String,
    modifiers: Vec<ModifierInfo>,
    /// Reference palette used by `/check`
    reference: PaletteInfo,
}

#[derive(Serialize, ToSchema)]
struct ThemesResponse {
    themes: Vec<ThemeInfo>,
    methods: Vec<String>,
}

impl From<&ReferencePalette> for PaletteInfo {
    fn from(reference: &ReferencePalette) -> Self {
        Self {
            name: reference.name.to_string(),
            colors: reference
                .entries
                .iter()
                .map(|(name, rgb)| NamedColor {
                    name: name.to_string(),
                    hex: rgb.hex(),
                })
                .collect(),
        }
    }
}

/// List themes
///
/// Returns every modifier with its palette and accepted flags, the
/// available methods and each theme's reference palette.
#[utoipa::path(
    get,
    path = "/themes",
    tag = "Convert",
    responses(
        (status = 200, description = "Available themes", body = ThemesResponse)
    )
)]
async fn list_themes(State(state): State<AppState>) -> Json<ThemesResponse> {
    let themes = state
        .registry
        .themes()
        .iter()
        .map(|theme| ThemeInfo {
            name: theme.name.to_string(),
            modifiers: theme
                .palettes
                .iter()
                .map(|palette| ModifierInfo {
                    name: palette.modifier.to_string(),
                    colors: palette
                        .names
                        .iter()
                        .zip(palette.colors.iter())
                        .map(|(name, rgb)| NamedColor {
                            name: name.to_string(),
                            hex: rgb.hex(),
                        })
                        .collect(),
                    flags: theme.flags_for(palette.modifier),
                })
                .collect(),
            reference: PaletteInfo::from(&theme.reference),
        })
        .collect();

    let methods = state
        .registry
        .methods()
        .iter()
        .map(|m| m.name().to_string())
        .collect();

    Json(ThemesResponse { themes, methods })
}

fn default_method() -> String {
    "--remap".to_string()
}

/// Normalize a flag, accepting `more-white` as well as `++more-white`
///
/// A `+` in a query string decodes to a space, so both are stripped.
fn normalize_flag(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches(['+', ' ']);
    if name.is_empty() {
        None
    } else {
        Some(format!("++{}", name))
    }
}

fn parse_flags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| s.split(',').filter_map(normalize_flag).collect())
        .unwrap_or_default()
}

/// Query parameters for `/convert`
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ConvertParams {
    /// Palette modifier, e.g. `light`, `dark`, `pumpkin`
    modifier: String,
    /// `--filter`, `--remap` or `--edge-detect`
    #[serde(default = "default_method")]
    method: String,
    /// Comma separated variation flags, the `++` prefix is optional
    flags: Option<String>,
    /// Apply background flags, flattening transparency
    #[serde(default)]
    replace_background: bool,
}

/// Body for `/convert/url`
#[derive(Debug, Deserialize, ToSchema)]
struct ConvertUrlRequest {
    url: String,
    modifier: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    replace_background: bool,
}

/// Query parameters for `/check`
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct CheckParams {
    /// Reference palette name, defaults to `all`
    palette: Option<String>,
}

/// Convert an uploaded image
///
/// The request body is the raw PNG, JPEG or GIF. Still images come back as
/// PNG, animated GIFs as GIF.
#[utoipa::path(
    post,
    path = "/convert",
    tag = "Convert",
    params(ConvertParams),
    request_body(content = Vec<u8>, description = "Raw image bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Recolored image, GIF for animated input", content_type = "image/png"),
        (status = 400, description = "Unknown modifier, method or flag, or undecodable image"),
        (status = 413, description = "Image too large"),
        (status = 422, description = "Inconsistent animation"),
        (status = 504, description = "Conversion timed out")
    )
)]
async fn convert(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
    body: Bytes,
) -> Result<Response, AppError> {
    check_size(body.len(), state.config.max_image_bytes)?;

    let flags = parse_flags(params.flags.as_deref());
    run_conversion(
        &state,
        body.to_vec(),
        params.modifier,
        params.method,
        flags,
        params.replace_background,
    )
    .await
}

/// Convert an image fetched from a URL
#[utoipa::path(
    post,
    path = "/convert/url",
    tag = "Convert",
    request_body = ConvertUrlRequest,
    responses(
        (status = 200, description = "Recolored image, GIF for animated input", content_type = "image/png"),
        (status = 400, description = "Unknown modifier, method or flag, or undecodable image"),
        (status = 502, description = "Image could not be fetched"),
        (status = 504, description = "Conversion timed out")
    )
)]
async fn convert_url(
    State(state): State<AppState>,
    Json(request): Json<ConvertUrlRequest>,
) -> Result<Response, AppError> {
    // Reject bad settings before spending a fetch on them
    state.registry.palette(&request.modifier)?;
    state.registry.method(&request.method)?;

    let image = state.source.fetch(&request.url).await?;
    let flags = request
        .flags
        .iter()
        .filter_map(|f| normalize_flag(f))
        .collect();

    run_conversion(
        &state,
        image,
        request.modifier,
        request.method,
        flags,
        request.replace_background,
    )
    .await
}

/// Check palette conformance
///
/// Scores the uploaded image against a reference palette. The image passes
/// when at most 10% of it is made of other colors.
#[utoipa::path(
    post,
    path = "/check",
    tag = "Check",
    params(CheckParams),
    request_body(content = Vec<u8>, description = "Raw image bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Classification result", body = Classification),
        (status = 400, description = "Unknown palette or undecodable image"),
        (status = 504, description = "Check timed out")
    )
)]
async fn check(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
    body: Bytes,
) -> Result<Json<Classification>, AppError> {
    check_size(body.len(), state.config.max_image_bytes)?;

    let registry = state.registry.clone();
    let palette = params.palette.unwrap_or_else(|| "all".to_string());
    let image = body.to_vec();

    let result = run_blocking(state.config.convert_timeout, move || {
        check_image_with(&registry, &image, &palette)
    })
    .await?;

    tracing::info!(
        "Checked image: passed={}, {} colors",
        result.passed,
        result.colors.len()
    );

    Ok(Json(result))
}

/// Convert through the cache, off the async runtime
async fn run_conversion(
    state: &AppState,
    image: Vec<u8>,
    modifier: String,
    method: String,
    flags: Vec<String>,
    replace_background: bool,
) -> Result<Response, AppError> {
    let key = state
        .cache
        .key(&image, &modifier, &method, &flags, replace_background);

    if let Some(cached) = state.cache.get(&key).await {
        tracing::debug!("Cache hit for {}", cached.file_name);
        return Ok(image_response(&cached, "hit"));
    }

    let registry = state.registry.clone();
    let converted = run_blocking(state.config.convert_timeout, move || {
        convert_image(
            &registry,
            &image,
            &modifier,
            &method,
            &flags,
            replace_background,
        )
    })
    .await?;

    let converted = Arc::new(converted);
    state.cache.insert(key, converted.clone()).await;

    Ok(image_response(&converted, "miss"))
}

/// Run CPU-bound work on the blocking pool with a deadline
async fn run_blocking<T, F>(timeout: Duration, work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, RemapError> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(e)) => Err(AppError::Processing(e.to_string())),
        Err(_) => Err(AppError::Timeout(timeout)),
    }
}

fn image_response(image: &ConvertedImage, cache_status: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, image.format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", image.file_name),
            ),
            (X_CACHE, cache_status.to_string()),
        ],
        image.bytes.clone(),
    )
        .into_response()
}
