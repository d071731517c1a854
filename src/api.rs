//! REST API for the carton calculator.
//!
//! Provides HTTP endpoints for communication with the frontend.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::ApiConfig;
use crate::layout::{HierarchyGeometry, LayoutConfig, LevelGeometry, resolve_hierarchy};
use crate::model::{
    CalcInput, HierarchyWeights, MassUnit, MasterDims, ValidationError, WeightLevel, WeightMode,
};
use crate::scene::{BoxLevel, Scene, SceneBox, ViewMode, build_scene, build_scene_with_progress};
use crate::weights::resolve_weights;

#[derive(Clone)]
struct ApiState {
    layout_config: LayoutConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>cartonizer API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Request structure for the calculation endpoints.
///
/// One snapshot of the calculator form. Weight fields default to grams,
/// the view to the master-only preview.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "weight_mode": "net",
        "unit_weight": 500.0,
        "weight_unit": "g",
        "units_per_master": 24,
        "master_tare_g": 2000.0,
        "inners_per_master": 4,
        "dims_cm": [40.0, 30.0, 20.0],
        "view": "packed",
        "fullscreen": false
    })
)]
pub struct CalcRequest {
    pub weight_mode: WeightMode,
    pub unit_weight: f64,
    #[serde(default)]
    pub weight_unit: MassUnit,
    pub units_per_master: u32,
    #[serde(default)]
    pub master_tare_g: f64,
    #[serde(default)]
    #[schema(nullable = true)]
    pub inners_per_master: Option<u32>,
    #[serde(default)]
    #[schema(value_type = Option<[f64; 3]>, nullable = true)]
    pub dims_cm: Option<(f64, f64, f64)>,
    #[serde(default)]
    pub view: ViewMode,
    #[serde(default)]
    pub fullscreen: bool,
}

#[derive(Debug)]
struct ValidatedCalcRequest {
    input: CalcInput,
    view: ViewMode,
    fullscreen: bool,
}

#[derive(Debug)]
enum CalcRequestValidationError {
    InvalidDimensions(ValidationError),
    InvalidParameters(ValidationError),
}

impl CalcRequest {
    fn into_validated(self) -> Result<ValidatedCalcRequest, CalcRequestValidationError> {
        let dims = match self.dims_cm {
            Some(cm) => Some(
                MasterDims::new(cm).map_err(CalcRequestValidationError::InvalidDimensions)?,
            ),
            None => None,
        };

        let input = CalcInput::new(
            self.weight_mode,
            self.unit_weight,
            self.weight_unit,
            self.units_per_master,
            self.master_tare_g,
            self.inners_per_master,
            dims,
        )
        .map_err(CalcRequestValidationError::InvalidParameters)?;

        Ok(ValidatedCalcRequest {
            input,
            view: self.view,
            fullscreen: self.fullscreen,
        })
    }
}

/// Layout triple of one nesting level in the response.
#[derive(Serialize, ToSchema)]
pub struct LayoutInfo {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

/// Per-level geometry in the response.
///
/// # Fields
/// * `layout` - Items per axis inside the parent
/// * `dims_px` - Sub-box size on screen
/// * `dims_cm` - Sub-box size in centimeters (length, height, width)
#[derive(Serialize, ToSchema)]
pub struct LevelReport {
    pub layout: LayoutInfo,
    #[schema(value_type = [f64; 3])]
    pub dims_px: (f64, f64, f64),
    #[schema(value_type = [f64; 3])]
    pub dims_cm: (f64, f64, f64),
}

impl LevelReport {
    fn from_level(level: &LevelGeometry) -> Self {
        Self {
            layout: LayoutInfo {
                nx: level.layout.nx,
                ny: level.layout.ny,
                nz: level.layout.nz,
            },
            dims_px: level.px.as_tuple(),
            dims_cm: level.cm.as_tuple(),
        }
    }
}

/// Resolved hierarchy geometry in the response.
#[derive(Serialize, ToSchema)]
pub struct GeometryReport {
    /// Pixels per centimeter after canvas normalization
    pub scale: f64,
    #[schema(value_type = [f64; 3])]
    pub master_px: (f64, f64, f64),
    #[schema(value_type = [f64; 3])]
    pub master_cm: (f64, f64, f64),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<LevelReport>,
    pub unit: LevelReport,
    pub inner_count: u32,
    pub units_per_parent: u32,
}

impl GeometryReport {
    fn from_geometry(geometry: &HierarchyGeometry) -> Self {
        Self {
            scale: geometry.scale,
            master_px: geometry.master_px.as_tuple(),
            master_cm: geometry.master_cm.as_tuple(),
            inner: geometry.inner.as_ref().map(LevelReport::from_level),
            unit: LevelReport::from_level(&geometry.unit),
            inner_count: geometry.inner_count,
            units_per_parent: geometry.units_per_parent,
        }
    }
}

/// Response structure with weights, geometry and the requested scene.
#[derive(Serialize, ToSchema)]
pub struct CalcResponse {
    pub weights: HierarchyWeights,
    pub geometry: GeometryReport,
    pub scene: Scene,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn dimension_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid master dimensions",
        details,
    )
}

fn parse_calc_request(
    payload: Result<Json<CalcRequest>, JsonRejection>,
) -> Result<ValidatedCalcRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated() {
        Ok(validated) => Ok(validated),
        Err(CalcRequestValidationError::InvalidDimensions(err)) => {
            Err(dimension_error(err.to_string()))
        }
        Err(CalcRequestValidationError::InvalidParameters(err)) => {
            Err(validation_error(err.to_string()))
        }
    }
}

/// Runs the full recomputation for one validated request.
///
/// Weight hierarchy, layout resolution and scene assembly happen together
/// so the response is always internally consistent.
fn compute_response(request: &ValidatedCalcRequest, config: &LayoutConfig) -> CalcResponse {
    let weights = resolve_weights(&request.input);
    let geometry = resolve_hierarchy(&request.input, config, request.fullscreen);
    let scene = build_scene(&geometry, request.view, config);

    CalcResponse {
        weights,
        geometry: GeometryReport::from_geometry(&geometry),
        scene,
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_calculate, handle_calculate_stream),
    components(
        schemas(
            CalcRequest,
            CalcResponse,
            GeometryReport,
            LevelReport,
            LayoutInfo,
            ErrorResponse,
            HierarchyWeights,
            WeightLevel,
            WeightMode,
            MassUnit,
            MasterDims,
            Scene,
            SceneBox,
            ViewMode,
            BoxLevel
        )
    ),
    tags((name = "calculator", description = "Endpoints for carton hierarchy calculation"))
)]
struct ApiDoc;

/// Starts the API server.
///
/// Configures CORS for cross-origin requests from the frontend.
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, layout_config: LayoutConfig) {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { layout_config };

    let app = Router::new()
        // API endpoints
        .route("/calculate", post(handle_calculate))
        .route("/calculate_stream", post(handle_calculate_stream))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        // Web-UI (embedded)
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(cors)
        .with_state(state);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            panic!("❌ Could not bind API server to {}: {}", addr, err);
        }
    };

    let display_host = config.display_host().to_string();
    println!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 API Endpoints:");
    println!("   - POST /calculate");
    println!("   - POST /calculate_stream");
    println!("📑 Documentation:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");
    println!("🌐 Web-UI: http://{}:{}", display_host, config.port());

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /calculate endpoint.
///
/// Derives per-level weights, CBM, packing layouts and the scene for the
/// requested view mode.
///
/// # Parameters
/// * `payload` - JSON payload with the calculator form snapshot
///
/// # Returns
/// JSON response with weights, geometry and scene
#[utoipa::path(
    post,
    path = "/calculate",
    request_body = CalcRequest,
    responses(
        (status = 200, description = "Successfully calculated hierarchy", body = CalcResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request parameters",
            body = ErrorResponse
        )
    ),
    tag = "calculator"
)]
async fn handle_calculate(
    State(state): State<ApiState>,
    payload: Result<Json<CalcRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_calc_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    println!(
        "📥 New calculation request: {} units, {} inner cartons, view {:?}",
        request.input.units_per_master,
        request.input.inner_count(),
        request.view
    );

    let response = compute_response(&request, &state.layout_config);
    println!(
        "📦 Scene: {} boxes of {} cells{}",
        response.scene.rendered,
        response.scene.total_cells,
        if response.scene.truncated {
            " (truncated)"
        } else {
            ""
        }
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /calculate_stream endpoint (SSE).
///
/// Streams scene boxes in real-time as Server-Sent Events
/// (text/event-stream) so the frontend can build the preview progressively
/// instead of waiting for the complete scene.
#[utoipa::path(
    post,
    path = "/calculate_stream",
    request_body = CalcRequest,
    responses(
        (
            status = 200,
            description = "Streams scene boxes in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request parameters",
            body = ErrorResponse
        )
    ),
    tag = "calculator"
)]
async fn handle_calculate_stream(
    State(state): State<ApiState>,
    payload: Result<Json<CalcRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_calc_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);
    let layout_config = state.layout_config;

    tokio::task::spawn_blocking(move || {
        let geometry = resolve_hierarchy(&request.input, &layout_config, request.fullscreen);
        let _ = build_scene_with_progress(&geometry, request.view, &layout_config, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                if tx.blocking_send(json).is_err() {
                    // Receiver has closed the stream; remaining events are discarded.
                    return;
                }
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(json: &str) -> CalcRequest {
        serde_json::from_str(json).expect("Should parse valid JSON")
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        assert!(
            paths.contains_key("/calculate"),
            "OpenAPI documentation is missing the /calculate path"
        );
        assert!(
            paths.contains_key("/calculate_stream"),
            "OpenAPI documentation is missing the /calculate_stream path"
        );
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        let schemas = &components.schemas;
        for name in ["CalcRequest", "CalcResponse", "ErrorResponse", "Scene"] {
            assert!(
                schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn calc_request_parses_minimal_payload_with_defaults() {
        let request = sample_request(
            r#"{
                "weight_mode": "net",
                "unit_weight": 500.0,
                "units_per_master": 24
            }"#,
        );

        assert_eq!(request.weight_unit, MassUnit::G);
        assert!((request.master_tare_g - 0.0).abs() < 1e-9);
        assert_eq!(request.inners_per_master, None);
        assert_eq!(request.dims_cm, None);
        assert_eq!(request.view, ViewMode::Master);
        assert!(!request.fullscreen);
    }

    #[test]
    fn calc_request_parses_inners_when_present() {
        let request = sample_request(
            r#"{
                "weight_mode": "gross",
                "unit_weight": 0.5,
                "weight_unit": "kg",
                "units_per_master": 24,
                "inners_per_master": 4
            }"#,
        );
        assert_eq!(request.inners_per_master, Some(4));
        assert_eq!(request.weight_unit, MassUnit::Kg);
        assert_eq!(request.weight_mode, WeightMode::Gross);
    }

    #[test]
    fn calc_request_parses_inners_when_null() {
        let request = sample_request(
            r#"{
                "weight_mode": "net",
                "unit_weight": 500.0,
                "units_per_master": 24,
                "inners_per_master": null
            }"#,
        );
        assert_eq!(
            request.inners_per_master, None,
            "inners_per_master should be None when field is explicitly null"
        );
    }

    #[test]
    fn calc_request_parses_view_modes() {
        for (raw, expected) in [
            ("master", ViewMode::Master),
            ("exploded", ViewMode::Exploded),
            ("packed", ViewMode::Packed),
        ] {
            let request = sample_request(&format!(
                r#"{{
                    "weight_mode": "net",
                    "unit_weight": 1.0,
                    "units_per_master": 1,
                    "view": "{}"
                }}"#,
                raw
            ));
            assert_eq!(request.view, expected);
        }
    }

    #[test]
    fn validated_request_carries_dims() {
        let request = sample_request(
            r#"{
                "weight_mode": "net",
                "unit_weight": 500.0,
                "units_per_master": 24,
                "dims_cm": [40.0, 30.0, 20.0]
            }"#,
        );

        let validated = request
            .into_validated()
            .expect("Should validate successfully");
        let dims = validated.input.dims.expect("dims missing");
        assert_eq!(dims.cm, (40.0, 30.0, 20.0));
    }

    #[test]
    fn validation_rejects_negative_weight() {
        let request = sample_request(
            r#"{
                "weight_mode": "net",
                "unit_weight": -1.0,
                "units_per_master": 24
            }"#,
        );
        assert!(matches!(
            request.into_validated(),
            Err(CalcRequestValidationError::InvalidParameters(_))
        ));
    }

    #[test]
    fn validation_rejects_negative_dimension() {
        let request = sample_request(
            r#"{
                "weight_mode": "net",
                "unit_weight": 1.0,
                "units_per_master": 24,
                "dims_cm": [40.0, -30.0, 20.0]
            }"#,
        );
        assert!(matches!(
            request.into_validated(),
            Err(CalcRequestValidationError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn compute_response_reference_scenario() {
        let request = sample_request(
            r#"{
                "weight_mode": "net",
                "unit_weight": 500.0,
                "units_per_master": 24,
                "master_tare_g": 2000.0,
                "dims_cm": [40.0, 30.0, 20.0],
                "view": "packed"
            }"#,
        )
        .into_validated()
        .expect("Should validate successfully");

        let response = compute_response(&request, &LayoutConfig::default());

        assert!((response.weights.master.net_g - 12_000.0).abs() < 1e-6);
        assert!((response.weights.master.gross_g - 14_000.0).abs() < 1e-6);
        assert!((response.weights.master.cbm.unwrap() - 0.024).abs() < 1e-9);

        // 24 units slice the 40x30x20 master into 10 cm cubes
        assert_eq!(response.geometry.unit.layout.nx, 4);
        assert_eq!(response.geometry.unit.layout.ny, 2);
        assert_eq!(response.geometry.unit.layout.nz, 3);
        assert!((response.geometry.unit.dims_cm.0 - 10.0).abs() < 1e-6);

        // Master shell + 24 unit cells
        assert_eq!(response.scene.rendered, 25);
        assert!(!response.scene.truncated);
        assert!(
            response
                .scene
                .boxes
                .iter()
                .filter(|b| b.level == BoxLevel::Unit)
                .count()
                == 24
        );
    }

    #[test]
    fn compute_response_exploded_with_inners() {
        let request = sample_request(
            r#"{
                "weight_mode": "net",
                "unit_weight": 100.0,
                "units_per_master": 24,
                "inners_per_master": 4,
                "dims_cm": [40.0, 30.0, 20.0],
                "view": "exploded"
            }"#,
        )
        .into_validated()
        .expect("Should validate successfully");

        let response = compute_response(&request, &LayoutConfig::default());

        assert_eq!(response.geometry.inner_count, 4);
        assert_eq!(response.geometry.units_per_parent, 6);
        assert!(response.geometry.inner.is_some());
        assert_eq!(response.scene.boxes.len(), 3);
        let inner_weights = response.weights.inner.expect("inner weights missing");
        assert!((inner_weights.pcs - 6.0).abs() < 1e-9);
    }
}
