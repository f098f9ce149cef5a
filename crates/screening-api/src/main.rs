use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use std::{env, fs};

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utoipa::ToSchema;
use watchlist_core::{health_status, HealthStatus, RiskBands, ScoringPolicy, PROJECT_NAME};

mod audit;
mod auth;
mod iso20022;
mod orchestrator;
mod party;

use orchestrator::{OrchestratorError, ScreeningResponse};

const SERVICE_NAME: &str = "screening-api";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub viewer_output_dir: PathBuf,
    pub max_request_mib: u64,
    pub admin_key: Option<String>,
    pub scoring_policy: ScoringPolicy,
}

impl AppConfig {
    /// Reads every variable in SPEC_FULL.md §10.4, falling back to its
    /// documented default.
    fn from_env() -> Self {
        let bonus_per_list = env::var("BONUS_PER_LIST").ok().and_then(|v| v.parse().ok()).unwrap_or(3);
        let escalate_from = env::var("ESCALATE_FROM").ok().and_then(|v| v.parse().ok());
        let show_slight_matches = env::var("SHOW_SLIGHT_MATCHES")
            .ok()
            .map(|v| matches!(v.as_str(), "true" | "1"))
            .unwrap_or(false);

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string())),
            viewer_output_dir: PathBuf::from(
                env::var("VIEWER_OUTPUT_DIR").unwrap_or_else(|_| "./data/viewer".to_string()),
            ),
            max_request_mib: env::var("MAX_REQUEST_MIB").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            admin_key: Some(env::var("ADMIN_KEY").unwrap_or_else(|_| "dev-key".to_string())),
            scoring_policy: ScoringPolicy {
                risk_bands: RiskBands::default(),
                bonus_per_list,
                release_below: 25,
                review_from: 25,
                escalate_from,
                show_slight_matches,
            },
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<ingest::CatalogHandle>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cfg = AppConfig::from_env();
    init_metrics();

    fs::create_dir_all(&cfg.data_dir).expect("failed to create DATA_DIR");
    fs::create_dir_all(&cfg.viewer_output_dir).expect("failed to create VIEWER_OUTPUT_DIR");

    let catalog = Arc::new(ingest::CatalogHandle::new(
        cfg.data_dir.join("sanctions.db"),
        cfg.data_dir.join("name_index"),
    ));

    let bind_addr = cfg.bind_addr.clone();
    let state = AppState { config: Arc::new(cfg), catalog };

    let app = build_router(state);
    let addr: SocketAddr = bind_addr
        .parse()
        .unwrap_or_else(|e| panic!("BIND_ADDR must be a valid socket address, e.g. 0.0.0.0:8080: {e}"));

    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!(%addr, service = SERVICE_NAME, project = PROJECT_NAME, "listening");

    axum::serve(listener, app).await.expect("server error while serving requests");
}

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = (state.config.max_request_mib.max(1) * 1024 * 1024) as usize;

    let admin_routes = Router::new()
        .route("/refresh-lists", post(refresh_lists))
        .layer(middleware::from_fn_with_state(state.clone(), auth::admin_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/screen", post(screen))
        .route("/screen/file", post(screen_file))
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_metrics() {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
}

async fn health() -> Json<HealthStatus<'static>> {
    Json(health_status(SERVICE_NAME))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ReadyStatus {
    ready: bool,
    generation: u64,
    rows: usize,
    name_index_present: bool,
}

async fn ready(State(state): State<AppState>) -> Json<ReadyStatus> {
    let pinned = state.catalog.pin();
    Json(ReadyStatus {
        ready: pinned.generation > 0 && !pinned.entities.is_empty(),
        generation: pinned.generation,
        rows: pinned.entities.len(),
        name_index_present: pinned.index.is_some(),
    })
}

#[derive(Debug, Deserialize, ToSchema)]
struct ScreenRequest {
    xml: String,
}

async fn screen(
    State(state): State<AppState>,
    Json(req): Json<ScreenRequest>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let start = Instant::now();
    counter!("screening_requests_total", "endpoint" => "screen").increment(1);
    let result = orchestrator::screen_message(
        req.xml.as_bytes(),
        &state.catalog,
        &state.config.data_dir,
        &state.config.viewer_output_dir,
        &state.config.scoring_policy,
    )
    .await;
    histogram!("screening_latency_seconds", "endpoint" => "screen").record(start.elapsed().as_secs_f64());
    screening_result_response(result)
}

async fn screen_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let mut xml_bytes: Option<bytes::Bytes> = None;
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, "client_error", vec![e.to_string()]))?;
        let Some(field) = field else { break };
        xml_bytes = Some(
            field
                .bytes()
                .await
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, "client_error", vec![e.to_string()]))?,
        );
    }
    let Some(bytes) = xml_bytes else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "client_error",
            vec!["multipart request did not include a file part".to_string()],
        ));
    };

    let start = Instant::now();
    counter!("screening_requests_total", "endpoint" => "screen_file").increment(1);
    let result = orchestrator::screen_message(
        &bytes,
        &state.catalog,
        &state.config.data_dir,
        &state.config.viewer_output_dir,
        &state.config.scoring_policy,
    )
    .await;
    histogram!("screening_latency_seconds", "endpoint" => "screen_file").record(start.elapsed().as_secs_f64());
    screening_result_response(result)
}

fn screening_result_response(
    result: Result<ScreeningResponse, OrchestratorError>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    match result {
        Ok(response) => {
            let response_code = response.engine.response_code;
            let mut http_response = Json(response).into_response();
            http_response
                .headers_mut()
                .insert("X-Response-Code", HeaderValue::from_static(response_code));
            Ok(http_response)
        }
        Err(OrchestratorError::ClientError(msg)) => Err(api_error(StatusCode::BAD_REQUEST, "client_error", vec![msg])),
        Err(OrchestratorError::Internal(err)) => {
            tracing::error!(error = %err, "screening failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", vec![err.to_string()]))
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct RefreshResponse {
    status: &'static str,
    rows: usize,
    generation: u64,
}

async fn refresh_lists(State(state): State<AppState>) -> Result<Json<RefreshResponse>, (StatusCode, Json<ApiError>)> {
    counter!("refresh_requests_total").increment(1);
    let entities = ingest::fetch_all_sources(&state.config.data_dir)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", vec![e.to_string()]))?;

    match state.catalog.refresh(entities) {
        Ok(generation) => {
            let rows = state.catalog.pin().entities.len();
            tracing::info!(generation, rows, "refresh completed");
            Ok(Json(RefreshResponse { status: "rebuilt", rows, generation }))
        }
        Err(ingest::RefreshError::InProgress) => Err(api_error(
            StatusCode::CONFLICT,
            "REFRESH_IN_PROGRESS",
            vec!["a refresh is already running".to_string()],
        )),
        Err(ingest::RefreshError::Other(err)) => {
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", vec![err.to_string()]))
        }
    }
}

/// Single serialisable error body for the §7 taxonomy
/// (`{"error": "<code>", "message": "<text>"}`); each call site chooses
/// the matching HTTP status via [`api_error`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, details: Vec<String>) -> Self {
        Self { error: code.into(), message: details.join("; ") }
    }
}

fn api_error(status: StatusCode, code: &str, details: Vec<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError::new(code, details)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;
    use watchlist_core::{Classification, Entity};

    fn entity(list_name: &str, list_id: &str, name: &str) -> Entity {
        Entity {
            list_name: list_name.to_string(),
            list_id: list_id.to_string(),
            global_id: format!("{list_name}-{list_id}"),
            classification: Classification::Individual,
            primary_name: Some(name.to_string()),
            full_name: None,
            first_name: None,
            middle_name: None,
            last_name: None,
            other_first_name: None,
            aliases: vec![],
            birth_year: None,
            birth_month: None,
            birth_day: None,
            place_of_birth_text: None,
            sex: None,
            nationality: None,
            citizenship_country: None,
            citizenship_country_iso: None,
            primary_address: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            country_iso: None,
            addresses: vec![],
            bics: vec![],
            ibans: vec![],
            passport_numbers: vec![],
            national_id_numbers: vec![],
            tax_id_numbers: vec![],
            ssn_numbers: vec![],
            other_id_numbers: vec![],
            email_addresses: vec![],
            phone_numbers: vec![],
            websites: vec![],
            sanctions_program_name: None,
            justification_text: None,
            other_information_text: None,
            publication_date: None,
            enactment_date: None,
            effective_date: None,
        }
    }

    /// `test_state()` plus a catalog pre-seeded with `entities`, for S1-S6
    /// HTTP-boundary tests that must drive `/screen` without a real
    /// `/refresh-lists` network fetch (SPEC_FULL.md §10.7).
    fn seeded_state(entities: Vec<Entity>, show_slight_matches: bool) -> AppState {
        let mut state = test_state();
        let mut cfg = (*state.config).clone();
        cfg.scoring_policy.show_slight_matches = show_slight_matches;
        state.config = Arc::new(cfg);
        state.catalog.refresh(entities).unwrap();
        state
    }

    async fn post_screen(app: Router, xml: &str) -> (StatusCode, Option<String>, serde_json::Value) {
        let body = serde_json::json!({"xml": xml}).to_string();
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/screen")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let response_code_header =
            response.headers().get("X-Response-Code").map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, response_code_header, json)
    }

    fn test_state() -> AppState {
        let dir = std::env::temp_dir().join(format!("watchlist-api-test-{}-{}", std::process::id(), uuid::Uuid::new_v4()));
        let mut cfg = AppConfig::from_env();
        cfg.data_dir = dir.join("data");
        cfg.viewer_output_dir = dir.join("viewer");
        cfg.admin_key = Some("test-admin-key".to_string());
        std::fs::create_dir_all(&cfg.data_dir).unwrap();
        std::fs::create_dir_all(&cfg.viewer_output_dir).unwrap();
        let catalog = Arc::new(ingest::CatalogHandle::new(cfg.data_dir.join("sanctions.db"), cfg.data_dir.join("name_index")));
        AppState { config: Arc::new(cfg), catalog }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_reports_unbuilt_before_any_refresh() {
        let app = build_router(test_state());
        let response = app
            .oneshot(axum::http::Request::builder().uri("/ready").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ready"], false);
    }

    #[tokio::test]
    async fn refresh_lists_without_admin_key_is_rejected() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/refresh-lists")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn screen_rejects_malformed_xml_with_400() {
        let app = build_router(test_state());
        let body = serde_json::json!({"xml": "<NotAPaymentMessage/>"}).to_string();
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/screen")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // S1-S6: end-to-end HTTP-boundary scenarios from spec.md §8, driven
    // through `/screen` via `oneshot` rather than the narrower unit tests
    // in matching-core/watchlist-core (SPEC_FULL.md §10.7).

    #[tokio::test]
    async fn s1_clear_party_produces_no_matches() {
        let state = seeded_state(vec![entity("UK", "1", "Acme Global Holdings")], false);
        let app = build_router(state);
        let xml = r#"<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pacs.008.001.09">
            <FIToFICstmrCdtTrf><CdtTrfTxInf>
                <IntrBkSttlmAmt Ccy="USD">500.00</IntrBkSttlmAmt>
                <Dbtr><Nm>ACME Widgets Ltd</Nm><PstlAdr><Ctry>DE</Ctry></PstlAdr></Dbtr>
            </CdtTrfTxInf></FIToFICstmrCdtTrf>
        </Document>"#;
        let (status, response_code, json) = post_screen(app, xml).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_code.as_deref(), Some("NONE"));
        assert_eq!(json["engine"]["responseCode"], "NONE");
        assert_eq!(json["decision"]["recommendedAction"], "Release");
        assert_eq!(json["matches"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn s2_exact_bic_scores_at_least_90() {
        let state = seeded_state(
            vec![{
                let mut e = entity("OFAC_SDN", "10", "Banque Exemplaire");
                e.bics = vec!["BNPAFRPP".to_string()];
                e
            }],
            false,
        );
        let app = build_router(state);
        let xml = r#"<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pacs.008.001.09">
            <FIToFICstmrCdtTrf><CdtTrfTxInf>
                <IntrBkSttlmAmt Ccy="EUR">250.00</IntrBkSttlmAmt>
                <Dbtr><Nm>Banque Exemplaire</Nm><FinInstnId><BICFI>BNPAFRPP</BICFI></FinInstnId></Dbtr>
            </CdtTrfTxInf></FIToFICstmrCdtTrf>
        </Document>"#;
        let (status, response_code, json) = post_screen(app, xml).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_code.as_deref(), Some("VERY_HIGH_RISK"));
        let matches = json["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0]["finalScore"].as_i64().unwrap() >= 90);
        let fields: Vec<(String, String)> = matches[0]["matchedFields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| (f["field"].as_str().unwrap().to_string(), f["strength"].as_str().unwrap().to_string()))
            .collect();
        assert!(fields.contains(&("bic".to_string(), "exact".to_string())));
    }

    #[tokio::test]
    async fn s3_strong_name_and_exact_city_lands_in_high_risk_band() {
        let state = seeded_state(
            vec![{
                let mut e = entity("UN", "20", "Vladimir Sergeyevich Ivanovich Petrov Senior");
                e.city = Some("Moscow".to_string());
                e
            }],
            false,
        );
        let app = build_router(state);
        let xml = r#"<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pacs.008.001.09">
            <FIToFICstmrCdtTrf><CdtTrfTxInf>
                <IntrBkSttlmAmt Ccy="USD">100.00</IntrBkSttlmAmt>
                <Dbtr>
                    <Nm>Vladimir Sergeyevich Ivanovich Petrov</Nm>
                    <PstlAdr><TwnNm>Moscow</TwnNm></PstlAdr>
                </Dbtr>
            </CdtTrfTxInf></FIToFICstmrCdtTrf>
        </Document>"#;
        let (status, response_code, json) = post_screen(app, xml).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_code.as_deref(), Some("HIGH_RISK"));
        assert_eq!(json["engine"]["riskLevel"], "high risk");
        let matches = json["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        let score = matches[0]["finalScore"].as_i64().unwrap();
        assert!((70..=89).contains(&score), "expected finalScore in [70, 89], got {score}");
        let fields: Vec<(String, String)> = matches[0]["matchedFields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| (f["field"].as_str().unwrap().to_string(), f["strength"].as_str().unwrap().to_string()))
            .collect();
        assert!(fields.contains(&("name".to_string(), "name_strong".to_string())));
        assert!(fields.contains(&("town".to_string(), "exact".to_string())));
    }

    #[tokio::test]
    async fn s4_dob_veto_excludes_the_record_entirely() {
        let state = seeded_state(
            vec![{
                let mut e = entity("OFAC_CONS", "30", "Ivan Ivanov");
                e.birth_year = Some(1985);
                e.birth_month = Some(5);
                e.birth_day = Some(1);
                e
            }],
            false,
        );
        let app = build_router(state);
        let xml = r#"<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pacs.008.001.09">
            <FIToFICstmrCdtTrf><CdtTrfTxInf>
                <IntrBkSttlmAmt Ccy="USD">100.00</IntrBkSttlmAmt>
                <Dbtr>
                    <Nm>Ivan Ivanov</Nm>
                    <Id><PrvtId><DtAndPlcOfBirth><BirthDt>1970-05-01</BirthDt></DtAndPlcOfBirth></PrvtId></Id>
                </Dbtr>
            </CdtTrfTxInf></FIToFICstmrCdtTrf>
        </Document>"#;
        let (status, response_code, json) = post_screen(app, xml).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_code.as_deref(), Some("NONE"));
        assert_eq!(json["matches"].as_array().unwrap().len(), 0);
        assert_eq!(json["engine"]["matchCounts"]["total"], 0);
    }

    #[tokio::test]
    async fn s5_slight_risk_suppressed_by_default_and_shown_when_toggled() {
        let entities = vec![{
            let mut e = entity("UK", "40", "John Vanderveld");
            e.aliases = vec!["the village johnny".to_string()];
            e.country_iso = Some("RU".to_string());
            e
        }];
        let xml = r#"<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pacs.008.001.09">
            <FIToFICstmrCdtTrf><CdtTrfTxInf>
                <IntrBkSttlmAmt Ccy="USD">100.00</IntrBkSttlmAmt>
                <Dbtr>
                    <Nm>John of the Village</Nm>
                    <PstlAdr><Ctry>RU</Ctry></PstlAdr>
                </Dbtr>
            </CdtTrfTxInf></FIToFICstmrCdtTrf>
        </Document>"#;

        let app = build_router(seeded_state(entities.clone(), false));
        let (status, response_code, json) = post_screen(app, xml).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_code.as_deref(), Some("SLIGHT_RISK"));
        assert_eq!(json["matches"].as_array().unwrap().len(), 0);
        assert_eq!(json["engine"]["matchCounts"]["byRiskLevel"]["slight risk"], 1);

        let app = build_router(seeded_state(entities, true));
        let (_, _, json) = post_screen(app, xml).await;
        let matches = json["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["riskLevel"], "slight risk");
    }

    #[tokio::test]
    async fn s6_multi_list_hits_aggregate_with_per_list_bonus() {
        let entities = vec![
            entity("OFAC_SDN", "50", "Alpha Bravo Charlie Delta Echo Foxtrot Golf Hotel India Juliet"),
            entity("UK", "51", "Alpha Bravo Charlie Delta Echo Foxtrot Golf Kilo Lima Mike"),
        ];
        let state = seeded_state(entities, false);
        let app = build_router(state);
        let xml = r#"<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pacs.008.001.09">
            <FIToFICstmrCdtTrf><CdtTrfTxInf>
                <IntrBkSttlmAmt Ccy="USD">100.00</IntrBkSttlmAmt>
                <Dbtr><Nm>Alpha Bravo Charlie Delta Echo Foxtrot Golf</Nm></Dbtr>
            </CdtTrfTxInf></FIToFICstmrCdtTrf>
        </Document>"#;
        let (status, response_code, json) = post_screen(app, xml).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response_code.as_deref(), Some("MODERATE_RISK"));
        assert_eq!(json["engine"]["riskScore"], 63);
        assert_eq!(json["engine"]["riskLevel"], "moderate risk");
        assert_eq!(json["matches"].as_array().unwrap().len(), 2);
    }
}
