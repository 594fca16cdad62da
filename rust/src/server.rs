use anyhow::{anyhow, Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;

use crate::config_store::ConfigStore;
use crate::controller::{Effect, Event, GenerationController, Notice, NoticeLevel, Phase};
use crate::credential_store::CredentialStore;
use crate::form_state::{FormEdit, FormState};
use crate::generation_client::{GenerationClient, GenerationRequest, GenerationResult};
use crate::main_ui_html::build_main_ui_html;
use crate::presets::ASPECT_RATIOS;

pub struct AppState {
    pub config: Mutex<ConfigStore>,
    pub credentials: Mutex<CredentialStore>,
    pub controller: Mutex<GenerationController>,
    pub client: GenerationClient,
    pub server_port: AtomicU16,
}

type ApiResponse = (StatusCode, Json<Value>);

impl AppState {
    pub fn new(
        config: ConfigStore,
        credentials: CredentialStore,
        controller: GenerationController,
        client: GenerationClient,
    ) -> Self {
        Self {
            config: Mutex::new(config),
            credentials: Mutex::new(credentials),
            controller: Mutex::new(controller),
            client,
            server_port: AtomicU16::new(0),
        }
    }
}

pub struct AppServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl AppServer {
    pub fn start(state: Arc<AppState>, preferred_port: u16) -> Result<Self> {
        let listener = bind_listener(preferred_port)?;
        let port = listener
            .local_addr()
            .context("failed to inspect server local address")?
            .port();
        listener
            .set_nonblocking(true)
            .context("failed to set listener non-blocking")?;

        state.server_port.store(port, Ordering::Relaxed);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread_handle = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();
            let runtime = match runtime {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::error!(error = %err, "failed to build server runtime");
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to adopt server listener");
                        return;
                    }
                };

                let app = build_router(state);
                let server = axum::serve(listener, app).with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                });
                if let Err(err) = server.await {
                    tracing::error!(error = %err, "server stopped with error");
                }
            });
        });

        tracing::info!(port, "ui server listening");
        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            thread_handle: Some(thread_handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!(port = self.port, "ui server stopped");
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Serialize)]
struct UiSnapshot {
    phase: Phase,
    loading: bool,
    form: FormState,
    result: Option<GenerationResult>,
    status: String,
    elapsed_ms: Option<u64>,
    last_elapsed_ms: Option<u64>,
    has_api_key: bool,
}

#[derive(Debug, Deserialize)]
struct ApiKeyReq {
    api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateReq {
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AspectRatioReq {
    ratio: String,
}

#[derive(Debug, Deserialize)]
struct HighResolutionReq {
    enabled: bool,
}

struct PendingRequest {
    request_id: u64,
    request: GenerationRequest,
    api_key: String,
}

#[derive(Default)]
struct Applied {
    pending: Option<PendingRequest>,
    notices: Vec<Notice>,
}

fn build_router(state: Arc<AppState>) -> Router {
    let port = state.server_port.load(Ordering::Relaxed);
    let local_origin = HeaderValue::from_str(&format!("http://127.0.0.1:{port}"))
        .expect("127.0.0.1 origin should be valid");
    let localhost_origin = HeaderValue::from_str(&format!("http://localhost:{port}"))
        .expect("localhost origin should be valid");

    let cors = CorsLayer::new()
        .allow_origin([local_origin, localhost_origin])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(get_main_page))
        .route("/ping", get(get_ping))
        .route("/app/init", get(get_app_init))
        .route("/app/state", get(get_app_state))
        .route("/app/form", post(post_app_form))
        .route("/app/aspect-ratio", post(post_app_aspect_ratio))
        .route("/app/high-resolution", post(post_app_high_resolution))
        .route("/app/api-key", post(post_app_api_key))
        .route("/app/api-key/clear", post(post_app_clear_api_key))
        .route("/app/generate", post(post_app_generate))
        .layer(cors)
        .with_state(state)
}

async fn get_main_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(build_main_ui_html(state.client.endpoint().as_str()))
}

async fn get_ping() -> ApiResponse {
    ok_json(json!({}))
}

async fn get_app_init(State(state): State<Arc<AppState>>) -> ApiResponse {
    let Ok(controller) = state.controller.lock() else {
        return err_json(StatusCode::INTERNAL_SERVER_ERROR, "controller lock error");
    };
    let snapshot = build_ui_snapshot(&controller, Instant::now());
    let api_key = controller.state().api_key.clone();
    drop(controller);

    let mut payload = snapshot_value(&snapshot, &[]);
    payload["api_key"] = Value::String(api_key);
    payload["presets"] = json!(ASPECT_RATIOS);
    payload["endpoint"] = Value::String(state.client.endpoint().to_string());
    ok_json(payload)
}

async fn get_app_state(State(state): State<Arc<AppState>>) -> ApiResponse {
    respond(&state, Vec::new())
}

async fn post_app_form(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FormEdit>,
) -> ApiResponse {
    run_event(&state, Event::FormEdited(payload))
}

async fn post_app_aspect_ratio(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AspectRatioReq>,
) -> ApiResponse {
    let ratio = payload.ratio.trim().to_string();
    if ratio.is_empty() {
        return err_json(StatusCode::BAD_REQUEST, "ratio is required");
    }
    run_event(&state, Event::AspectRatioSelected(ratio))
}

async fn post_app_high_resolution(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<HighResolutionReq>,
) -> ApiResponse {
    run_event(&state, Event::HighResolutionToggled(payload.enabled))
}

async fn post_app_api_key(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ApiKeyReq>,
) -> ApiResponse {
    run_event(&state, Event::ApiKeyEntered(payload.api_key))
}

async fn post_app_clear_api_key(State(state): State<Arc<AppState>>) -> ApiResponse {
    run_event(&state, Event::ApiKeyCleared)
}

async fn post_app_generate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateReq>,
) -> ApiResponse {
    let mut notices = Vec::new();

    // The page sends the key field with the submit so a key typed just before
    // clicking is used even if its own save has not landed yet.
    if let Some(api_key) = payload.api_key {
        let changed = match state.controller.lock() {
            Ok(controller) => controller.state().api_key != api_key,
            Err(_) => {
                return err_json(StatusCode::INTERNAL_SERVER_ERROR, "controller lock error")
            }
        };
        if changed {
            let effects = match dispatch(&state, Event::ApiKeyEntered(api_key)) {
                Ok(effects) => effects,
                Err(response) => return response,
            };
            notices.extend(apply_effects(&state, effects).notices);
        }
    }

    let effects = match dispatch(&state, Event::Submit) {
        Ok(effects) => effects,
        Err(response) => return response,
    };
    let applied = apply_effects(&state, effects);
    let pending = applied.pending;
    notices.extend(applied.notices);

    if let Some(pending) = pending {
        let PendingRequest {
            request_id,
            request,
            api_key,
        } = pending;
        tracing::info!(
            request_id,
            model = %request.model,
            width = request.width,
            height = request.height,
            steps = request.steps,
            "sending generation request"
        );

        let outcome = state.client.send(&request, &api_key).await;
        match &outcome {
            Ok(_) => tracing::info!(request_id, "generation succeeded"),
            Err(err) => {
                tracing::warn!(request_id, kind = err.kind(), error = %err, "generation failed")
            }
        }

        let effects = match dispatch(
            &state,
            Event::Completed {
                request_id,
                outcome,
            },
        ) {
            Ok(effects) => effects,
            Err(response) => return response,
        };
        if effects.is_empty() {
            tracing::debug!(request_id, "superseded generation response dropped");
        }
        notices.extend(apply_effects(&state, effects).notices);
    }

    respond(&state, notices)
}

fn run_event(state: &AppState, event: Event) -> ApiResponse {
    let effects = match dispatch(state, event) {
        Ok(effects) => effects,
        Err(response) => return response,
    };
    let applied = apply_effects(state, effects);
    respond(state, applied.notices)
}

fn dispatch(state: &AppState, event: Event) -> std::result::Result<Vec<Effect>, ApiResponse> {
    let Ok(mut controller) = state.controller.lock() else {
        return Err(err_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            "controller lock error",
        ));
    };
    Ok(controller.dispatch(event, Instant::now()))
}

fn apply_effects(state: &AppState, effects: Vec<Effect>) -> Applied {
    let mut applied = Applied::default();

    for effect in effects {
        match effect {
            Effect::SendRequest {
                request_id,
                request,
                api_key,
            } => {
                applied.pending = Some(PendingRequest {
                    request_id,
                    request,
                    api_key,
                });
            }
            Effect::StoreCredential(api_key) => {
                let result = match state.credentials.lock() {
                    Ok(store) => store.store(&api_key).map_err(|err| err.to_string()),
                    Err(_) => Err("credential store lock error".to_string()),
                };
                if let Err(message) = result {
                    tracing::warn!(error = %message, "failed to save API key");
                    applied
                        .notices
                        .push(Notice::error(format!("Failed to save API key: {message}")));
                }
            }
            Effect::ClearCredential => {
                let result = match state.credentials.lock() {
                    Ok(store) => store.clear().map_err(|err| err.to_string()),
                    Err(_) => Err("credential store lock error".to_string()),
                };
                match result {
                    Ok(removed) => tracing::info!(removed, "stored API key cleared"),
                    Err(message) => {
                        tracing::warn!(error = %message, "failed to clear API key");
                        applied
                            .notices
                            .push(Notice::error(format!("Failed to clear API key: {message}")));
                    }
                }
            }
            Effect::PersistForm(form) => {
                let result = match state.config.lock() {
                    Ok(mut config) => config.save_form(&form).map_err(|err| err.to_string()),
                    Err(_) => Err("config lock error".to_string()),
                };
                if let Err(message) = result {
                    tracing::warn!(error = %message, "failed to persist form");
                    applied
                        .notices
                        .push(Notice::error(format!("Save error: {message}")));
                }
            }
            Effect::Notify(notice) => {
                if notice.level == NoticeLevel::Error {
                    tracing::debug!(message = %notice.message, "error notice");
                }
                applied.notices.push(notice);
            }
        }
    }

    applied
}

fn respond(state: &AppState, notices: Vec<Notice>) -> ApiResponse {
    let Ok(controller) = state.controller.lock() else {
        return err_json(StatusCode::INTERNAL_SERVER_ERROR, "controller lock error");
    };
    let snapshot = build_ui_snapshot(&controller, Instant::now());
    ok_json(snapshot_value(&snapshot, &notices))
}

fn build_ui_snapshot(controller: &GenerationController, now: Instant) -> UiSnapshot {
    let state = controller.state();
    UiSnapshot {
        phase: state.phase,
        loading: state.phase == Phase::Submitting,
        form: state.form.clone(),
        result: state.result.clone(),
        status: state.status_log.text(),
        elapsed_ms: state.elapsed(now).map(duration_ms),
        last_elapsed_ms: state.last_elapsed.map(duration_ms),
        has_api_key: !state.api_key.trim().is_empty(),
    }
}

fn snapshot_value(snapshot: &UiSnapshot, notices: &[Notice]) -> Value {
    let mut payload = serde_json::to_value(snapshot).unwrap_or_else(|_| json!({}));
    payload["notices"] = json!(notices);
    payload
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn ok_json(payload: Value) -> ApiResponse {
    let mut body = serde_json::Map::new();
    body.insert("ok".to_string(), Value::Bool(true));

    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            body.insert(key.clone(), value.clone());
        }
    } else if !payload.is_null() {
        body.insert("data".to_string(), payload);
    }

    (StatusCode::OK, Json(Value::Object(body)))
}

fn err_json(status: StatusCode, message: &str) -> ApiResponse {
    (
        status,
        Json(json!({
            "ok": false,
            "error": message,
        })),
    )
}

fn bind_listener(preferred_port: u16) -> Result<TcpListener> {
    for offset in 0..200u16 {
        let port = preferred_port.saturating_add(offset);
        if port == 0 {
            continue;
        }

        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok(listener);
        }
    }

    Err(anyhow!("failed to bind server port"))
}
