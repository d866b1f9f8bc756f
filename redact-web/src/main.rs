//! Servidor web Axum para anonimização e pseudonimização de corpora
//!
//! | Rota            | Método | Corpo                                              |
//! |-----------------|--------|----------------------------------------------------|
//! | `/anonymize`    | POST   | `rawtext_list`, `individuals` (índice → tipo → lista) |
//! | `/pseudonymize` | POST   | `rawtext_list`, `individuals` (índice → id → tipo → lista) |
//! | `/ws`           | GET    | WebSocket: eventos de progresso e o resultado final |
//! | `/health`       | GET    | —                                                  |
//!
//! As demais opções (`masking_order`, `mask_misc`, `mask_numbers`, `epsilon`,
//! `suppression`, `batch_size`, `n_process`) vão no mesmo objeto JSON.
//! Configuração inválida responde 400 com `{"error": "..."}`.
//!
//! Variáveis de ambiente: `REDACT_ADDR` (padrão `0.0.0.0:5000`),
//! `REDACT_GAZETTEER` (arquivo JSON de gazetteers) e `RUST_LOG`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use redact_core::{
    DetectorRegistry, EntityRecognizer, GazetteerRecognizer, IndividualTable, MentionsByType, Mode,
    RedactError, RedactionConfig, RedactionEvent, RedactionOutput, Redactor,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:5000";

/// Estado compartilhado da aplicação
struct AppState {
    registry: DetectorRegistry,
    recognizer: Arc<dyn EntityRecognizer>,
}

/// Opções de redação aceitas em qualquer requisição
#[derive(Debug, Default, Deserialize)]
struct RedactOptions {
    #[serde(default)]
    masking_order: Option<Vec<String>>,
    #[serde(default)]
    mask_misc: bool,
    #[serde(default)]
    mask_numbers: bool,
    #[serde(default)]
    epsilon: Option<f64>,
    #[serde(default)]
    suppression: bool,
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    n_process: Option<usize>,
}

impl RedactOptions {
    fn into_config(self, mode: Mode, prior_individuals: BTreeMap<usize, IndividualTable>) -> RedactionConfig {
        let defaults = RedactionConfig::default();
        RedactionConfig {
            mode,
            masking_order: self.masking_order.unwrap_or(defaults.masking_order),
            mask_misc: self.mask_misc,
            mask_numbers: self.mask_numbers,
            epsilon: self.epsilon,
            suppression: self.suppression,
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            n_process: self.n_process,
            prior_individuals,
        }
    }
}

#[derive(Deserialize)]
struct AnonymizeRequest {
    rawtext_list: Vec<String>,
    /// Menções conhecidas por documento, sem noção de indivíduo
    #[serde(default)]
    individuals: BTreeMap<usize, MentionsByType>,
    #[serde(flatten)]
    options: RedactOptions,
}

#[derive(Deserialize)]
struct PseudonymizeRequest {
    rawtext_list: Vec<String>,
    #[serde(default)]
    individuals: BTreeMap<usize, IndividualTable>,
    #[serde(flatten)]
    options: RedactOptions,
}

/// Mensagem WebSocket recebida do cliente
#[derive(Deserialize)]
struct WsRequest {
    #[serde(default)]
    mode: Mode,
    rawtext_list: Vec<String>,
    #[serde(flatten)]
    options: RedactOptions,
}

#[derive(Serialize)]
struct AnonymizeResponse {
    output: Vec<String>,
}

#[derive(Serialize)]
struct PseudonymizeResponse {
    output: Vec<String>,
    individuals: BTreeMap<usize, IndividualTable>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let recognizer = load_recognizer()?;
    info!(reconhecedor = recognizer.name(), "reconhecedor de entidades carregado");
    let state = Arc::new(AppState {
        registry: DetectorRegistry::new(),
        recognizer,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    let addr = std::env::var("REDACT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Servidor de redação iniciado em http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/anonymize", post(anonymize_handler))
        .route("/pseudonymize", post(pseudonymize_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Gazetteers de `REDACT_GAZETTEER`, ou só as regras embutidas.
fn load_recognizer() -> Result<Arc<dyn EntityRecognizer>, Box<dyn std::error::Error>> {
    let recognizer = match std::env::var("REDACT_GAZETTEER") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)?;
            info!(arquivo = %path, "carregando gazetteers");
            GazetteerRecognizer::from_json_str(&json)?
        }
        Err(_) => {
            warn!("REDACT_GAZETTEER não definido: usando apenas regras embutidas");
            GazetteerRecognizer::new()
        }
    };
    Ok(Arc::new(recognizer.with_numbers(true)))
}

/// No modo anônimo cada documento tem um só "indivíduo" com todas as menções.
fn anonymization_priors(individuals: BTreeMap<usize, MentionsByType>) -> BTreeMap<usize, IndividualTable> {
    individuals
        .into_iter()
        .map(|(index, mentions)| (index, IndividualTable::from_mentions(mentions)))
        .collect()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn status_for(err: &RedactError) -> StatusCode {
    if err.is_configuration() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Valida a configuração e roda o motor (síncrono) fora do runtime async.
async fn run_redaction(
    state: Arc<AppState>,
    config: RedactionConfig,
    texts: Vec<String>,
) -> Result<RedactionOutput, Response> {
    let redactor = Redactor::new(config, state.registry.clone(), Arc::clone(&state.recognizer))
        .map_err(|e| error_response(status_for(&e), e.to_string()))?;

    match tokio::task::spawn_blocking(move || redactor.redact_corpus(&texts)).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => {
            error!(erro = %e, "falha na redação do corpus");
            Err(error_response(status_for(&e), e.to_string()))
        }
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn anonymize_handler(State(state): State<Arc<AppState>>, Json(req): Json<AnonymizeRequest>) -> Response {
    let priors = anonymization_priors(req.individuals);
    let config = req.options.into_config(Mode::Anonymize, priors);
    match run_redaction(state, config, req.rawtext_list).await {
        Ok(output) => Json(AnonymizeResponse { output: output.texts }).into_response(),
        Err(response) => response,
    }
}

async fn pseudonymize_handler(State(state): State<Arc<AppState>>, Json(req): Json<PseudonymizeRequest>) -> Response {
    let config = req.options.into_config(Mode::Pseudonymize, req.individuals);
    match run_redaction(state, config, req.rawtext_list).await {
        Ok(output) => Json(PseudonymizeResponse {
            output: output.texts,
            individuals: output.individuals,
        })
        .into_response(),
        Err(response) => response,
    }
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Recebe um corpus, roda o motor e devolve os eventos seguidos do resultado
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let replies = match serde_json::from_str::<WsRequest>(&text) {
                    Ok(req) => redact_with_events(&state, req).await,
                    Err(e) => vec![serde_json::json!({ "type": "Error", "data": { "message": e.to_string() } })],
                };
                for reply in replies {
                    if socket.send(Message::Text(reply.to_string())).await.is_err() {
                        return; // cliente desconectou
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

async fn redact_with_events(state: &Arc<AppState>, req: WsRequest) -> Vec<serde_json::Value> {
    let config = req.options.into_config(req.mode, BTreeMap::new());
    let redactor = match Redactor::new(config, state.registry.clone(), Arc::clone(&state.recognizer)) {
        Ok(redactor) => redactor,
        Err(e) => return vec![serde_json::json!({ "type": "Error", "data": { "message": e.to_string() } })],
    };

    let (tx, rx) = std::sync::mpsc::channel::<RedactionEvent>();
    let texts = req.rawtext_list;
    let result = tokio::task::spawn_blocking(move || redactor.redact_corpus_streaming(&texts, tx)).await;

    let mut replies: Vec<serde_json::Value> = rx
        .try_iter()
        .filter_map(|event| serde_json::to_value(event).ok())
        .collect();
    let last = match result {
        Ok(Ok(output)) => serde_json::json!({ "type": "Output", "data": output }),
        Ok(Err(e)) => serde_json::json!({ "type": "Error", "data": { "message": e.to_string() } }),
        Err(e) => serde_json::json!({ "type": "Error", "data": { "message": e.to_string() } }),
    };
    replies.push(last);
    replies
}
