use std::sync::Arc;

use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::post;
use axum::{extract::State, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cartbot_core::domain::order::SessionId;
use cartbot_dialog::{IntentDispatcher, NluClient, WebhookRequest, WebhookResponse};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<IntentDispatcher>,
    pub nlu: Option<Arc<dyn NluClient>>,
    pub default_language: String,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/webhook", post(webhook))
        .route("/api/query", post(text_query))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> =
        origins.iter().filter_map(|origin| origin.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Fulfillment webhook: the NLU already classified the utterance, so the
/// parsed result goes straight to the dispatcher.
async fn webhook(
    State(state): State<AppState>,
    Json(request): Json<WebhookRequest>,
) -> Json<WebhookResponse> {
    let session_id = request.session_id();
    let fulfillment_text = state.dispatcher.dispatch(&session_id, &request.query_result).await;
    Json(WebhookResponse { fulfillment_text })
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextQueryRequest {
    pub session_id: String,
    pub text: String,
    #[serde(default)]
    pub language_code: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextQueryResponse {
    pub fulfillment_text: String,
    pub intent: String,
}

/// Text-query path: free text goes to the NLU first, the recognized result
/// is then dispatched like a webhook turn. NLU failures surface as errors
/// here; without an intent there is nothing to run.
async fn text_query(
    State(state): State<AppState>,
    Json(request): Json<TextQueryRequest>,
) -> Result<Json<TextQueryResponse>, (StatusCode, String)> {
    let Some(nlu) = &state.nlu else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "text queries are disabled: no NLU endpoint is configured".to_string(),
        ));
    };

    let session_id = SessionId(request.session_id.clone());
    let language =
        request.language_code.clone().unwrap_or_else(|| state.default_language.clone());

    let result =
        nlu.detect_intent(&session_id, &request.text, &language).await.map_err(|error| {
            tracing::error!(
                event_name = "server.query.nlu_failed",
                session_id = %session_id.0,
                error = %error,
                "intent detection failed"
            );
            (StatusCode::BAD_GATEWAY, format!("intent detection failed: {error}"))
        })?;

    let fulfillment_text = state.dispatcher.dispatch(&session_id, &result).await;
    Ok(Json(TextQueryResponse { fulfillment_text, intent: result.intent.display_name }))
}
