//! The assist proxy: a stateless HTTP endpoint that forwards a prompt to
//! the chat-completion API using a server-held credential and relays the
//! response verbatim.
//!
//! POST `/api/assist` with `{prompt, tasks}`. Non-POST methods get 405 from
//! the method router; a missing credential or a failed forward gets a 500
//! JSON error envelope. Upstream API errors are not translated: whatever
//! JSON the API returned goes back to the caller.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::assist::{DEFAULT_MODEL, OPENAI_API_URL};

/// System prompt sent ahead of the user's request.
const SYSTEM_PROMPT: &str = "You are a helpful assistant that transforms user prompts \
into task checklists or short actionable subtasks.";

#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ProxyState {
    pub fn new(api_key: Option<String>) -> Self {
        ProxyState {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct AssistRequest {
    prompt: String,
    // The task list rides along for context; the proxy does not inspect it.
    #[serde(default)]
    #[allow(dead_code)]
    tasks: Value,
}

async fn handle_assist(
    State(state): State<ProxyState>,
    Json(req): Json<AssistRequest>,
) -> impl IntoResponse {
    let Some(api_key) = state.api_key.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "OPENAI_API_KEY not configured in environment"})),
        );
    };

    let body = json!({
        "model": DEFAULT_MODEL,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": req.prompt},
        ],
        "max_tokens": 400,
        "temperature": 0.7,
    });

    let forwarded = state
        .client
        .post(OPENAI_API_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await;

    match forwarded {
        Ok(response) => match response.json::<Value>().await {
            Ok(upstream) => (StatusCode::OK, Json(upstream)),
            Err(e) => {
                error!("failed to read completion response: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": e.to_string()})),
                )
            }
        },
        Err(e) => {
            error!("completion forward failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Build the proxy router.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/assist", post(handle_assist))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Bind and serve the proxy until the process is stopped.
pub async fn serve(port: u16, api_key: Option<String>) -> std::io::Result<()> {
    if api_key.is_none() {
        // Still serves; every assist request will get a 500 until set.
        error!("OPENAI_API_KEY is not set; assist requests will fail");
    }
    let app = router(ProxyState::new(api_key));
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("assist proxy listening on {addr}");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn assist_request(method: Method) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/api/assist")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"prompt":"plan my day","tasks":[]}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let app = router(ProxyState::new(Some("sk-test".into())));
        let response = app.oneshot(assist_request(Method::GET)).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_missing_credential_is_server_error() {
        let app = router(ProxyState::new(None));
        let response = app.oneshot(assist_request(Method::POST)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(ProxyState::new(None));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
