use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use evidence_flow::{
    AnalysisTaskKey, Chat, ChatSession, Document, DocumentSource, EvidenceError, HttpBackend,
    MarkdownHandbook, Message, RenderedSource, TriggerOutcome, distinct_documents,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    config::ServiceConfig,
    models::{SendMessageRequest, SourceEntry, SourcesResponse},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn conflict_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn api_error(e: EvidenceError) -> ApiError {
    match &e {
        EvidenceError::ChatNotFound(id) => not_found_error("Chat not found", id),
        EvidenceError::MessageNotFound { message_id, .. } => {
            not_found_error("Message not found", message_id)
        }
        EvidenceError::DocumentNotFound(id) => not_found_error("Document not found", id),
        EvidenceError::ChatBusy(id) => conflict_error("A response is already in progress", id),
        EvidenceError::InvalidInput(message) => bad_request_error(message),
        _ => {
            error!("Request failed: {}", e);
            internal_error("Request failed", &e.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session: ChatSession,
}

/// Build the chat session from configuration and wrap it in a router.
pub async fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let backend = Arc::new(HttpBackend::new(
        config.handbook_api_url.clone(),
        config.request_timeout,
    )?);

    let document_source: Arc<dyn DocumentSource> = match &config.handbook_dir {
        Some(dir) => {
            info!("Loading handbook documents from {}", dir);
            Arc::new(MarkdownHandbook::new(dir))
        }
        None => {
            info!("Loading handbook documents from {}", config.handbook_api_url);
            backend.clone()
        }
    };

    let session = ChatSession::start(backend.clone(), backend, document_source.as_ref()).await;
    Ok(build_router(AppState { session }))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/documents", get(list_documents))
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/{chat_id}", get(get_chat).delete(delete_chat))
        .route("/chats/{chat_id}/activate", post(activate_chat))
        .route("/chats/{chat_id}/messages", post(send_message))
        .route(
            "/chats/{chat_id}/messages/{message_id}/sources",
            get(list_sources),
        )
        .route(
            "/chats/{chat_id}/messages/{message_id}/documents/{document_id}",
            get(get_source),
        )
        .route(
            "/chats/{chat_id}/messages/{message_id}/documents/{document_id}/highlights",
            post(request_highlights),
        )
        .route("/analyses", get(list_analyses))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "documents_loaded": state.session.documents().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    Json(state.session.documents().iter().cloned().collect())
}

async fn list_chats(State(state): State<AppState>) -> Json<Vec<Chat>> {
    Json(state.session.store().chats())
}

async fn create_chat(State(state): State<AppState>) -> (StatusCode, Json<Chat>) {
    let chat = state.session.store().create_chat();
    info!("Created chat {}", chat.id);
    (StatusCode::CREATED, Json(chat))
}

async fn get_chat(State(state): State<AppState>, Path(chat_id): Path<String>) -> ApiResult<Chat> {
    state
        .session
        .store()
        .chat(&chat_id)
        .map(Json)
        .ok_or_else(|| not_found_error("Chat not found", &chat_id))
}

async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .session
        .store()
        .delete_chat(&chat_id)
        .map_err(api_error)?;
    info!("Deleted chat {}", chat_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> ApiResult<Chat> {
    let store = state.session.store();
    store.set_active(&chat_id).map_err(api_error)?;
    store
        .chat(&chat_id)
        .map(Json)
        .ok_or_else(|| not_found_error("Chat not found", &chat_id))
}

async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Message> {
    info!("Message for chat {}: {}", chat_id, request.query);

    state
        .session
        .send(&chat_id, &request.query)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn list_sources(
    State(state): State<AppState>,
    Path((chat_id, message_id)): Path<(String, String)>,
) -> ApiResult<SourcesResponse> {
    let message = state
        .session
        .store()
        .message(&chat_id, &message_id)
        .map_err(api_error)?;

    let documents = state.session.documents();
    let coordinator = state.session.coordinator();
    let sources = distinct_documents(&message.citations)
        .into_iter()
        .map(|document_id| {
            let document = documents.get(&document_id);
            SourceEntry {
                title: document.map(|d| d.title.clone()),
                category: document.map(|d| d.category.clone()),
                analyzed: message.is_analyzed(&document_id),
                analyzing: coordinator.is_analyzing(&message_id, &document_id),
                document_id,
            }
        })
        .collect();

    Ok(Json(SourcesResponse {
        message_id,
        sources,
    }))
}

async fn get_source(
    State(state): State<AppState>,
    Path((chat_id, message_id, document_id)): Path<(String, String, String)>,
) -> ApiResult<RenderedSource> {
    state
        .session
        .render(&chat_id, &message_id, &document_id)
        .map(Json)
        .map_err(api_error)
}

async fn request_highlights(
    State(state): State<AppState>,
    Path((chat_id, message_id, document_id)): Path<(String, String, String)>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let outcome = state
        .session
        .request_highlights(&chat_id, &message_id, &document_id)
        .map_err(api_error)?;

    let key = json!({ "messageId": message_id, "documentId": document_id });
    match outcome {
        TriggerOutcome::Started(_) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "started", "analysis": key })),
        )),
        TriggerOutcome::AlreadyInFlight => Ok((
            StatusCode::OK,
            Json(json!({ "status": "already_in_flight", "analysis": key })),
        )),
        TriggerOutcome::UnknownDocument => Err(not_found_error("Document not found", &document_id)),
        TriggerOutcome::NoActiveChat => Err(not_found_error("Chat not found", &chat_id)),
    }
}

async fn list_analyses(State(state): State<AppState>) -> Json<Vec<AnalysisTaskKey>> {
    Json(state.session.coordinator().in_flight())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use evidence_flow::{
        ChatBackend, ChatReply, Citation, DocumentLibrary, HighlightFetcher, Result,
    };
    use tower::ServiceExt;

    struct CitingBackend;

    #[async_trait]
    impl ChatBackend for CitingBackend {
        async fn send_chat(&self, _query: &str, _history: &[Message]) -> Result<ChatReply> {
            Ok(ChatReply {
                content: "You get 25 days of annual leave.".to_string(),
                citations: vec![Citation::new("vacation", "25 days of annual leave")],
            })
        }
    }

    struct PerYearFetcher;

    #[async_trait]
    impl HighlightFetcher for PerYearFetcher {
        async fn fetch_highlights(&self, _answer: &str, _content: &str) -> Result<Vec<String>> {
            Ok(vec!["per year".to_string()])
        }
    }

    fn test_state() -> AppState {
        let documents = DocumentLibrary::new(vec![Document {
            id: "vacation".to_string(),
            title: "Vacation Policy".to_string(),
            category: "Benefits".to_string(),
            content: "Employees get 25 days of annual leave per year.".to_string(),
        }]);
        AppState {
            session: ChatSession::new(documents, Arc::new(CitingBackend), Arc::new(PerYearFetcher)),
        }
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_chat_and_highlight_round() {
        let state = test_state();
        let app = build_router(state.clone());

        let (status, chat) = call(&app, "POST", "/chats", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let chat_id = chat["id"].as_str().unwrap().to_string();

        let (status, message) = call(
            &app,
            "POST",
            &format!("/chats/{}/messages", chat_id),
            Some(json!({ "query": "How much leave?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message["sources"][0]["docId"], "vacation");
        let message_id = message["id"].as_str().unwrap().to_string();

        let (status, sources) = call(
            &app,
            "GET",
            &format!("/chats/{}/messages/{}/sources", chat_id, message_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sources["sources"][0]["title"], "Vacation Policy");
        assert_eq!(sources["sources"][0]["analyzed"], false);

        let source_uri = format!("/chats/{}/messages/{}/documents/vacation", chat_id, message_id);
        let (_, rendered) = call(&app, "GET", &source_uri, None).await;
        assert_eq!(rendered["spans"].as_array().unwrap().len(), 1);

        // Run the analysis to completion through the session, then render.
        let outcome = state
            .session
            .request_highlights(&chat_id, &message_id, "vacation")
            .unwrap();
        if let TriggerOutcome::Started(handle) = outcome {
            handle.await.unwrap();
        }

        let (_, rendered) = call(&app, "GET", &source_uri, None).await;
        assert_eq!(rendered["analyzed"], true);
        let matched: Vec<&str> = rendered["spans"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|span| span["isMatch"] == true)
            .filter_map(|span| span["text"].as_str())
            .collect();
        assert_eq!(matched, vec!["25 days of annual leave", "per year"]);
    }

    #[tokio::test]
    async fn test_highlight_request_endpoint() {
        let state = test_state();
        let app = build_router(state.clone());
        let chat = state.session.store().create_chat();
        let message = state.session.send(&chat.id, "Leave?").await.unwrap();

        let (status, body) = call(
            &app,
            "POST",
            &format!(
                "/chats/{}/messages/{}/documents/vacation/highlights",
                chat.id, message.id
            ),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "started");

        let (status, _) = call(
            &app,
            "POST",
            &format!(
                "/chats/{}/messages/{}/documents/missing/highlights",
                chat.id, message.id
            ),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let state = test_state();
        let app = build_router(state.clone());

        let (status, _) = call(&app, "GET", "/chats/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let chat = state.session.store().create_chat();
        let (status, _) = call(
            &app,
            "POST",
            &format!("/chats/{}/messages", chat.id),
            Some(json!({ "query": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        state
            .session
            .store()
            .begin_send(&chat.id, Message::user("pending"))
            .unwrap();
        let (status, _) = call(
            &app,
            "POST",
            &format!("/chats/{}/messages", chat.id),
            Some(json!({ "query": "again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, "DELETE", &format!("/chats/{}", chat.id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&app, "GET", "/analyses", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
