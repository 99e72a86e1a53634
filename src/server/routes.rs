//! HTTP routes
//!
//! Three surfaces: endpoint creation at the root, raw ingestion at
//! `/{reference}`, and the live event stream at `/events`. Handlers own no
//! state beyond [`AppState`]; everything they need is injected at router
//! construction.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::hub::BroadcastHub;
use crate::ingest::{CaptureIngestor, EndpointRegistry, IdentityResolver};
use crate::session::{BridgeMessage, SessionBridge};
use crate::store::Datastore;

use super::config::ServerConfig;
use super::ip;
use super::response::{ApiResponse, EndpointCreatedResponse, EndpointUrl, SseDetails};

/// Shared state for all handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub hub: Arc<BroadcastHub>,
    identity: IdentityResolver,
    registry: EndpointRegistry,
    ingestor: CaptureIngestor,
}

impl AppState {
    pub fn new(store: Arc<dyn Datastore>, hub: Arc<BroadcastHub>, config: ServerConfig) -> Self {
        Self {
            identity: IdentityResolver::new(Arc::clone(&store)),
            registry: EndpointRegistry::new(Arc::clone(&store)),
            ingestor: CaptureIngestor::new(
                store,
                Arc::clone(&hub),
                config.max_request_body_size,
            ),
            hub,
            config,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create_endpoint))
        .route("/events", get(stream_events))
        .route("/:reference", post(ingest_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateEndpointRequest {
    identity_token: String,

    #[serde(default)]
    force_new_endpoint: bool,
}

async fn create_endpoint(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateEndpointRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(payload) = payload
        .map_err(|_| Error::Validation("request body could not be decoded".into()))?;

    let user = state.identity.resolve(&payload.identity_token).await?;

    if user.banned {
        tracing::warn!(user_id = %user.id, "Banned identity rejected");
        return Ok((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::new("this identity has been banned")),
        )
            .into_response());
    }

    let endpoint = state
        .registry
        .get_or_create(user.id, payload.force_new_endpoint)
        .await?;

    let domain = state.config.domain.trim_end_matches('/');
    let body = EndpointCreatedResponse {
        message: "Endpoint created".to_string(),
        url: EndpointUrl {
            fqdn: domain.to_string(),
            reference: endpoint.reference.clone(),
            human_readable_endpoint: format!("{domain}/{}", endpoint.reference),
        },
        sse: SseDetails {
            channel: endpoint.pub_channel(),
        },
    };

    Ok(Json(body).into_response())
}

async fn ingest_request(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
    RawQuery(query): RawQuery,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse> {
    let source_ip = ip::source_ip(&headers, connect.map(|ConnectInfo(addr)| addr));

    let header_pairs: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    state
        .ingestor
        .ingest(
            &reference,
            body.into_data_stream(),
            header_pairs,
            query.unwrap_or_default(),
            source_ip,
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new("Request accepted")),
    ))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    channel: String,
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let reference = params
        .channel
        .strip_prefix("messages.")
        .unwrap_or(&params.channel)
        .to_string();

    if reference.is_empty() {
        return Err(Error::Validation("channel must not be empty".into()));
    }

    let bridge = SessionBridge::attach(&state.hub, &reference).await;

    let stream = bridge.map(|message| {
        let event = match message {
            BridgeMessage::Attached { .. } => {
                Event::default().event("ready").data("awaiting requests")
            }
            BridgeMessage::Request(ev) => Event::default()
                .id(ev.id.to_string())
                .event("message")
                .data(String::from_utf8_lossy(&ev.data).into_owned()),
            BridgeMessage::Lagged { missed } => {
                Event::default().event("lagged").data(missed.to_string())
            }
        };

        Ok::<_, Infallible>(event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::model::{Endpoint, User};
    use crate::store::MemoryStore;

    use super::*;

    fn app(max_body: u64) -> (Arc<MemoryStore>, Router) {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let config = ServerConfig::default()
            .domain("https://requests.example.dev")
            .max_request_body_size(max_body);

        let state = Arc::new(AppState::new(
            Arc::clone(&store) as Arc<dyn Datastore>,
            hub,
            config,
        ));

        (store, router(state))
    }

    fn create_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seed_endpoint(store: &MemoryStore) -> Endpoint {
        let user = User::new("SHA256:abc");
        store.create_user(&user).await.unwrap();
        let endpoint = Endpoint::new(user.id);
        store.create_endpoint(&endpoint).await.unwrap();
        endpoint
    }

    #[tokio::test]
    async fn test_create_endpoint_returns_channel_and_url() {
        let (_store, app) = app(2048);

        let response = app
            .oneshot(create_request(json!({"identity_token": "SHA256:abc"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let reference = body["url"]["reference"].as_str().unwrap();

        assert_eq!(
            body["sse"]["channel"].as_str().unwrap(),
            format!("messages.{reference}")
        );
        assert_eq!(
            body["url"]["human_readable_endpoint"].as_str().unwrap(),
            format!("https://requests.example.dev/{reference}")
        );
    }

    #[tokio::test]
    async fn test_create_reuses_endpoint_unless_forced() {
        let (_store, app) = app(2048);

        let first = json_body(
            app.clone()
                .oneshot(create_request(json!({"identity_token": "SHA256:abc"})))
                .await
                .unwrap(),
        )
        .await;

        let second = json_body(
            app.clone()
                .oneshot(create_request(json!({"identity_token": "SHA256:abc"})))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(first["url"]["reference"], second["url"]["reference"]);

        let forced = json_body(
            app.oneshot(create_request(json!({
                "identity_token": "SHA256:abc",
                "force_new_endpoint": true
            })))
            .await
            .unwrap(),
        )
        .await;

        assert_ne!(first["url"]["reference"], forced["url"]["reference"]);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_token() {
        let (_store, app) = app(2048);

        let response = app
            .oneshot(create_request(json!({"identity_token": "  "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_rejects_undecodable_body() {
        let (_store, app) = app(2048);

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_banned_identity_is_forbidden() {
        let (store, app) = app(2048);

        let mut user = User::new("SHA256:banned");
        user.banned = true;
        store.create_user(&user).await.unwrap();

        let response = app
            .oneshot(create_request(json!({"identity_token": "SHA256:banned"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_ingest_unknown_reference_is_404() {
        let (store, app) = app(2048);

        let request = Request::builder()
            .method("POST")
            .uri("/missing")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_ingest_persists_and_accepts() {
        let (store, app) = app(2048);
        let endpoint = seed_endpoint(&store).await;

        let request = Request::builder()
            .method("POST")
            .uri(format!("/{}?a=1", endpoint.reference))
            .header("x-forwarded-for", "198.51.100.7")
            .body(Body::from(r#"{"hello":"world"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(store.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_over_cap_is_rejected() {
        let (store, app) = app(8);
        let endpoint = seed_endpoint(&store).await;

        let request = Request::builder()
            .method("POST")
            .uri(format!("/{}", endpoint.reference))
            .body(Body::from("nine bytes"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_events_requires_channel() {
        let (_store, app) = app(2048);

        let request = Request::builder()
            .method("GET")
            .uri("/events?channel=messages.")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_events_stream_opens_with_ready() {
        let (store, app) = app(2048);
        let endpoint = seed_endpoint(&store).await;

        let request = Request::builder()
            .method("GET")
            .uri(format!("/events?channel={}", endpoint.pub_channel()))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_secs(1), body.next())
            .await
            .expect("stream produced nothing")
            .unwrap()
            .unwrap();

        let frame = String::from_utf8_lossy(&first);
        assert!(frame.contains("event: ready"), "got {frame}");
    }
}
