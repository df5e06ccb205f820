//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;

use crate::state::AppState;

use super::handlers::{health_check, version_check};
use super::streams::{
    delete_stream, get_stream, launch_stream, list_streams, probe_source, start_stream,
    stop_stream,
};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Stream management
        .route("/streams", get(list_streams).post(launch_stream))
        .route("/streams/{name}", get(get_stream).delete(delete_stream))
        .route("/streams/{name}/start", post(start_stream))
        .route("/streams/{name}/stop", post(stop_stream))
        .route("/probe", post(probe_source));

    if let Some(auth) = &state.config.auth {
        router = router.layer(ValidateRequestHeaderLayer::basic(
            &auth.username,
            &auth.password,
        ));
    }

    router = router.layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(Duration::from_secs(3600));
        router = router.layer(cors);
    }

    router.with_state(state)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, ServerConfig, TranscoderConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tower::util::ServiceExt;

    fn config(script: &str) -> ServerConfig {
        ServerConfig {
            target: "rtsp://localhost:8554".to_string(),
            transcoder: TranscoderConfig {
                command: vec!["sh".into(), "-c".into(), script.into()],
                probe_command: vec![
                    "sh".into(),
                    "-c".into(),
                    r#"echo '{"format":{"format_name":"matroska"},"streams":[]}'"#.into(),
                ],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn app(config: ServerConfig) -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::new(config, None, "ffmpeg version test"));
        (Arc::clone(&state), create_router(state))
    }

    fn request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app(config("sleep 30"));
        let response = app
            .oneshot(request(Method::GET, "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_version() {
        let (_, app) = app(config("sleep 30"));
        let response = app
            .oneshot(request(Method::GET, "/version", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ffmpeg"], "ffmpeg version test");
    }

    #[tokio::test]
    async fn test_stream_lifecycle() {
        let (_, app) = app(config("sleep 30"));
        let launch = serde_json::json!({"name": "news", "source": "/media/news.mkv", "audio": 1});

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/streams", Some(launch.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["name"], "news");
        assert_eq!(body["status"]["state"], "stopped");

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/streams", Some(launch)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/streams/news/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"]["state"], "running");
        assert!(body["started_at"].is_string());

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/streams/news/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/streams", None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["streams"][0]["name"], "news");

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/streams/news/stop", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"]["state"], "stopped");

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/streams/news", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(request(Method::GET, "/streams/news", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_launch() {
        let (state, app) = app(config("sleep 30"));
        let response = app
            .oneshot(request(
                Method::POST,
                "/streams",
                Some(serde_json::json!({"name": "bad name", "source": "/a.mkv"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_start_position() {
        let (state, app) = app(config("sleep 30"));
        let response = app
            .oneshot(request(
                Method::POST,
                "/streams",
                Some(serde_json::json!({"name": "news", "source": "/a.mkv", "startpos": 1e20})),
            ))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let (_, app) = app(config("sleep 30"));
        for (method, uri) in [
            (Method::GET, "/streams/nope"),
            (Method::DELETE, "/streams/nope"),
            (Method::POST, "/streams/nope/start"),
            (Method::POST, "/streams/nope/stop"),
        ] {
            let response = app.clone().oneshot(request(method, uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_probe() {
        let (_, app) = app(config("sleep 30"));
        let response = app
            .oneshot(request(
                Method::POST,
                "/probe",
                Some(serde_json::json!({"source": "/media/a.mkv"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["format"]["format_name"],
            "matroska"
        );
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let mut config = config("sleep 30");
        config.auth = Some(AuthConfig {
            username: "admin".to_string(),
            password: "secret".to_string(),
        });
        let (_, app) = app(config);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/streams", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // base64("admin:secret")
        let authorized = Request::builder()
            .uri("/streams")
            .header(header::AUTHORIZATION, "Basic YWRtaW46c2VjcmV0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(authorized).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_options() {
        let (_, app) = app(config("sleep 30"));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/streams")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
