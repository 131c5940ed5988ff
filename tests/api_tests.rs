use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use wdb_api::{
    db::{create_memory_pool, run_migrations, FileArtifactStore, SqliteTrackStore},
    models::FeatureColumn,
    routes::{create_router, AppState},
    services::RecommendationService,
};

struct TestApp {
    router: Router,
    // Keeps the artifact directory alive for the duration of the test
    artifact_dir: TempDir,
}

async fn create_test_app(columns: Vec<FeatureColumn>) -> TestApp {
    let pool = create_memory_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();
    let tracks = Arc::new(SqliteTrackStore::new(pool));

    let artifact_dir = tempfile::tempdir().unwrap();
    let artifacts = Arc::new(FileArtifactStore::new(artifact_dir.path()));

    let recommendations = Arc::new(RecommendationService::new(
        tracks.clone(),
        artifacts,
        columns,
        true,
    ));

    let state = Arc::new(AppState {
        tracks,
        recommendations,
        max_k: 100,
    });

    TestApp {
        router: create_router(state),
        artifact_dir,
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, headers, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::GET, uri, None).await;
        (status, body)
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::POST, uri, Some(body)).await;
        (status, body)
    }

    async fn create_track(&self, name: &str, tempo: f64, decade: &str) -> i64 {
        let (status, body) = self.post("/api/v1/tracks", track_json(name, tempo, decade)).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }
}

fn track_json(name: &str, tempo: f64, decade: &str) -> Value {
    json!({
        "track": name,
        "artist": "Test Artist",
        "danceability": 0.5,
        "key": 2,
        "instrumentalness": 0.1,
        "tempo": tempo,
        "duration_ms": 200000,
        "popularity": 40,
        "decade": decade
    })
}

fn recommended_ids(body: &Value) -> Vec<i64> {
    body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["track_id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_generated_and_echoed() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;

    let (_, headers, _) = app.send(Method::GET, "/health", None).await;
    let generated = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let supplied = uuid::Uuid::new_v4().to_string();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", &supplied)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), supplied.as_str());
}

#[tokio::test]
async fn test_track_crud() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;

    let id = app.create_track("Moon River", 95.0, "60s").await;

    let (status, body) = app.get(&format!("/api/v1/tracks/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["track"], "Moon River");
    assert_eq!(body["decade"], "60s");

    let (status, _, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/tracks/{}", id),
            Some(track_json("Moon River (Live)", 101.0, "60s")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["track"], "Moon River (Live)");
    assert_eq!(body["tempo"], 101.0);

    let (status, _, _) = app
        .send(Method::DELETE, &format!("/api/v1/tracks/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/v1/tracks/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_missing_track_operations_return_not_found() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;

    let (status, _, _) = app
        .send(Method::PUT, "/api/v1/tracks/42", Some(track_json("X", 90.0, "70s")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app.send(Method::DELETE, "/api/v1/tracks/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_accepts_float_encoded_integers() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;

    let (status, body) = app
        .post(
            "/api/v1/tracks",
            json!({
                "track": "Jealous Kind Of Fella",
                "artist": "Garland Green",
                "danceability": 0.417,
                "key": 3,
                "instrumentalness": 0.0,
                "tempo": 185.655,
                "duration_ms": 173533.0,
                "popularity": 1.0,
                "decade": "60s"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["duration_ms"], 173533);
    assert_eq!(body["popularity"], 1);
}

#[tokio::test]
async fn test_create_rejects_extreme_values() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    let (status, _) = app.post("/api/v1/tracks", track_json("Loud", 1e308, "70s")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_empty_title() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    let (status, _) = app.post("/api/v1/tracks", track_json("  ", 90.0, "70s")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_tracks_filter_sort_and_paging() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    for i in 0..12 {
        app.create_track(&format!("Song {:02}", i), 80.0 + i as f64, "80s").await;
    }
    app.create_track("Other", 200.0, "90s").await;

    let (status, body) = app.get("/api/v1/tracks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 10);
    assert_eq!(body["total"], 13);
    assert_eq!(body["has_next"], true);

    let (_, body) = app.get("/api/v1/tracks?page=2").await;
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["has_prev"], true);

    let (_, body) = app
        .get("/api/v1/tracks?filter_field=decade&filter_value=90s")
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["track"], "Other");

    let (_, body) = app
        .get("/api/v1/tracks?sort_field=tempo&sort_order=desc")
        .await;
    assert_eq!(body["items"][0]["track"], "Other");
    assert_eq!(body["items"][1]["track"], "Song 11");

    let (status, _) = app.get("/api/v1/tracks?sort_field=loudness").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_rank_nearest_tracks() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    let first = app.create_track("A", 100.0, "60s").await;
    let second = app.create_track("B", 100.0, "70s").await;
    let third = app.create_track("C", 200.0, "80s").await;

    let (status, body) = app
        .get(&format!("/api/v1/tracks/{}/recommendations?k=2", first))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["track_id"], first);
    assert_eq!(body["k"], 2);
    assert_eq!(recommended_ids(&body), vec![second, third]);
    assert_eq!(body["recommendations"][0]["rank"], 1);
    assert!(body["recommendations"][0]["distance"].as_f64().unwrap().abs() < 1e-9);
}

#[tokio::test]
async fn test_recommendations_reject_bad_k_and_unknown_track() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    let id = app.create_track("A", 100.0, "60s").await;
    app.create_track("B", 120.0, "60s").await;

    let (status, _) = app
        .get(&format!("/api/v1/tracks/{}/recommendations?k=0", id))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/api/v1/tracks/{}/recommendations?k=101", id))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/v1/tracks/999999/recommendations").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown track id: 999999");
}

#[tokio::test]
async fn test_recommendations_on_empty_store_are_unavailable() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;

    let (status, _) = app.get("/api/v1/tracks/1/recommendations").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app.get("/api/v1/recommendations/matrix").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_matrix_is_persisted_and_rebuilt_on_request() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    let first = app.create_track("A", 100.0, "60s").await;
    app.create_track("B", 110.0, "60s").await;

    let (status, body) = app.get("/api/v1/recommendations/matrix").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["row_count"], 2);
    assert_eq!(body["columns"], json!(["tempo"]));

    let artifact = app.artifact_dir.path().join("matrix-tempo.json");
    assert!(artifact.exists());

    // New tracks are not visible until the matrix is rebuilt
    let late = app.create_track("C", 105.0, "60s").await;
    let (status, _) = app
        .get(&format!("/api/v1/tracks/{}/recommendations", late))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post("/api/v1/recommendations/rebuild", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["row_count"], 3);

    let (status, body) = app
        .get(&format!("/api/v1/tracks/{}/recommendations?k=5", late))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recommended_ids(&body).len(), 2);
    assert!(recommended_ids(&body).contains(&first));
}

#[tokio::test]
async fn test_invalidate_removes_artifact() {
    let app = create_test_app(vec![FeatureColumn::Tempo]).await;
    app.create_track("A", 100.0, "60s").await;
    app.create_track("B", 110.0, "60s").await;

    let (status, _) = app.get("/api/v1/recommendations/matrix").await;
    assert_eq!(status, StatusCode::OK);
    let artifact = app.artifact_dir.path().join("matrix-tempo.json");
    assert!(artifact.exists());

    let (status, _, _) = app
        .send(Method::DELETE, "/api/v1/recommendations/matrix", None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!artifact.exists());

    let (status, body) = app.get("/api/v1/recommendations/matrix").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["row_count"], 2);
}

#[tokio::test]
async fn test_similar_to_unsaved_track() {
    let app = create_test_app(vec![FeatureColumn::Tempo, FeatureColumn::Decade]).await;
    let sixties = app.create_track("A", 100.0, "60s").await;
    app.create_track("B", 180.0, "90s").await;
    app.create_track("C", 140.0, "70s").await;

    let (status, body) = app
        .post(
            "/api/v1/recommendations/similar?k=1",
            track_json("Draft", 100.0, "60s"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["track_id"], Value::Null);
    assert_eq!(recommended_ids(&body), vec![sixties]);

    let (status, body) = app
        .post(
            "/api/v1/recommendations/similar",
            track_json("Draft", 100.0, "20s"),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("20s"));
}
