//! HTTP round-trip tests: a served router driven through a real client.

use serde_json::{json, Value};
use tempfile::TempDir;

use vecstore::{api, Config};

async fn spawn_server() -> (String, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let state = api::build_state(&config).unwrap();
    let router = api::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), dir)
}

#[tokio::test]
async fn full_crud_index_and_search_flow() {
    let (base, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    // Library
    let library: Value = client
        .post(format!("{base}/libraries"))
        .json(&json!({ "name": "docs", "metadata": { "team": "search" } }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    let lib_id = library["id"].as_str().unwrap().to_string();

    // Document
    let document: Value = client
        .post(format!("{base}/libraries/{lib_id}/documents"))
        .json(&json!({ "title": "guide" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let doc_id = document["id"].as_str().unwrap().to_string();

    // Chunks
    for (text, embedding, lang) in [
        ("rust book", vec![1.0, 0.0, 0.0], "en"),
        ("livre de rust", vec![0.9, 0.1, 0.0], "fr"),
        ("guide intro", vec![0.0, 1.0, 0.0], "en"),
    ] {
        let response = client
            .post(format!("{base}/libraries/{lib_id}/chunks"))
            .json(&json!({
                "document_id": doc_id,
                "text": text,
                "embedding": embedding,
                "metadata": { "lang": lang }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    // Index lifecycle
    let description: Value = client
        .put(format!("{base}/libraries/{lib_id}/index"))
        .json(&json!({ "algorithm": "linear", "metric": "cosine" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(description["built"], json!(true));
    assert_eq!(description["size"], json!(3));
    assert_eq!(description["dimension"], json!(3));

    // Filtered search
    let hits: Value = client
        .post(format!("{base}/libraries/{lib_id}/chunks/search"))
        .json(&json!({
            "vector": [1.0, 0.0, 0.0],
            "k": 2,
            "metadata_filters": { "lang": "en" }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["chunk"]["text"], json!("rust book"));
    assert!(hits[0]["score"].as_f64().unwrap() > 0.99);

    // Chunk listing scoped by document
    let chunks: Value = client
        .get(format!(
            "{base}/libraries/{lib_id}/chunks?document_id={doc_id}"
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chunks.as_array().unwrap().len(), 3);

    // Index teardown
    let response = client
        .delete(format!("{base}/libraries/{lib_id}/index"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn snapshot_admin_round_trip() {
    let (base, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    let library: Value = client
        .post(format!("{base}/libraries"))
        .json(&json!({ "name": "persisted" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let lib_id = library["id"].as_str().unwrap().to_string();

    let snapshot: Value = client
        .post(format!("{base}/admin/snapshots"))
        .json(&json!({ "name": "empty-baseline" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let snapshot_id = snapshot["id"].as_str().unwrap().to_string();

    // Mutate, then restore the baseline.
    let response = client
        .delete(format!("{base}/libraries/{lib_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = client
        .post(format!("{base}/admin/snapshots/{snapshot_id}/restore"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let library: Value = client
        .get(format!("{base}/libraries/{lib_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(library["name"], json!("persisted"));

    let listing: Value = client
        .get(format!("{base}/admin/snapshots"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn errors_carry_stable_codes() {
    let (base, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    // Unknown library → 404 with machine code.
    let response = client
        .get(format!(
            "{base}/libraries/00000000-0000-0000-0000-000000000000"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], json!("not_found"));

    // Duplicate name → 409.
    let response = client
        .post(format!("{base}/libraries"))
        .json(&json!({ "name": "dupe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let response = client
        .post(format!("{base}/libraries"))
        .json(&json!({ "name": "dupe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Unsupported pairing → 400.
    let library: Value = client
        .post(format!("{base}/libraries"))
        .json(&json!({ "name": "pairing" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let lib_id = library["id"].as_str().unwrap();
    let response = client
        .put(format!("{base}/libraries/{lib_id}/index"))
        .json(&json!({ "algorithm": "kdtree", "metric": "cosine" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], json!("unsupported_metric"));

    // Embeddings without a credential → 503.
    let response = client
        .post(format!("{base}/embeddings"))
        .json(&json!({ "texts": ["hello"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], json!("embedding_unavailable"));
}
