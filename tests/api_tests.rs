use cdn_cli::{serve, AppState, GatewayConfig};
use cdn_core::FileGateway;
use cdn_store::{FlexibleEdgeCache, FlexibleObjectStore, MemoryEdgeCache, MemoryObjectStore};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio::net::TcpListener;

const PNG: &[u8] = b"\x89PNG\r\n\x1A\n\x00\x00\x00\x0DIHDR\x00\x00\x00\x01\x00\x00\x00\x01";

struct TestServer {
    base_url: String,
    store: MemoryObjectStore,
    edge: MemoryEdgeCache,
    client: Client,
}

// Helper to spawn a server on a random port over memory backends
async fn spawn_server() -> TestServer {
    let config = GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        use_memory_store: true,
        ..Default::default()
    };

    let store = MemoryObjectStore::new();
    let edge = MemoryEdgeCache::new(store.clone());
    let gateway = FileGateway::new(
        FlexibleObjectStore::Memory(store.clone()),
        FlexibleEdgeCache::Memory(edge.clone()),
    );

    let state = Arc::new(AppState::from_gateway(config, gateway));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        serve(listener, state, std::future::pending()).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        store,
        edge,
        client: Client::new(),
    }
}

fn file_form(file_name: &str, data: &'static [u8]) -> Form {
    Form::new().part("file", Part::bytes(data).file_name(file_name.to_string()))
}

async fn message(res: reqwest::Response) -> String {
    let body: serde_json::Value = res.json().await.unwrap();
    body["message"].as_str().unwrap().to_string()
}

impl TestServer {
    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn upload(&self, file_name: &str, data: &'static [u8]) -> reqwest::Response {
        self.client
            .post(self.url(""))
            .multipart(file_form(file_name, data))
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let server = spawn_server().await;

    let res = server.client.head(server.url("")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upload_then_fetch() {
    let server = spawn_server().await;

    let res = server.upload("logo", PNG).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(message(res).await, "File uploaded successfully.");

    let stored = server.store.get("logo").unwrap();
    assert_eq!(stored.content_type, "image/png");
    assert_eq!(stored.data.as_ref(), PNG);

    let res = server.client.get(server.url("logo")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(res.headers()["content-disposition"], "inline");
    assert_eq!(res.headers()["content-length"], PNG.len().to_string().as_str());
    assert_eq!(res.bytes().await.unwrap().as_ref(), PNG);

    // A fresh key has nothing cached at the edge
    assert!(server.edge.invalidations().is_empty());
}

#[tokio::test]
async fn test_upload_text_is_sniffed() {
    let server = spawn_server().await;

    let res = server.upload("notes.txt", b"hello world\n").await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = server.client.get(server.url("notes.txt")).send().await.unwrap();
    assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(res.text().await.unwrap(), "hello world\n");
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let server = spawn_server().await;

    let form = Form::new().text("other", "value");
    let res = server
        .client
        .post(server.url(""))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(message(res).await, "File with key 'file' not found.");
    assert_eq!(server.store.put_count(), 0);
}

#[tokio::test]
async fn test_upload_not_multipart_is_json_error() {
    let server = spawn_server().await;

    let res = server
        .client
        .post(server.url(""))
        .body("plain body")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert!(message(res).await.starts_with("Invalid multipart request"));
    assert_eq!(server.store.put_count(), 0);
}

#[tokio::test]
async fn test_upload_without_filename_is_rejected() {
    let server = spawn_server().await;

    let form = Form::new().part("file", Part::bytes(&b"data"[..]));
    let res = server
        .client
        .post(server.url(""))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(server.store.is_empty());
}

#[tokio::test]
async fn test_update_missing_key() {
    let server = spawn_server().await;

    let res = server
        .client
        .put(server.url("missing.txt"))
        .multipart(file_form("missing.txt", b"new"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(message(res).await, "Given key does not exist in bucket.");
    assert_eq!(server.store.put_count(), 0);
    assert!(server.edge.invalidations().is_empty());
}

#[tokio::test]
async fn test_update_invalidates_edge() {
    let server = spawn_server().await;
    server.upload("page.txt", b"version one").await;

    // Warm the edge
    let res = server.client.get(server.url("page.txt")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "version one");

    let res = server
        .client
        .put(server.url("page.txt"))
        .multipart(file_form("ignored-name", b"version two"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let invalidations = server.edge.invalidations();
    assert_eq!(invalidations.len(), 1);
    assert_eq!(invalidations[0].path, "/page.txt");

    let res = server.client.get(server.url("page.txt")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "version two");
}

#[tokio::test]
async fn test_update_without_file_field() {
    let server = spawn_server().await;
    server.upload("page.txt", b"version one").await;

    let res = server
        .client
        .put(server.url("page.txt"))
        .multipart(Form::new().text("other", "value"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(message(res).await, "File with key 'file' not found.");
    assert_eq!(server.store.put_count(), 1);
}

#[tokio::test]
async fn test_delete_invalidates_edge() {
    let server = spawn_server().await;
    server.upload("doc.pdf", b"%PDF-1.4 body").await;

    let res = server.client.delete(server.url("doc.pdf")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(server.store.get("doc.pdf").is_none());

    let invalidations = server.edge.invalidations();
    assert_eq!(invalidations.len(), 1);
    assert_eq!(invalidations[0].path, "/doc.pdf");

    let res = server.client.get(server.url("doc.pdf")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message(res).await, "Failed to fetch file.");
}

#[tokio::test]
async fn test_delete_succeeds_when_invalidation_fails() {
    let server = spawn_server().await;
    server.upload("doc.pdf", b"%PDF-1.4 body").await;
    server.edge.set_fail_invalidations(true);

    let res = server.client.delete(server.url("doc.pdf")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(server.store.get("doc.pdf").is_none());
    assert_eq!(server.edge.invalidations().len(), 1);
}

#[tokio::test]
async fn test_delete_store_failure() {
    let server = spawn_server().await;
    server.store.set_fail_writes(true);

    let res = server.client.delete(server.url("doc.pdf")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message(res).await, "Failed to delete file.");
    assert!(server.edge.invalidations().is_empty());
}

#[tokio::test]
async fn test_upload_store_failure() {
    let server = spawn_server().await;
    server.store.set_fail_writes(true);

    let res = server.upload("logo", PNG).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message(res).await, "Failed to upload file.");
}

#[tokio::test]
async fn test_fetch_edge_failure() {
    let server = spawn_server().await;
    server.upload("logo", PNG).await;
    server.edge.set_fail_fetches(true);

    let res = server.client.get(server.url("logo")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(message(res).await, "Failed to fetch file.");
}
