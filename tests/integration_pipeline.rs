#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end ingest/ask tests against a mocked Ollama server.

use docs_rag::config::Config;
use docs_rag::index::FlatIndex;
use docs_rag::ingest;
use docs_rag::ollama::OllamaClient;
use docs_rag::query;
use docs_rag::store::DocumentRecord;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Deterministic stand-in embedding: identical text always maps to the
/// identical vector, and distance to self is zero.
fn mock_embedding(text: &str) -> Vec<f32> {
    let bytes = text.as_bytes();
    let sum: u32 = bytes.iter().map(|b| u32::from(*b)).sum();
    vec![
        text.len() as f32,
        (sum % 251) as f32,
        f32::from(bytes.first().copied().unwrap_or(0)),
        f32::from(bytes.last().copied().unwrap_or(0)),
    ]
}

struct EmbeddingResponder;

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("embedding request must be JSON");
        let prompt = body["prompt"].as_str().expect("prompt field must exist");
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({ "embedding": mock_embedding(prompt) }))
    }
}

async fn start_mock_ollama() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(EmbeddingResponder)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": { "role": "assistant", "content": "mock answer" }
        })))
        .mount(&server)
        .await;

    server
}

fn config_for(server: &MockServer, data_dir: &Path) -> Config {
    let uri = url::Url::parse(&server.uri()).expect("mock server URI must parse");

    let mut config = Config {
        base_dir: data_dir.to_path_buf(),
        ..Config::default()
    };
    config.ollama.host = uri.host_str().expect("mock URI has a host").to_string();
    config.ollama.port = uri.port().expect("mock URI has a port");
    config
}

fn client_for(config: &Config) -> OllamaClient {
    OllamaClient::new(config)
        .expect("Failed to create client")
        .with_retry_attempts(1)
}

fn write_sample_tree(root: &Path) {
    std::fs::write(root.join("a.md"), "entity alpha ".repeat(38) + "end").expect("write a.md");
    std::fs::write(root.join("b.json"), r#"{"b":1}"#).expect("write b.json");
    std::fs::write(root.join("c.txt"), "x".repeat(500)).expect("write c.txt");
    std::fs::write(root.join("empty.md"), "").expect("write empty.md");
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_builds_parallel_index_and_metadata() {
    let server = start_mock_ollama().await;
    let tree = TempDir::new().expect("Failed to create tree dir");
    let data = TempDir::new().expect("Failed to create data dir");
    write_sample_tree(tree.path());

    let config = config_for(&server, data.path());
    let client = client_for(&config);

    let stats = ingest::run(&config, &client, tree.path()).expect("Ingest failed");
    assert_eq!(stats.embedded, 2);

    let json = std::fs::read_to_string(config.metadata_path()).expect("metadata must exist");
    let records: Vec<DocumentRecord> = serde_json::from_str(&json).expect("metadata must parse");
    assert_eq!(records.len(), 2);
    assert!(records[0].path.ends_with("a.md"));
    assert!(records[1].path.ends_with("b.json"));
    assert_eq!(records[1].bytes, 7);

    let index = FlatIndex::load(config.index_path()).expect("index must load");
    assert_eq!(index.len(), records.len());
    assert_eq!(index.dimension(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_twice_produces_identical_files() {
    let server = start_mock_ollama().await;
    let tree = TempDir::new().expect("Failed to create tree dir");
    let data = TempDir::new().expect("Failed to create data dir");
    write_sample_tree(tree.path());

    let config = config_for(&server, data.path());
    let client = client_for(&config);

    ingest::run(&config, &client, tree.path()).expect("First ingest failed");
    let first_meta = std::fs::read(config.metadata_path()).expect("metadata must exist");
    let first_index = std::fs::read(config.index_path()).expect("index must exist");

    ingest::run(&config, &client, tree.path()).expect("Second ingest failed");
    assert_eq!(
        std::fs::read(config.metadata_path()).expect("metadata must exist"),
        first_meta
    );
    assert_eq!(
        std::fs::read(config.index_path()).expect("index must exist"),
        first_index
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_empty_tree_writes_nothing() {
    let server = start_mock_ollama().await;
    let tree = TempDir::new().expect("Failed to create tree dir");
    let data = TempDir::new().expect("Failed to create data dir");
    std::fs::write(tree.path().join("c.txt"), "wrong extension").expect("write c.txt");

    let config = config_for(&server, data.path());
    let client = client_for(&config);

    let stats = ingest::run(&config, &client, tree.path()).expect("Ingest failed");
    assert_eq!(stats.embedded, 0);
    assert!(!config.index_path().exists());
    assert!(!config.metadata_path().exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_survives_total_embedding_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tree = TempDir::new().expect("Failed to create tree dir");
    let data = TempDir::new().expect("Failed to create data dir");
    write_sample_tree(tree.path());

    let config = config_for(&server, data.path());
    let client = client_for(&config);

    let stats = ingest::run(&config, &client, tree.path()).expect("Ingest should not abort");
    assert_eq!(stats.embedded, 0);
    assert_eq!(stats.skipped, 2);
    assert!(!config.index_path().exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_round_trip_ranks_matching_document_first() {
    let server = start_mock_ollama().await;
    let tree = TempDir::new().expect("Failed to create tree dir");
    let data = TempDir::new().expect("Failed to create data dir");
    write_sample_tree(tree.path());

    let config = config_for(&server, data.path());
    let client = client_for(&config);

    ingest::run(&config, &client, tree.path()).expect("Ingest failed");

    // A question identical to an ingested prefix embeds to the identical
    // vector, so that document must come back as the nearest hit.
    let question =
        ingest::read_prefix(&tree.path().join("a.md"), 800).expect("Failed to read a.md");
    let result = query::run(&config, &client, &question).expect("Query failed");

    assert_eq!(result.answer, "mock answer");
    assert_eq!(result.context_paths.len(), 2);
    assert!(result.context_paths[0].ends_with("a.md"));
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_clamps_retrieval_to_corpus_size() {
    let server = start_mock_ollama().await;
    let tree = TempDir::new().expect("Failed to create tree dir");
    let data = TempDir::new().expect("Failed to create data dir");
    std::fs::write(tree.path().join("only.md"), "the only document").expect("write only.md");

    let config = config_for(&server, data.path());
    let client = client_for(&config);

    ingest::run(&config, &client, tree.path()).expect("Ingest failed");
    let result = query::run(&config, &client, "anything").expect("Query failed");

    assert_eq!(result.context_paths.len(), 1);
    assert!(result.context_paths[0].ends_with("only.md"));
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_without_index_reports_missing_ingest() {
    let server = start_mock_ollama().await;
    let data = TempDir::new().expect("Failed to create data dir");

    let config = config_for(&server, data.path());
    let client = client_for(&config);

    let err = query::run(&config, &client, "anything").expect_err("Query should fail");
    assert!(format!("{err:#}").contains("ingest"));
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_fails_when_question_embedding_fails() {
    let server = start_mock_ollama().await;
    let tree = TempDir::new().expect("Failed to create tree dir");
    let data = TempDir::new().expect("Failed to create data dir");
    std::fs::write(tree.path().join("only.md"), "a document").expect("write only.md");

    let config = config_for(&server, data.path());
    let client = client_for(&config);
    ingest::run(&config, &client, tree.path()).expect("Ingest failed");

    // Replace the embedding endpoint with a hard failure; the question's
    // own embedding has no fallback.
    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(query::run(&config, &client, "anything").is_err());
}
