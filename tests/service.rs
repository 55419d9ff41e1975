use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;

use mini_rag::config::Config;
use mini_rag::error::RagError;
use mini_rag::llm::{Generator, LlmClient, NO_CONTEXT_ANSWER};
use mini_rag::models::QueryRequest;
use mini_rag::rag::RagService;

const FOX: &str = "The quick brown fox jumps over the lazy dog. The fox runs fast.";

fn config(tmp: &TempDir) -> Config {
    let mut config = Config::with_data_dir(tmp.path());
    config.chunking.chunk_size = 50;
    config.chunking.chunk_overlap = 10;
    config
}

fn mock_service(tmp: &TempDir) -> RagService {
    RagService::new(config(tmp), Generator::mock()).unwrap()
}

fn uploads(tmp: &TempDir) -> usize {
    std::fs::read_dir(tmp.path().join("uploads")).unwrap().count()
}

#[tokio::test]
async fn fox_document_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let svc = mock_service(&tmp);

    let doc = svc.upload_document(FOX.as_bytes(), "fox.txt").await.unwrap();

    let listed = svc.list_documents().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, doc.id);
    assert_eq!(listed[0].metadata["chunks_count"], 2);
    assert_eq!(listed[0].content_preview, FOX);

    let resp = svc.query(QueryRequest::new("fox")).await.unwrap();
    assert_eq!(resp.sources.len(), 1);
    let source = &resp.sources[0];
    assert_eq!(source.document_id, doc.id);
    assert_eq!(source.source, "fox.txt");
    assert!(source.score >= 3);
    assert!(source.content_preview.contains("The quick brown fox jumps"));
    assert!(source.content_preview.contains("The fox runs fast."));
    assert!(resp.response_time >= 0.0);
}

#[tokio::test]
async fn query_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let svc = mock_service(&tmp);
    svc.upload_document(FOX.as_bytes(), "fox.txt").await.unwrap();
    svc.upload_document(b"A dog sleeps. The fox watches.", "dog.md")
        .await
        .unwrap();
    svc.upload_document(b"Nothing about animals.", "other.txt")
        .await
        .unwrap();

    let a = svc.query(QueryRequest::new("fox dog")).await.unwrap();
    let b = svc.query(QueryRequest::new("fox dog")).await.unwrap();
    let key = |r: &mini_rag::models::QueryResponse| {
        r.sources
            .iter()
            .map(|s| (s.document_id.clone(), s.score, s.content_preview.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&a), key(&b));
    assert_eq!(a.sources.len(), 2);
}

#[tokio::test]
async fn max_results_limits_sources() {
    let tmp = TempDir::new().unwrap();
    let svc = mock_service(&tmp);
    for name in ["a.txt", "b.txt", "c.txt"] {
        svc.upload_document(b"the fox is here", name).await.unwrap();
    }
    let mut req = QueryRequest::new("fox");
    req.max_results = Some(2);
    let resp = svc.query(req).await.unwrap();
    assert_eq!(resp.sources.len(), 2);
}

#[tokio::test]
async fn equal_scores_rank_in_upload_order() {
    let tmp = TempDir::new().unwrap();
    let mut ids = Vec::new();
    {
        let svc = mock_service(&tmp);
        for name in ["c.txt", "a.txt", "d.txt", "b.txt"] {
            let doc = svc.upload_document(b"the fox is here", name).await.unwrap();
            ids.push(doc.id);
        }
    }

    // Reopening reads the order back from the index file.
    let svc = mock_service(&tmp);
    let mut req = QueryRequest::new("fox");
    req.max_results = Some(3);
    let resp = svc.query(req).await.unwrap();
    let ranked: Vec<String> = resp.sources.iter().map(|s| s.document_id.clone()).collect();
    assert_eq!(ranked, ids[..3].to_vec());

    let listed: Vec<String> = svc
        .list_documents()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(listed, ids);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_are_all_indexed() {
    let tmp = TempDir::new().unwrap();
    let svc = Arc::new(mock_service(&tmp));

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                let body = format!("Document number {} mentions the fox.", i);
                let name = format!("doc-{}.txt", i);
                svc.upload_document(body.as_bytes(), &name)
                    .await
                    .map(|doc| doc.id)
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    drop(svc);

    let reopened = mock_service(&tmp);
    let mut listed: Vec<String> = reopened
        .list_documents()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(listed.len(), 40);
    listed.sort();
    ids.sort();
    assert_eq!(listed, ids);
    assert_eq!(uploads(&tmp), 40);
    assert_eq!(reopened.system_stats().await.unwrap().total_chunks, 40);
}

#[tokio::test]
async fn no_match_answers_without_llm() {
    let tmp = TempDir::new().unwrap();
    let svc = mock_service(&tmp);
    svc.upload_document(FOX.as_bytes(), "fox.txt").await.unwrap();

    let resp = svc.query(QueryRequest::new("kubernetes")).await.unwrap();
    assert!(resp.sources.is_empty());
    assert_eq!(resp.answer, NO_CONTEXT_ANSWER);
}

#[tokio::test]
async fn delete_removes_document() {
    let tmp = TempDir::new().unwrap();
    let svc = mock_service(&tmp);
    let doc = svc.upload_document(FOX.as_bytes(), "fox.txt").await.unwrap();
    let artifact = tmp.path().join("markdown").join(format!("{}.md", doc.id));
    assert!(artifact.exists());

    assert!(!svc.delete_document("does-not-exist").await.unwrap());
    assert!(svc.delete_document(&doc.id).await.unwrap());
    assert!(!artifact.exists());
    assert!(svc.list_documents().await.unwrap().is_empty());
    assert!(svc
        .query(QueryRequest::new("fox"))
        .await
        .unwrap()
        .sources
        .is_empty());
    assert_eq!(svc.system_stats().await.unwrap().total_documents, 0);
}

#[tokio::test]
async fn documents_survive_restart() {
    let tmp = TempDir::new().unwrap();
    let id = {
        let svc = mock_service(&tmp);
        svc.upload_document(FOX.as_bytes(), "fox.txt")
            .await
            .unwrap()
            .id
    };
    let svc = mock_service(&tmp);
    let listed = svc.list_documents().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
}

#[tokio::test]
async fn validation_errors_leave_no_files() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config(&tmp);
    cfg.upload.max_file_size = 10;
    let svc = RagService::new(cfg, Generator::mock()).unwrap();

    let err = svc
        .upload_document(b"small", "script.sh")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));

    let err = svc
        .upload_document(b"this is more than ten bytes", "big.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert!(err.to_string().contains("exceeds maximum allowed size"));

    assert_eq!(uploads(&tmp), 0);
    assert!(svc.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn extraction_failure_cleans_up_raw_file() {
    let tmp = TempDir::new().unwrap();
    let svc = mock_service(&tmp);

    let err = svc
        .upload_document(b"definitely not a pdf", "broken.pdf")
        .await
        .unwrap_err();
    match err {
        RagError::Extraction { filename, .. } => assert_eq!(filename, "broken.pdf"),
        other => panic!("expected extraction error, got {:?}", other),
    }
    assert_eq!(uploads(&tmp), 0);

    let err = svc
        .upload_document(&[0xff, 0xfe, 0xfd], "latin1.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Extraction { .. }));
    assert_eq!(uploads(&tmp), 0);
    assert_eq!(svc.system_stats().await.unwrap().total_documents, 0);
}

struct DownClient;

#[async_trait]
impl LlmClient for DownClient {
    fn model_name(&self) -> &str {
        "down"
    }

    async fn chat(&self, _system: &str, _user: &str, _max_tokens: u32) -> anyhow::Result<String> {
        anyhow::bail!("service unavailable")
    }
}

#[tokio::test]
async fn llm_failure_becomes_answer_text() {
    let tmp = TempDir::new().unwrap();
    let generator = Generator::with_client(Some(Arc::new(DownClient)), 2, 256);
    let svc = RagService::new(config(&tmp), generator).unwrap();

    let doc = svc.upload_document(FOX.as_bytes(), "fox.txt").await.unwrap();
    assert_eq!(
        doc.metadata["summary"],
        format!(
            "Summary unavailable. Document length: {} characters.",
            FOX.chars().count()
        )
    );

    let resp = svc.query(QueryRequest::new("fox")).await.unwrap();
    assert_eq!(resp.sources.len(), 1);
    assert_eq!(
        resp.answer,
        "Sorry, an error occurred while generating the response: service unavailable"
    );
}
