//! End-to-end pipeline tests against a mocked statute API and an
//! in-memory store.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use httpmock::prelude::*;

use hanlaw_ai::MockEmbedder;
use hanlaw_core::{Embedding, StatuteDetail, StatuteSummary};
use hanlaw_store::{ExistingStatute, StatuteStore, StoreError};
use hanlaw_sync::{
    ApiConfig, ExistencePolicy, IngestError, IngestOptions, Ingestor, SingleOutcome, SourceClient,
    UpdateStrategy,
};

#[derive(Debug, Clone)]
struct StoredStatute {
    id: i64,
    name: String,
    external_id: String,
    article_count: usize,
    embedding_dim: usize,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    rows: Mutex<Vec<StoredStatute>>,
    next_id: AtomicI64,
    fail_find: AtomicBool,
}

/// In-memory stand-in for the Postgres store. Cloning shares state so
/// tests can inspect what the ingestor wrote.
#[derive(Clone)]
struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    fn new() -> Self {
        let inner = Inner {
            next_id: AtomicI64::new(1),
            ..Inner::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    fn rows(&self) -> Vec<StoredStatute> {
        self.inner.rows.lock().unwrap().clone()
    }

    fn fail_finds(&self, fail: bool) {
        self.inner.fail_find.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatuteStore for MemoryStore {
    async fn find_statute(
        &self,
        name: &str,
        external_id: Option<&str>,
    ) -> Result<Option<ExistingStatute>, StoreError> {
        if self.inner.fail_find.load(Ordering::SeqCst) {
            return Err(StoreError::Other("simulated store outage".to_string()));
        }
        let rows = self.inner.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.name == name || external_id.is_some_and(|e| r.external_id == e))
            .map(|r| ExistingStatute {
                id: r.id,
                created_at: r.created_at,
            }))
    }

    async fn insert_statute(
        &self,
        summary: &StatuteSummary,
        detail: &StatuteDetail,
        embedding: &Embedding,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.rows.lock().unwrap().push(StoredStatute {
            id,
            name: summary.name.clone(),
            external_id: summary.external_id.clone(),
            article_count: detail.articles.len(),
            embedding_dim: embedding.vector.len(),
            created_at: created_at.unwrap_or_else(Utc::now),
        });
        Ok(id)
    }

    async fn delete_statute(&self, id: i64) -> Result<bool, StoreError> {
        let mut rows = self.inner.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }
}

fn law_element(external_id: &str, name: &str) -> String {
    format!(
        "<law><법령ID>{external_id}</법령ID><법령명한글>{name}</법령명한글>\
         <법령약칭명/><소관부처명>법무부</소관부처명><법령구분명>법률</법령구분명>\
         <공포번호>18098</공포번호><공포일자>20220315</공포일자>\
         <시행일자>20220401</시행일자><제개정구분명>일부개정</제개정구분명></law>"
    )
}

fn search_body(total: usize, page: u32, laws: &[String]) -> String {
    format!(
        "<LawSearch><totalCnt>{total}</totalCnt><page>{page}</page>{}</LawSearch>",
        laws.concat()
    )
}

fn detail_body(articles: usize) -> String {
    let mut body = String::from("<법령>");
    for n in 1..=articles {
        body.push_str(&format!(
            "<조문><조문번호>{n}</조문번호><조문제목>제목</조문제목>\
             <조문내용>제{n}조 내용.</조문내용></조문>"
        ));
    }
    body.push_str(
        "<연혁><연혁구분>일부개정</연혁구분><연혁일자>20220315</연혁일자>\
         <연혁번호>18098</연혁번호><연혁내용>일부개정</연혁내용></연혁></법령>",
    );
    body
}

fn client(server: &MockServer) -> SourceClient {
    SourceClient::new(ApiConfig {
        base_url: server.base_url(),
        oc: "tester".to_string(),
        ..ApiConfig::default()
    })
    .unwrap()
}

fn options(max: usize) -> IngestOptions {
    IngestOptions {
        max_statutes: max,
        request_interval: Duration::ZERO,
        ..IngestOptions::default()
    }
}

async fn mock_detail_any(server: &MockServer, articles: usize) {
    let body = detail_body(articles);
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawService.do");
            then.status(200).body(body);
        })
        .await;
}

#[tokio::test]
async fn cap_and_page_size_drive_exactly_two_listing_calls() {
    let server = MockServer::start_async().await;

    let page1: Vec<String> = (1..=20)
        .map(|i| law_element(&format!("{i:06}"), &format!("법령 {i:02}")))
        .collect();
    let page2: Vec<String> = (21..=25)
        .map(|i| law_element(&format!("{i:06}"), &format!("법령 {i:02}")))
        .collect();

    let first = server
        .mock_async(move |when, then| {
            when.method(GET)
                .path("/lawSearch.do")
                .query_param("display", "20")
                .query_param("page", "1");
            then.status(200).body(search_body(60, 1, &page1));
        })
        .await;
    let second = server
        .mock_async(move |when, then| {
            when.method(GET)
                .path("/lawSearch.do")
                .query_param("display", "5")
                .query_param("page", "2");
            then.status(200).body(search_body(60, 2, &page2));
        })
        .await;
    mock_detail_any(&server, 2).await;

    let store = MemoryStore::new();
    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        IngestOptions {
            page_size: 20,
            ..options(25)
        },
    );

    let report = ingestor.run().await.unwrap();
    assert_eq!(report.inserted, 25);
    assert_eq!(report.failed, 0);
    assert_eq!(first.hits_async().await, 1);
    assert_eq!(second.hits_async().await, 1);
    assert_eq!(store.rows().len(), 25);
    assert!(store.rows().iter().all(|r| r.embedding_dim == 8));
}

#[tokio::test]
async fn second_run_skips_everything_already_stored() {
    let server = MockServer::start_async().await;
    let laws = vec![law_element("000001", "민법"), law_element("000002", "상법")];
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do");
            then.status(200).body(search_body(2, 1, &laws));
        })
        .await;
    mock_detail_any(&server, 3).await;

    let store = MemoryStore::new();
    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        options(10),
    );

    let first = ingestor.run().await.unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.skipped, 0);

    let second = ingestor.run().await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(store.rows().len(), 2);
}

#[tokio::test]
async fn update_replaces_the_stored_row() {
    let server = MockServer::start_async().await;
    let laws = vec![law_element("000001", "민법")];
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do");
            then.status(200).body(search_body(1, 1, &laws));
        })
        .await;
    mock_detail_any(&server, 4).await;

    let store = MemoryStore::new();
    let opts = IngestOptions {
        update_existing: true,
        ..options(10)
    };
    let ingestor = Ingestor::new(client(&server), store.clone(), MockEmbedder::new(8), opts);

    let first = ingestor.run().await.unwrap();
    assert_eq!(first.inserted, 1);
    let old_id = store.rows()[0].id;

    let second = ingestor.run().await.unwrap();
    assert_eq!(second.updated, 1);
    assert_eq!(second.inserted, 0);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_ne!(rows[0].id, old_id);
    assert_eq!(rows[0].article_count, 4);
}

#[tokio::test]
async fn one_bad_detail_does_not_stop_the_run() {
    let server = MockServer::start_async().await;
    let laws: Vec<String> = (1..=10)
        .map(|i| law_element(&format!("{i:06}"), &format!("법령 {i:02}")))
        .collect();
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do").query_param("page", "1");
            then.status(200).body(search_body(10, 1, &laws));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/lawSearch.do").query_param("page", "2");
            then.status(200).body(search_body(10, 2, &[]));
        })
        .await;
    for i in 1..=10 {
        let mst = format!("{i:06}");
        server
            .mock_async(move |when, then| {
                when.method(GET).path("/lawService.do").query_param("MST", mst);
                if i == 3 {
                    then.status(500).body("boom");
                } else {
                    then.status(200).body(detail_body(1));
                }
            })
            .await;
    }

    let store = MemoryStore::new();
    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        options(10),
    );

    let report = ingestor.run().await.unwrap();
    assert_eq!(report.inserted, 9);
    assert_eq!(report.failed, 1);
    assert!(store.rows().iter().all(|r| r.external_id != "000003"));
}

#[tokio::test]
async fn skipped_items_do_not_consume_the_ingest_cap() {
    let server = MockServer::start_async().await;
    let page1 = vec![law_element("000001", "민법"), law_element("000002", "상법")];
    let page2 = vec![law_element("000003", "형법")];
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do").query_param("page", "1");
            then.status(200).body(search_body(3, 1, &page1));
        })
        .await;
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do").query_param("page", "2");
            then.status(200).body(search_body(3, 2, &page2));
        })
        .await;
    mock_detail_any(&server, 1).await;

    let store = MemoryStore::new();
    for (ext, name) in [("000001", "민법"), ("000002", "상법")] {
        store
            .insert_statute(
                &StatuteSummary {
                    external_id: ext.to_string(),
                    name: name.to_string(),
                    ..StatuteSummary::default()
                },
                &StatuteDetail::default(),
                &Embedding {
                    vector: vec![0.0; 8],
                    source_text: String::new(),
                },
                None,
            )
            .await
            .unwrap();
    }

    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        options(2),
    );

    // Both already-stored statutes are skipped without using up the cap,
    // so the new statute on the next page is still ingested.
    let report = ingestor.run().await.unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(store.rows().len(), 3);
    assert!(store.rows().iter().any(|r| r.name == "형법"));
}

#[tokio::test]
async fn zero_matches_is_an_empty_report() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/lawSearch.do");
            then.status(200).body(search_body(0, 1, &[]));
        })
        .await;

    let ingestor = Ingestor::new(
        client(&server),
        MemoryStore::new(),
        MockEmbedder::new(8),
        options(10),
    );
    let report = ingestor.run().await.unwrap();
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn listing_entry_without_external_id_is_ignored_silently() {
    let server = MockServer::start_async().await;
    let laws = vec![law_element("", "무명 법령"), law_element("000002", "상법")];
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do");
            then.status(200).body(search_body(2, 1, &laws));
        })
        .await;
    mock_detail_any(&server, 1).await;

    let store = MemoryStore::new();
    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        options(10),
    );

    let report = ingestor.run().await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(store.rows().len(), 1);
    assert_eq!(store.rows()[0].name, "상법");
}

#[tokio::test]
async fn existence_policy_controls_outage_behaviour() {
    let server = MockServer::start_async().await;
    let laws = vec![law_element("000001", "민법")];
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do");
            then.status(200).body(search_body(1, 1, &laws));
        })
        .await;
    mock_detail_any(&server, 1).await;

    // Fail open: the item is written despite the failed check.
    let store = MemoryStore::new();
    store.fail_finds(true);
    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        options(10),
    );
    let report = ingestor.run().await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(store.rows().len(), 1);

    // Fail closed: the item is counted as failed and nothing is written.
    let store = MemoryStore::new();
    store.fail_finds(true);
    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        IngestOptions {
            existence_policy: ExistencePolicy::FailClosed,
            ..options(10)
        },
    );
    let report = ingestor.run().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.inserted, 0);
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn preserve_created_at_carries_the_old_timestamp() {
    let server = MockServer::start_async().await;
    let laws = vec![law_element("000001", "민법")];
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do");
            then.status(200).body(search_body(1, 1, &laws));
        })
        .await;
    mock_detail_any(&server, 1).await;

    let store = MemoryStore::new();
    let original = Utc::now() - ChronoDuration::days(90);
    store
        .insert_statute(
            &StatuteSummary {
                external_id: "000001".to_string(),
                name: "민법".to_string(),
                ..StatuteSummary::default()
            },
            &StatuteDetail::default(),
            &Embedding {
                vector: vec![0.0; 8],
                source_text: String::new(),
            },
            Some(original),
        )
        .await
        .unwrap();

    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        IngestOptions {
            update_existing: true,
            update_strategy: UpdateStrategy::PreserveCreatedAt,
            ..options(10)
        },
    );

    let report = ingestor.run().await.unwrap();
    assert_eq!(report.updated, 1);
    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].created_at, original);
}

#[tokio::test]
async fn fetch_one_requires_an_exact_title_match() {
    let server = MockServer::start_async().await;
    let laws: Vec<String> = (1..=7)
        .map(|i| law_element(&format!("{i:06}"), &format!("민법 시행령 {i}")))
        .collect();
    server
        .mock_async(move |when, then| {
            when.method(GET)
                .path("/lawSearch.do")
                .query_param("query", "민법");
            then.status(200).body(search_body(7, 1, &laws));
        })
        .await;

    let ingestor = Ingestor::new(
        client(&server),
        MemoryStore::new(),
        MockEmbedder::new(8),
        options(10),
    );

    let err = ingestor.fetch_one("민법").await.unwrap_err();
    match err {
        IngestError::NoExactMatch { name, candidates } => {
            assert_eq!(name, "민법");
            assert_eq!(candidates.len(), 5);
            assert_eq!(candidates[0], "민법 시행령 1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn fetch_one_ingests_the_exact_match() {
    let server = MockServer::start_async().await;
    let laws = vec![law_element("000009", "민법 시행령"), law_element("000001", "민법")];
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/lawSearch.do");
            then.status(200).body(search_body(2, 1, &laws));
        })
        .await;
    mock_detail_any(&server, 2).await;

    let store = MemoryStore::new();
    let ingestor = Ingestor::new(
        client(&server),
        store.clone(),
        MockEmbedder::new(8),
        options(10),
    );

    let outcome = ingestor.fetch_one("민법").await.unwrap();
    assert!(matches!(outcome, SingleOutcome::Inserted(_)));
    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "민법");
    assert_eq!(rows[0].external_id, "000001");

    // A second call with updates off reports the stored row untouched.
    let outcome = ingestor.fetch_one("민법").await.unwrap();
    assert!(matches!(outcome, SingleOutcome::AlreadyStored { .. }));
    assert_eq!(store.rows().len(), 1);
}
