use crate::common::{listing_html, lot, sqlite_url, test_config};
use hibid_ingest::crawler::{FetchError, HttpFetcher, PageQuery, PageSource};
use hibid_ingest::storage::{SqliteStorage, Storage};
use hibid_ingest::RunStatus;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn all_lots_query() -> PageQuery {
    PageQuery {
        zip_code: "78414".to_string(),
        radius_miles: 50,
        category: None,
        search_term: None,
    }
}

fn html_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn fetcher_for(server: &MockServer, page_size: u32) -> HttpFetcher {
    let mut config = test_config("sqlite::memory:");
    config.source.base_url = server.uri();
    config.source.page_size = page_size;
    HttpFetcher::new(&config).unwrap()
}

#[tokio::test]
async fn test_fetch_page_sends_search_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lots/"))
        .and(query_param("status", "open"))
        .and(query_param("zip", "78414"))
        .and(query_param("miles", "50"))
        .and(query_param("apage", "2"))
        .and(query_param("ipp", "3"))
        .respond_with(html_response(listing_html(&[lot(7), lot(8)])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 3);
    let page = fetcher.fetch_page(&all_lots_query(), 2).await.unwrap();

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0]["id"], 7);
    // fewer lots than the page size
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_fetch_page_category_path_and_term() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lots/farm-equipment/"))
        .and(query_param("q", "john deere"))
        .respond_with(html_response(listing_html(&[lot(1), lot(2), lot(3)])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 3);
    let query = PageQuery {
        category: Some("farm-equipment".to_string()),
        search_term: Some("john deere".to_string()),
        ..all_lots_query()
    };
    let page = fetcher.fetch_page(&query, 1).await.unwrap();

    assert_eq!(page.records.len(), 3);
    assert!(page.has_more);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html_response(listing_html(&[lot(1)])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    let page = fetcher.fetch_page(&all_lots_query(), 1).await.unwrap();
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    let result = fetcher.fetch_page(&all_lots_query(), 1).await;

    match result {
        Err(FetchError::FetchFailed { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Status { status: 503, .. }));
        }
        other => panic!("expected FetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_page_without_state_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html_response(
            "<html><body><p>Please enable JavaScript</p></body></html>".to_string(),
        ))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    let result = fetcher.fetch_page(&all_lots_query(), 1).await;

    match result {
        Err(FetchError::FetchFailed { last, .. }) => {
            assert!(matches!(*last, FetchError::MalformedPayload { .. }));
        }
        other => panic!("expected FetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_body_is_retryable_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    let result = fetcher.fetch_page(&all_lots_query(), 1).await;

    match result {
        Err(FetchError::FetchFailed { last, .. }) => {
            assert!(matches!(*last, FetchError::EmptyBody { .. }));
        }
        other => panic!("expected FetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_state_without_lots_is_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html_response(listing_html(&[])))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    let page = fetcher.fetch_page(&all_lots_query(), 1).await.unwrap();
    assert!(page.records.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_end_to_end_run_over_http() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let lots: Vec<_> = (1..=10).map(lot).collect();
    Mock::given(method("GET"))
        .and(path("/lots/"))
        .and(query_param("apage", "1"))
        .respond_with(html_response(listing_html(&lots)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&sqlite_url(dir.path()));
    config.source.base_url = server.uri();
    config.source.page_size = 10;
    config.search.test_mode = true;
    config.search.test_limit = 5;

    let summary = hibid_ingest::run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.items_found, 5);
    assert_eq!(summary.items_added, 5);
    assert_eq!(summary.pages_scraped, 1);

    let storage = SqliteStorage::new(&dir.path().join("auctions.db")).unwrap();
    assert_eq!(storage.count_items().await.unwrap(), 5);
    let stored = storage.get_item("3").await.unwrap().unwrap();
    assert_eq!(stored.raw_payload["lead"], "Lot 3");
    assert_eq!(stored.category, None);
}

#[tokio::test]
async fn test_end_to_end_failed_fetch_counts_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/lots/cars/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lots/boats/"))
        .respond_with(html_response(listing_html(&[lot(40), lot(41)])))
        .mount(&server)
        .await;

    let mut config = test_config(&sqlite_url(dir.path()));
    config.source.base_url = server.uri();
    config.source.page_size = 10;
    config.search.categories = vec!["cars".to_string(), "boats".to_string()];

    let summary = hibid_ingest::run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.items_found, 2);
    assert_eq!(summary.params.categories, vec!["cars", "boats"]);
}
