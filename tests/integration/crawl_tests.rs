//! Integration tests for the crawler
//!
//! Most tests drive the coordinator against an in-memory site and a
//! deterministic oracle. The last ones use wiremock for both the site and the
//! OpenAI-compatible endpoint to test the full cycle end-to-end.

use crate::support::{page, site_url, SiteFetcher, StubOracle, SITE};
use rufus::config::{Config, OracleConfig, UserAgentConfig};
use rufus::crawler::{Coordinator, CrawlRequest, HttpFetcher};
use rufus::oracle::OpenAiOracle;
use rufus::output::{save_results, Outcome, Termination};
use rufus::{ConfigError, OracleError, RufusError, SessionStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with fast retries
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.crawler.retry_base_delay_ms = 1;
    config.crawler.max_retries = 2;
    config
}

fn coordinator(config: Config, fetcher: &Arc<SiteFetcher>, oracle: &Arc<StubOracle>) -> Coordinator {
    Coordinator::new(config, fetcher.clone(), oracle.clone())
}

#[tokio::test]
async fn test_single_page_without_links() {
    let fetcher = Arc::new(SiteFetcher::new().page("/", page("pricing for everyone", &[])));
    let oracle = Arc::new(StubOracle::new("pricing"));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")).max_depth(2))
        .await
        .expect("Crawl failed");

    assert_eq!(result.session.status, SessionStatus::Done);
    assert_eq!(result.session.termination, Termination::Completed);
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].depth, 0);
    assert!(result.pages[0].passed);
    assert_eq!(result.pages[0].parent_url, None);
    // No candidates means no link scoring call
    assert_eq!(oracle.link_calls(), 0);
}

#[tokio::test]
async fn test_chain_respects_max_depth() {
    let fetcher = Arc::new(
        SiteFetcher::new()
            .page("/", page("A pricing", &["/b"]))
            .page("/b", page("B pricing", &["/c"]))
            .page("/c", page("C pricing", &["/d"]))
            .page("/d", page("D pricing", &[])),
    );
    let oracle = Arc::new(StubOracle::new("pricing"));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")).max_depth(2))
        .await
        .unwrap();

    let depths: HashMap<String, u32> = result
        .pages
        .iter()
        .map(|p| (p.url.clone(), p.depth))
        .collect();
    assert_eq!(depths.len(), 3);
    assert_eq!(depths[&site_url("/")], 0);
    assert_eq!(depths[&site_url("/b")], 1);
    assert_eq!(depths[&site_url("/c")], 2);
    assert_eq!(fetcher.fetch_count("/d"), 0);

    assert_eq!(result.stats.depth_breakdown[&2].urls, vec![site_url("/c")]);
}

#[tokio::test]
async fn test_self_link_fetched_once() {
    let fetcher = Arc::new(SiteFetcher::new().page(
        "/",
        page("pricing", &["/", "/#top", "https://SITE.test/", "https://site.test"]),
    ));
    let oracle = Arc::new(StubOracle::new("pricing"));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", SITE))
        .await
        .unwrap();

    assert_eq!(fetcher.fetch_count("/"), 1);
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].outbound_link_count, 4);
    assert_eq!(result.pages[0].selected_link_count, 0);
}

#[tokio::test]
async fn test_scoring_failure_records_failed_page() {
    let fetcher = Arc::new(
        SiteFetcher::new()
            .page("/", page("pricing", &["/a"]))
            .page("/a", page("pricing a", &[])),
    );
    let oracle = Arc::new(StubOracle::new("pricing").score_fails(OracleError::Timeout));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await
        .unwrap();

    assert_eq!(result.session.status, SessionStatus::Done);
    assert_eq!(result.pages.len(), 1);
    assert!(!result.pages[0].passed);
    assert_eq!(result.pages[0].relevance_score, 0.0);
    assert_eq!(result.log[0].outcome, Outcome::ScoreFailed);
    assert!(result.log[0].reason.is_some());
    // Initial attempt plus two retries
    assert_eq!(oracle.score_calls(), 3);
    // Links of an unscored page are not followed
    assert_eq!(result.pages[0].selected_link_count, 0);
    assert_eq!(oracle.link_calls(), 0);
    assert_eq!(fetcher.fetch_count("/a"), 0);
}

#[tokio::test]
async fn test_cancellation_returns_partial_result() {
    let cancel = CancellationToken::new();
    let fetcher = Arc::new(
        SiteFetcher::new()
            .page("/", page("pricing", &["/a", "/b", "/c", "/d", "/e", "/f"]))
            .page("/a", page("pricing a", &[]))
            .page("/b", page("pricing b", &[]))
            .page("/c", page("pricing c", &[]))
            .page("/d", page("pricing d", &[]))
            .page("/e", page("pricing e", &[]))
            .page("/f", page("pricing f", &[]))
            .with_delay(Duration::from_millis(20))
            .cancel_on("/a", cancel.clone()),
    );
    let oracle = Arc::new(StubOracle::new("pricing"));
    let mut config = create_test_config();
    config.crawler.workers = 2;

    let result = coordinator(config, &fetcher, &oracle)
        .with_cancellation(cancel.clone())
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await
        .unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(result.session.status, SessionStatus::Done);
    assert_eq!(result.session.termination, Termination::Cancelled);
    assert!(!result.pages.is_empty());
    assert!(result.pages.len() < 7);
    assert!(result.stats.abandoned > 0);
    assert_eq!(fetcher.started_after_cancel(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_fetch_retries() {
    let cancel = CancellationToken::new();
    let fetcher = Arc::new(
        SiteFetcher::new()
            .failing("/", 503)
            .cancel_on("/", cancel.clone()),
    );
    let oracle = Arc::new(StubOracle::new("pricing"));
    let mut config = create_test_config();
    config.crawler.max_retries = 3;

    let result = coordinator(config, &fetcher, &oracle)
        .with_cancellation(cancel.clone())
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await
        .unwrap();

    assert_eq!(result.session.termination, Termination::Cancelled);
    assert_eq!(fetcher.fetch_count("/"), 1);
    assert_eq!(fetcher.started_after_cancel(), 0);
    assert_eq!(result.log[0].outcome, Outcome::FetchFailed);
    assert!(result.pages.is_empty());
}

#[tokio::test]
async fn test_time_budget_stops_dispatch() {
    let fetcher = Arc::new(
        SiteFetcher::new()
            .page("/", page("pricing", &["/a", "/b", "/c", "/d"]))
            .page("/a", page("pricing a", &[]))
            .page("/b", page("pricing b", &[]))
            .page("/c", page("pricing c", &[]))
            .page("/d", page("pricing d", &[]))
            .with_delay(Duration::from_millis(300)),
    );
    let oracle = Arc::new(StubOracle::new("pricing"));
    let mut config = create_test_config();
    config.crawler.workers = 1;

    // The seed finishes at ~300ms and /a is in flight when the budget runs out
    let result = coordinator(config, &fetcher, &oracle)
        .run(
            CrawlRequest::new("find pricing", site_url("/"))
                .time_budget(Duration::from_millis(450)),
        )
        .await
        .unwrap();

    assert_eq!(result.session.status, SessionStatus::Done);
    assert_eq!(result.session.termination, Termination::TimeBudget);
    assert_eq!(fetcher.total_fetches(), 2);
    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.stats.abandoned, 3);
    assert!(result.is_partial());
}

#[tokio::test]
async fn test_spent_time_budget_dispatches_nothing() {
    let fetcher = Arc::new(SiteFetcher::new().page("/", page("pricing", &[])));
    let oracle = Arc::new(StubOracle::new("pricing"));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")).time_budget(Duration::ZERO))
        .await
        .unwrap();

    assert_eq!(result.session.status, SessionStatus::Done);
    assert_eq!(result.session.termination, Termination::TimeBudget);
    assert_eq!(fetcher.total_fetches(), 0);
    assert_eq!(result.log.len(), 1);
    assert_eq!(result.log[0].outcome, Outcome::Abandoned);
}

#[tokio::test]
async fn test_cancelled_before_start_fetches_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let fetcher = Arc::new(SiteFetcher::new().page("/", page("pricing", &[])));
    let oracle = Arc::new(StubOracle::new("pricing"));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .with_cancellation(cancel)
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await
        .unwrap();

    assert_eq!(result.session.termination, Termination::Cancelled);
    assert!(result.pages.is_empty());
    assert_eq!(fetcher.total_fetches(), 0);
    assert_eq!(result.log[0].outcome, Outcome::Abandoned);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_crawl_invariants() {
    // A dense, cyclic site: every page links to every other page
    let paths: Vec<String> = (0..12).map(|i| format!("/p{}", i)).collect();
    let hrefs: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
    let mut site = SiteFetcher::new().page("/", page("pricing root", &hrefs[..4]));
    for (i, p) in paths.iter().enumerate() {
        let next: Vec<&str> = hrefs
            .iter()
            .cycle()
            .skip(i + 1)
            .take(5)
            .copied()
            .chain(std::iter::once("/"))
            .collect();
        site = site.page(p, page(&format!("pricing {}", p), &next));
    }
    let fetcher = Arc::new(site.with_delay(Duration::from_millis(2)));
    let oracle = Arc::new(StubOracle::new("pricing"));
    let mut config = create_test_config();
    config.crawler.workers = 8;

    let result = coordinator(config, &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")).max_depth(2))
        .await
        .unwrap();

    // Every URL fetched at most once
    for (path, count) in fetcher.fetch_counts() {
        assert_eq!(count, 1, "{} fetched {} times", path, count);
    }

    // Depth bound and unique URLs
    let mut seen = HashSet::new();
    for record in &result.pages {
        assert!(record.depth <= 2);
        assert!(seen.insert(record.url.clone()), "duplicate {}", record.url);
    }

    // Depth is always parent depth + 1
    let depth_of: HashMap<&str, u32> = result
        .pages
        .iter()
        .map(|p| (p.url.as_str(), p.depth))
        .collect();
    for record in &result.pages {
        match &record.parent_url {
            None => assert_eq!(record.depth, 0),
            Some(parent) => assert_eq!(depth_of[parent.as_str()] + 1, record.depth),
        }
    }

    assert_eq!(result.stats.total_pages, result.pages.len());
    assert_eq!(result.session.termination, Termination::Completed);
}

#[tokio::test]
async fn test_irrelevant_page_uses_strict_link_threshold() {
    let fetcher = Arc::new(
        SiteFetcher::new()
            .page("/", page("company history", &["/maybe", "/likely"]))
            .page("/maybe", page("maybe pricing", &[]))
            .page("/likely", page("pricing", &[])),
    );
    let oracle = Arc::new(
        StubOracle::new("pricing")
            .link_score(&site_url("/maybe"), 0.6)
            .link_score(&site_url("/likely"), 0.75),
    );

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await
        .unwrap();

    assert!(!result.pages[0].passed);
    assert_eq!(fetcher.fetch_count("/maybe"), 0);
    assert_eq!(fetcher.fetch_count("/likely"), 1);
    assert_eq!(result.pages[0].selected_link_count, 1);
}

#[tokio::test]
async fn test_links_outside_seed_host_are_ignored() {
    let fetcher = Arc::new(SiteFetcher::new().page(
        "/",
        page("pricing", &["https://elsewhere.test/pricing", "/local"]),
    ).page("/local", page("local pricing", &[])));
    let oracle = Arc::new(StubOracle::new("pricing"));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await
        .unwrap();

    let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.contains(&site_url("/local").as_str()));
}

#[tokio::test]
async fn test_expansion_failure_degrades_to_literal_terms() {
    let fetcher = Arc::new(SiteFetcher::new().page("/", page("enterprise pricing", &[])));
    let oracle = Arc::new(
        StubOracle::new("pricing").expand_fails(OracleError::Malformed("no list".to_string())),
    );

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new(
            "Find enterprise pricing tiers",
            site_url("/"),
        ))
        .await
        .unwrap();

    assert!(result.session.keywords_degraded);
    for term in ["enterprise", "pricing", "tiers"] {
        assert!(
            result.session.expanded_terms.contains(&term.to_string()),
            "missing {}",
            term
        );
    }
    assert_eq!(result.pages.len(), 1);
}

#[tokio::test]
async fn test_expansion_failure_without_literal_terms_fails_session() {
    let fetcher = Arc::new(SiteFetcher::new().page("/", page("pricing", &[])));
    let oracle = Arc::new(StubOracle::new("pricing").expand_fails(OracleError::Timeout));

    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("show me all of it", site_url("/")))
        .await;

    assert!(matches!(result, Err(RufusError::Oracle(OracleError::Timeout))));
    assert_eq!(fetcher.total_fetches(), 0);
}

#[tokio::test]
async fn test_missing_credential_fails_before_fetching() {
    let fetcher = Arc::new(SiteFetcher::new().page("/", page("pricing", &[])));
    let oracle_config = OracleConfig {
        api_key_env: "RUFUS_TEST_UNSET_KEY".to_string(),
        ..OracleConfig::default()
    };
    let oracle = OpenAiOracle::new(&oracle_config, None, Duration::from_secs(1)).unwrap();

    let result = Coordinator::new(create_test_config(), fetcher.clone(), Arc::new(oracle))
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await;

    match result {
        Err(RufusError::Config(ConfigError::MissingCredential(var))) => {
            assert_eq!(var, "RUFUS_TEST_UNSET_KEY")
        }
        other => panic!("unexpected result: {:?}", other.map(|r| r.pages.len())),
    }
    assert_eq!(fetcher.total_fetches(), 0);
}

#[tokio::test]
async fn test_result_is_saved_as_json() {
    let fetcher = Arc::new(SiteFetcher::new().page("/", page("pricing", &[])));
    let oracle = Arc::new(StubOracle::new("pricing"));
    let result = coordinator(create_test_config(), &fetcher, &oracle)
        .run(CrawlRequest::new("find pricing", site_url("/")))
        .await
        .unwrap();

    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = save_results(&result, temp_dir.path()).unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("semantic_results_"));
    assert!(name.ends_with(".json"));

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["session"]["instruction"], "find pricing");
    assert_eq!(value["stats"]["relevant_pages"], 1);
}

/// Mounts an OpenAI-compatible endpoint answering each prompt kind
async fn mount_oracle(server: &MockServer, link_answer: &str) {
    let completion = |content: &str| {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        }))
    };

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("comma-separated list of keywords"))
        .respond_with(completion("price, cost, plans"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Respond only with a number"))
        .respond_with(completion("0.8"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("JSON array"))
        .respond_with(completion(link_answer))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    // Start mock servers for the site and the oracle
    let site = MockServer::start().await;
    let oracle_server = MockServer::start().await;
    mount_oracle(&oracle_server, "[0.9, 0.2]").await;

    // Mock index page with links
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Home</title></head><body>
            <p>Welcome. See <a href="/pricing">Pricing</a> or read <a href="/about">About us</a>.</p>
            </body></html>"#,
            "text/html",
        ))
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Pricing</title></head><body>Plans from $5</body></html>"#,
            "text/html",
        ))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body>About</body></html>",
            "text/html",
        ))
        .expect(0)
        .mount(&site)
        .await;

    let mut config = create_test_config();
    config.oracle.base_url = oracle_server.uri();
    let fetcher = HttpFetcher::from_config(&UserAgentConfig::default()).unwrap();
    let oracle = OpenAiOracle::new(
        &config.oracle,
        Some("test-key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let result = Coordinator::new(config, Arc::new(fetcher), Arc::new(oracle))
        .run(CrawlRequest::new("find pricing plans", format!("{}/", site.uri())))
        .await
        .expect("Crawl failed");

    assert_eq!(result.session.status, SessionStatus::Done);
    assert!(!result.session.keywords_degraded);
    assert!(result.session.expanded_terms.contains(&"cost".to_string()));

    let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.contains(&format!("{}/pricing", site.uri()).as_str()));

    let home = &result.pages[0];
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.outbound_link_count, 2);
    assert_eq!(home.selected_link_count, 1);
    assert!((home.relevance_score - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_trailing_slash_urls_are_requested_as_written() {
    let site = MockServer::start().await;
    let oracle_server = MockServer::start().await;
    mount_oracle(&oracle_server, "[0.9]").await;

    // Only the slash forms exist; a relative link resolves under /docs/
    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><p>Pricing docs. Start with the <a href="intro">intro</a>.</p></body></html>"#,
            "text/html",
        ))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/intro"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body>Plans and pricing</body></html>",
            "text/html",
        ))
        .expect(1)
        .mount(&site)
        .await;

    let mut config = create_test_config();
    config.oracle.base_url = oracle_server.uri();
    let fetcher = HttpFetcher::from_config(&UserAgentConfig::default()).unwrap();
    let oracle = OpenAiOracle::new(
        &config.oracle,
        Some("test-key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let result = Coordinator::new(config, Arc::new(fetcher), Arc::new(oracle))
        .run(CrawlRequest::new("find pricing", format!("{}/docs/", site.uri())))
        .await
        .unwrap();

    let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/docs", site.uri()),
            format!("{}/docs/intro", site.uri())
        ]
    );
    assert_eq!(result.session.start_url, format!("{}/docs", site.uri()));
    assert_eq!(result.stats.failures, 0);
}

#[tokio::test]
async fn test_malformed_link_scores_stop_expansion_softly() {
    let site = MockServer::start().await;
    let oracle_server = MockServer::start().await;
    // One score for two candidates
    mount_oracle(&oracle_server, "[0.9]").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><a href="/a">A</a> <a href="/b">B</a></body></html>"#,
            "text/html",
        ))
        .mount(&site)
        .await;

    let mut config = create_test_config();
    config.oracle.base_url = oracle_server.uri();
    let fetcher = HttpFetcher::from_config(&UserAgentConfig::default()).unwrap();
    let oracle = OpenAiOracle::new(
        &config.oracle,
        Some("test-key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let result = Coordinator::new(config, Arc::new(fetcher), Arc::new(oracle))
        .run(CrawlRequest::new("find pricing", site.uri()))
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].selected_link_count, 0);
    assert_eq!(result.session.termination, Termination::Completed);
}
