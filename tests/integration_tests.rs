use cartola_fetcher::{
    api::{HttpCartolaApi, create_http_client_with_timeout},
    config::Config,
    credentials::{
        CredentialManager, CredentialStore, HttpTokenRefresher, TokenTriple,
        bootstrap::bootstrap_credential,
    },
    storage::{self, DbPool, SqliteCredentialStore, SqliteSyncStore, SyncStore, Table},
    sync::{
        CycleOutcome, CycleSettings, FetchCycle, RateLimiter, RetryPolicy, Scheduler, Stage,
        season::invalidate_season_cache,
    },
    testing_utils::TestDataBuilder,
};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_KEY: &str = "AERO_RBSV";

fn config_for(server: &MockServer) -> Config {
    Config {
        api_domain: server.uri(),
        formations_api_domain: server.uri(),
        refresh_url: format!("{}/v1/refresh-token", server.uri()),
        database_url: "sqlite::memory:".to_string(),
        env_key: ENV_KEY.to_string(),
        max_retries: 2,
        base_retry_delay_ms: 5,
        rate_limit_max_calls: 100,
        rate_limit_period_ms: 1000,
        http_timeout_seconds: 5,
        ..Config::default()
    }
}

async fn seeded_pool() -> DbPool {
    let pool = storage::init_pool("sqlite::memory:").await.unwrap();
    let store = SqliteCredentialStore::new(pool.clone());
    bootstrap_credential(
        &store,
        ENV_KEY,
        TokenTriple::new("stale-access", "refresh-0", "id-0"),
    )
    .await
    .unwrap();
    pool
}

fn build_cycle(config: &Config, pool: &DbPool) -> FetchCycle {
    let client = create_http_client_with_timeout(config.http_timeout_seconds).unwrap();
    let credentials = CredentialManager::new(
        Arc::new(SqliteCredentialStore::new(pool.clone())),
        Arc::new(HttpTokenRefresher::new(client.clone(), config)),
    );
    FetchCycle::new(
        Arc::new(HttpCartolaApi::new(client, config)),
        Arc::new(SqliteSyncStore::new(pool.clone())),
        Arc::new(credentials),
        Arc::new(RateLimiter::from_config(config)),
        RetryPolicy::from_config(config),
        CycleSettings::from_config(config),
    )
}

async fn mount_get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts every endpoint for a season whose current round is `period`.
///
/// Highlights reject the bootstrapped `stale-access` token and accept the
/// refreshed `access-1`.
async fn mount_season(server: &MockServer, period: i64, athletes: usize) {
    mount_get(
        server,
        "/mercado/status",
        TestDataBuilder::status_payload(period, 2025),
    )
    .await;
    mount_get(
        server,
        "/atletas/mercado",
        TestDataBuilder::market_payload(athletes, 20),
    )
    .await;
    mount_get(server, "/esquemas", TestDataBuilder::formations_payload()).await;
    for past in 1..period {
        mount_get(
            server,
            &format!("/partidas/{past}"),
            TestDataBuilder::matches_payload(past, 10),
        )
        .await;
        mount_get(
            server,
            &format!("/atletas/pontuados/{past}"),
            TestDataBuilder::scored_payload(past, 5),
        )
        .await;
    }

    Mock::given(method("POST"))
        .and(path("/v1/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/mercado/destaques"))
        .and(header("Authorization", "Bearer stale-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/mercado/destaques"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(TestDataBuilder::highlights_payload(5)),
        )
        .mount(server)
        .await;
}

/// A full cycle against a mock API fills every table
#[tokio::test]
#[serial]
async fn test_full_cycle_populates_store() {
    invalidate_season_cache().await;
    let server = MockServer::start().await;
    mount_season(&server, 4, 30).await;

    let config = config_for(&server);
    let pool = seeded_pool().await;
    let cycle = build_cycle(&config, &pool);

    let report = cycle.run(&CancellationToken::new()).await;

    assert_eq!(report.outcome, CycleOutcome::Success, "{report:?}");
    assert_eq!(report.current_period, Some(4));
    assert_eq!(report.season, Some(2025));

    let store = SqliteSyncStore::new(pool.clone());
    assert_eq!(store.row_count(Table::Athletes).await.unwrap(), 30);
    assert_eq!(store.row_count(Table::Clubs).await.unwrap(), 20);
    assert_eq!(store.row_count(Table::Formations).await.unwrap(), 7);
    assert_eq!(store.row_count(Table::Matches).await.unwrap(), 30);
    assert_eq!(store.row_count(Table::Scored).await.unwrap(), 15);
    assert_eq!(store.row_count(Table::Highlights).await.unwrap(), 5);

    // The refreshed triple was persisted
    let credential = SqliteCredentialStore::new(pool.clone())
        .get(ENV_KEY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credential.tokens.access_token, "access-1");
    assert_eq!(credential.tokens.refresh_token, "refresh-1");
    assert_eq!(credential.tokens.id_token, "id-0");
    assert!(credential.last_refreshed_at.is_some());

    // The stored token was tried before the refresh exchange
    let requests = server.received_requests().await.unwrap();
    let bearers: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == "/auth/mercado/destaques")
        .filter_map(|r| r.headers.get("authorization"))
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    assert_eq!(bearers, vec!["Bearer stale-access", "Bearer access-1"]);
}

/// A closed market lists clubs but no athletes; the stored athletes survive
#[tokio::test]
#[serial]
async fn test_closed_market_keeps_stored_athletes() {
    invalidate_season_cache().await;
    let server = MockServer::start().await;
    mount_season(&server, 1, 0).await;

    let config = config_for(&server);
    let pool = seeded_pool().await;
    let store = SqliteSyncStore::new(pool.clone());
    store
        .store_athletes(1, &TestDataBuilder::market(30, 20).atletas)
        .await
        .unwrap();

    let report = build_cycle(&config, &pool)
        .run(&CancellationToken::new())
        .await;

    assert_eq!(report.outcome, CycleOutcome::Partial, "{report:?}");
    assert!(!report.stage(Stage::Market).unwrap().ok);
    assert!(report.stage(Stage::Clubs).unwrap().ok);
    assert_eq!(store.row_count(Table::Athletes).await.unwrap(), 30);
    assert_eq!(store.row_count(Table::Clubs).await.unwrap(), 20);
}

/// Rounds already on disk are not requested again
#[tokio::test]
#[serial]
async fn test_backfill_only_requests_gaps() {
    invalidate_season_cache().await;
    let server = MockServer::start().await;
    mount_season(&server, 5, 30).await;

    let config = config_for(&server);
    let pool = seeded_pool().await;
    let store = SqliteSyncStore::new(pool.clone());
    for period in [1, 2, 4] {
        store
            .store_matches(period, &TestDataBuilder::matches(period, 10))
            .await
            .unwrap();
    }

    let report = build_cycle(&config, &pool)
        .run(&CancellationToken::new())
        .await;
    assert_eq!(report.outcome, CycleOutcome::Success, "{report:?}");

    let requests = server.received_requests().await.unwrap();
    let match_requests: Vec<String> = requests
        .iter()
        .map(|r| r.url.path().to_string())
        .filter(|p| p.starts_with("/partidas/"))
        .collect();
    assert_eq!(match_requests, vec!["/partidas/3".to_string()]);

    let periods = store.existing_periods(Table::Matches, 1, 4).await.unwrap();
    assert_eq!(periods.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
}

/// An unreachable status endpoint aborts the cycle before any write
#[tokio::test]
#[serial]
async fn test_status_failure_aborts_cycle() {
    invalidate_season_cache().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mercado/status"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let pool = seeded_pool().await;
    let report = build_cycle(&config, &pool)
        .run(&CancellationToken::new())
        .await;

    assert_eq!(report.outcome, CycleOutcome::Error);
    assert!(report.error.is_some());
    assert!(report.stage(Stage::Market).is_none());

    let store = SqliteSyncStore::new(pool);
    assert_eq!(store.row_count(Table::Athletes).await.unwrap(), 0);
}

/// A second cycle in the same round leaves the store unchanged
#[tokio::test]
#[serial]
async fn test_repeated_cycles_are_idempotent() {
    invalidate_season_cache().await;
    let server = MockServer::start().await;
    mount_season(&server, 3, 30).await;

    let config = config_for(&server);
    let pool = seeded_pool().await;
    let cycle = build_cycle(&config, &pool);

    let first = cycle.run(&CancellationToken::new()).await;
    assert_eq!(first.outcome, CycleOutcome::Success, "{first:?}");
    let requests_after_first = server.received_requests().await.unwrap().len();

    let second = cycle.run(&CancellationToken::new()).await;
    assert_eq!(second.outcome, CycleOutcome::Success, "{second:?}");

    let store = SqliteSyncStore::new(pool);
    assert_eq!(store.row_count(Table::Matches).await.unwrap(), 20);
    assert_eq!(store.row_count(Table::Scored).await.unwrap(), 10);
    assert_eq!(store.row_count(Table::Highlights).await.unwrap(), 5);

    // Second cycle only needs status and the live market
    let requests = server.received_requests().await.unwrap();
    let extra: Vec<String> = requests[requests_after_first..]
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        extra,
        vec!["/mercado/status".to_string(), "/atletas/mercado".to_string()]
    );
}

/// The scheduler records each cycle and stops cleanly
#[tokio::test]
#[serial]
async fn test_scheduler_status_after_start_and_stop() {
    invalidate_season_cache().await;
    let server = MockServer::start().await;
    mount_season(&server, 2, 30).await;

    let config = config_for(&server);
    let pool = seeded_pool().await;
    let scheduler = Scheduler::new(Arc::new(build_cycle(&config, &pool)));

    scheduler.start(Duration::from_secs(3600)).await.unwrap();
    let status = scheduler.status().await;
    assert!(status.running);
    assert_eq!(status.last_cycle_outcome, Some(CycleOutcome::Success));
    assert_eq!(status.current_period, Some(2));
    assert!(status.last_cycle_time.is_some());

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["last_cycle_outcome"], "success");

    scheduler.stop().await;
    assert!(!scheduler.status().await.running);
    assert!(!scheduler.is_running().await);
}
