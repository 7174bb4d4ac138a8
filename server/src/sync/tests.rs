use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use async_trait::async_trait;

use super::*;
use crate::archive::mock::MockArchiveSource;
use crate::archive::RawGame;
use crate::identity::user_id;
use crate::normalize::fixtures::raw_game;

const BASE: &str = "https://api.chess.com/pub/player/alice/games";

fn archive_url(period: &str) -> String {
    format!("{BASE}/{period}")
}

fn games(prefix: &str, n: usize) -> Vec<RawGame> {
    (0..n)
        .map(|i| raw_game(&format!("{prefix}-{i}"), ("Alice", "win"), ("Bob", "resigned")))
        .collect()
}

fn service(dir: &TempDir, mock: &Arc<MockArchiveSource>, batch: usize) -> Arc<SyncService> {
    let config = SyncConfig {
        fetch_timeout: Duration::from_secs(5),
        max_concurrent_fetches: 4,
        insert_batch_size: batch,
    };
    Arc::new(SyncService::new(
        mock.clone(),
        Arc::new(Stores::new(dir.path())),
        Arc::new(JobRegistry::new()),
        config,
    ))
}

async fn sync_to_end(service: &Arc<SyncService>, username: &str) -> SyncResponse {
    service.request_sync(username).await.unwrap().wait().await
}

async fn status_of(service: &SyncService, username: &str) -> Option<JobStatus> {
    service.registry().get(&user_id(username).unwrap()).await
}

async fn rows(service: &SyncService, username: &str) -> (i64, i64) {
    service
        .stores()
        .handle(&user_id(username).unwrap())
        .await
        .unwrap()
        .count_rows()
        .await
        .unwrap()
}

#[test]
fn test_plan_table() {
    use JobStatus::{Complete, Failed, Pending, Started, Updating};

    assert_eq!(plan(Some(Started), true), Plan::Reject);
    assert_eq!(plan(Some(Started), false), Plan::Reject);
    assert_eq!(plan(Some(Updating), true), Plan::Report(Updating));
    for idle in [Pending, Complete] {
        assert_eq!(
            plan(Some(idle), true),
            Plan::Run {
                mode: SyncMode::Incremental,
                next: Updating
            }
        );
    }
    assert_eq!(plan(None, true), Plan::Recover);
    assert_eq!(
        plan(None, false),
        Plan::Run {
            mode: SyncMode::Full,
            next: Started
        }
    );
    assert_eq!(
        plan(Some(Failed), true),
        Plan::Run {
            mode: SyncMode::Incremental,
            next: Updating
        }
    );
    assert_eq!(
        plan(Some(Failed), false),
        Plan::Run {
            mode: SyncMode::Full,
            next: Started
        }
    );
}

#[test]
fn test_select_since_includes_stored_period() {
    let listed: Vec<_> = ["2024/04", "2024/05", "2024/06"]
        .iter()
        .map(|p| ArchiveId::new(archive_url(p)))
        .collect();
    let stored = ArchiveId::new(archive_url("2024/05"));

    let selected = select_since(&listed, &stored).unwrap();
    assert_eq!(selected, listed[1..].to_vec());
}

#[test]
fn test_select_since_rejects_unparseable_ids() {
    let listed = vec![ArchiveId::new("https://example.test/not-a-period")];
    let stored = ArchiveId::new(archive_url("2024/05"));
    assert!(matches!(
        select_since(&listed, &stored),
        Err(ArchiveError::InvalidArchiveId(_))
    ));
    assert!(select_since(&[], &ArchiveId::new("garbage")).is_err());
}

#[test]
fn test_latest_to_record() {
    let with_period = |p: &str| {
        let id = ArchiveId::new(archive_url(p));
        let period = id.period().unwrap();
        (id, period)
    };
    let periods = vec![
        with_period("2024/04"),
        with_period("2024/05"),
        with_period("2024/06"),
    ];

    assert_eq!(latest_to_record(&periods, &[]), Some(periods[2].0.clone()));
    assert_eq!(
        latest_to_record(&periods, &[periods[2].0.clone(), periods[1].0.clone()]),
        Some(periods[1].0.clone())
    );
    assert_eq!(latest_to_record(&[], &[]), None);
}

#[tokio::test]
async fn test_full_sync_ends_pending() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/04"), games("apr", 2));
    mock.add_archive("alice", &archive_url("2024/05"), games("may", 3));
    let service = service(&dir, &mock, 5000);

    let handle = service.request_sync("Alice").await.unwrap();
    assert_eq!(handle.response.status, JobStatus::Started);
    assert_eq!(handle.response.id, user_id("alice").unwrap());
    assert!(handle.started_work());
    handle.wait().await;

    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Pending));
    assert_eq!(rows(&service, "alice").await, (5, 35));

    let store = service
        .stores()
        .handle(&user_id("alice").unwrap())
        .await
        .unwrap();
    assert_eq!(
        store.most_recent_archive().await.unwrap(),
        ArchiveId::new(archive_url("2024/05"))
    );
    assert_eq!(store.username().await.unwrap().as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_back_to_back_request_rejected_while_started() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/05"), games("may", 1));
    let gate = mock.gate();
    let service = service(&dir, &mock, 5000);

    let first = service.request_sync("alice").await.unwrap();
    assert_eq!(first.response.status, JobStatus::Started);

    let second = service.request_sync("ALICE").await;
    assert!(matches!(second, Err(SyncError::InProgress { .. })));

    gate.notify_one();
    first.wait().await;
    assert_eq!(mock.list_calls(), 1);
    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Pending));
}

#[tokio::test]
async fn test_full_path_twice_gives_identical_row_counts() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/04"), games("apr", 4));
    mock.add_archive("alice", &archive_url("2024/05"), games("may", 4));
    let service = service(&dir, &mock, 3);
    let id = user_id("alice").unwrap();

    let first = service.full_sync(&id, "alice").await.unwrap();
    let after_first = rows(&service, "alice").await;
    let second = service.full_sync(&id, "alice").await.unwrap();
    let after_second = rows(&service, "alice").await;

    assert_eq!(first.write.games_inserted, 8);
    assert_eq!(second.write.games_inserted, 0);
    assert_eq!(second.write.positions_inserted, 0);
    assert_eq!(second.write.games_existing, 8);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_incremental_refetches_from_stored_archive() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/04"), games("apr", 1));
    let may = mock.add_archive("alice", &archive_url("2024/05"), games("may", 1));
    let service = service(&dir, &mock, 5000);
    sync_to_end(&service, "alice").await;

    let june = mock.add_archive("alice", &archive_url("2024/06"), games("jun", 2));
    mock.clear_fetch_log();

    let handle = service.request_sync("alice").await.unwrap();
    assert_eq!(handle.response.status, JobStatus::Updating);
    handle.wait().await;

    let mut fetched = mock.fetched();
    fetched.sort();
    assert_eq!(fetched, vec![may, june.clone()]);
    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Pending));
    assert_eq!(rows(&service, "alice").await.0, 4);

    let store = service
        .stores()
        .handle(&user_id("alice").unwrap())
        .await
        .unwrap();
    assert_eq!(store.most_recent_archive().await.unwrap(), june);
}

#[tokio::test]
async fn test_restart_recovery_takes_incremental_path() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/04"), games("apr", 1));
    mock.add_archive("alice", &archive_url("2024/05"), games("may", 1));
    {
        let before_restart = service(&dir, &mock, 5000);
        sync_to_end(&before_restart, "alice").await;
        before_restart.stores().close_all().await;
    }

    let after_restart = service(&dir, &mock, 5000);
    assert_eq!(status_of(&after_restart, "alice").await, None);
    mock.clear_fetch_log();

    let handle = after_restart.request_sync("alice").await.unwrap();
    assert_eq!(handle.response.status, JobStatus::Updating);
    handle.wait().await;

    assert_eq!(mock.fetched(), vec![ArchiveId::new(archive_url("2024/05"))]);
    assert_eq!(
        status_of(&after_restart, "alice").await,
        Some(JobStatus::Pending)
    );
}

#[tokio::test]
async fn test_request_while_updating_reports_status() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/05"), games("may", 1));
    let service = service(&dir, &mock, 5000);
    sync_to_end(&service, "alice").await;

    let gate = mock.gate();
    let updating = service.request_sync("alice").await.unwrap();
    assert_eq!(updating.response.status, JobStatus::Updating);

    let again = service.request_sync("alice").await.unwrap();
    assert_eq!(again.response.status, JobStatus::Updating);
    assert!(!again.started_work());

    gate.notify_one();
    updating.wait().await;
    assert_eq!(mock.list_calls(), 2);
    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Pending));
}

#[tokio::test]
async fn test_failed_commit_keeps_earlier_batches() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    let mut archive = games("ok", 2);
    archive.push(raw_game("poison", ("Alice", "win"), ("Bob", "resigned")));
    archive.extend(games("late", 2));
    mock.add_archive("alice", &archive_url("2024/05"), archive);
    let service = service(&dir, &mock, 2);

    let store = service
        .stores()
        .open_or_create(&user_id("alice").unwrap())
        .await
        .unwrap();
    sqlx::raw_sql(
        "CREATE TRIGGER poison AFTER INSERT ON games WHEN NEW.id = 'poison' \
         BEGIN INSERT INTO positions (id, fen, game_id) VALUES ('orphan', 'x', 'no-such-game'); END;",
    )
    .execute(&store.pool().await)
    .await
    .unwrap();

    sync_to_end(&service, "alice").await;

    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Failed));
    let (games, positions) = rows(&service, "alice").await;
    assert_eq!(games, 2);
    assert_eq!(positions, 14);
    assert!(matches!(
        store.most_recent_archive().await,
        Err(PersistenceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_all_archives_failing_marks_failed_then_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    let apr = mock.add_archive("alice", &archive_url("2024/04"), games("apr", 1));
    let may = mock.add_archive("alice", &archive_url("2024/05"), games("may", 1));
    mock.fail_archive(&apr);
    mock.fail_archive(&may);
    let service = service(&dir, &mock, 5000);

    sync_to_end(&service, "alice").await;
    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Failed));

    mock.heal_archive(&apr);
    mock.heal_archive(&may);
    let retry = service.request_sync("alice").await.unwrap();
    assert_eq!(retry.response.status, JobStatus::Updating);
    retry.wait().await;

    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Pending));
    assert_eq!(rows(&service, "alice").await.0, 2);
}

#[tokio::test]
async fn test_partial_fetch_failure_records_earliest_failed_archive() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/04"), games("apr", 1));
    let may = mock.add_archive("alice", &archive_url("2024/05"), games("may", 1));
    mock.add_archive("alice", &archive_url("2024/06"), games("jun", 1));
    mock.fail_archive(&may);
    let service = service(&dir, &mock, 5000);

    sync_to_end(&service, "alice").await;

    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Pending));
    assert_eq!(rows(&service, "alice").await.0, 2);
    let store = service
        .stores()
        .handle(&user_id("alice").unwrap())
        .await
        .unwrap();
    assert_eq!(store.most_recent_archive().await.unwrap(), may);
}

#[tokio::test]
async fn test_variant_games_are_not_stored() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    let mut variant = raw_game("960", ("Alice", "win"), ("Bob", "resigned"));
    variant.pgn = format!("[Variant \"Chess960\"]\n{}", variant.pgn);
    let mut archive = games("std", 1);
    archive.push(variant);
    mock.add_archive("alice", &archive_url("2024/05"), archive);
    let service = service(&dir, &mock, 5000);

    sync_to_end(&service, "alice").await;

    assert_eq!(rows(&service, "alice").await, (1, 7));
}

#[tokio::test]
async fn test_blank_username_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    let service = service(&dir, &mock, 5000);
    assert!(matches!(
        service.request_sync("  ").await,
        Err(SyncError::InvalidUsername)
    ));
    assert_eq!(mock.list_calls(), 0);
}

#[tokio::test]
async fn test_user_without_archives_ends_pending() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    let service = service(&dir, &mock, 5000);

    sync_to_end(&service, "newcomer").await;

    assert_eq!(status_of(&service, "newcomer").await, Some(JobStatus::Pending));
    assert_eq!(rows(&service, "newcomer").await, (0, 0));
}

#[tokio::test]
async fn test_unparseable_archive_id_aborts_full_sync() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/04"), games("apr", 1));
    mock.add_archive("alice", "https://x/not-a-period", games("odd", 1));
    let service = service(&dir, &mock, 5000);

    sync_to_end(&service, "alice").await;

    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Failed));
    assert!(mock.fetched().is_empty());
    assert_eq!(rows(&service, "alice").await, (0, 0));
    let store = service
        .stores()
        .handle(&user_id("alice").unwrap())
        .await
        .unwrap();
    assert_eq!(store.username().await.unwrap(), None);
    assert!(matches!(
        store.most_recent_archive().await,
        Err(PersistenceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_listing_failure_marks_failed() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockArchiveSource::new());
    mock.add_archive("alice", &archive_url("2024/05"), games("may", 1));
    mock.add_archive(
        "bob",
        "https://api.chess.com/pub/player/bob/games/2024/05",
        games("bob", 1),
    );
    let service = service(&dir, &mock, 5000);
    sync_to_end(&service, "alice").await;
    mock.clear_fetch_log();
    mock.fail_listing();

    let full = service.request_sync("bob").await.unwrap();
    assert_eq!(full.response.status, JobStatus::Started);
    full.wait().await;
    assert_eq!(status_of(&service, "bob").await, Some(JobStatus::Failed));
    assert_eq!(rows(&service, "bob").await, (0, 0));

    let incremental = service.request_sync("alice").await.unwrap();
    assert_eq!(incremental.response.status, JobStatus::Updating);
    incremental.wait().await;
    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Failed));
    assert_eq!(rows(&service, "alice").await.0, 1);
    assert!(mock.fetched().is_empty());
}

/// Archive source whose listing panics.
struct PanickingSource;

#[async_trait]
impl ArchiveSource for PanickingSource {
    async fn list_archives(&self, username: &str) -> Result<Vec<ArchiveId>, ArchiveError> {
        panic!("listing blew up for {username}");
    }

    async fn fetch_archive(&self, archive: &ArchiveId) -> Result<Vec<RawGame>, ArchiveError> {
        Err(ArchiveError::HttpStatus {
            status: 500,
            url: archive.to_string(),
        })
    }
}

#[tokio::test]
async fn test_panicking_run_ends_failed_and_accepts_retry() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(SyncService::new(
        Arc::new(PanickingSource),
        Arc::new(Stores::new(dir.path())),
        Arc::new(JobRegistry::new()),
        SyncConfig::default(),
    ));

    let first = service.request_sync("alice").await.unwrap();
    assert_eq!(first.response.status, JobStatus::Started);
    first.wait().await;
    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Failed));

    let retry = service.request_sync("alice").await.unwrap();
    assert_eq!(retry.response.status, JobStatus::Updating);
    assert!(retry.started_work());
    retry.wait().await;
    assert_eq!(status_of(&service, "alice").await, Some(JobStatus::Failed));
}
