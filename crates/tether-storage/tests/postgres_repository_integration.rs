use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tether_storage::{
    DeletionRequest, PostgresRepository, PostgresSettings, Repository, ShortenedUrl, StorageError,
};
use tether_test_infra::postgres::{PostgresConfig, PostgresServer};

const CALL_TIMEOUT: Duration = Duration::from_secs(3);

struct Fixture {
    _postgres: PostgresServer,
    url: String,
    repo: PostgresRepository,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let pool = postgres.connect(5).await.expect("connect postgres");

        let repo = PostgresRepository::new(pool, CALL_TIMEOUT);
        repo.migrate().await.expect("create schema");

        Self {
            _postgres: postgres,
            url,
            repo,
        }
    }

    async fn reconnect(&self) -> PostgresRepository {
        PostgresRepository::connect(PostgresSettings::builder().dsn(self.url.as_str()).build())
            .await
            .expect("reconnect")
    }
}

#[tokio::test]
async fn add_and_get_active_record() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .add("qwerty", "https://avito.ru", "u1")
        .await
        .unwrap();

    assert_eq!(fixture.repo.get("qwerty").await.unwrap(), "https://avito.ru");
}

#[tokio::test]
async fn add_conflicts_with_existing_id() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .add("id1", "https://example.com", "u1")
        .await
        .unwrap();

    let err = fixture
        .repo
        .add("id2", "https://example.com", "u2")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        StorageError::Conflict {
            existing_id: "id1".to_string(),
            url: "https://example.com".to_string(),
        }
    );
}

#[tokio::test]
async fn concurrent_adds_have_one_winner() {
    let fixture = Fixture::start().await;
    let repo = Arc::new(fixture.repo.clone());
    let mut handles = vec![];

    for i in 0..8 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            let id = format!("id{i}");
            repo.add(&id, "https://example.com", "u1").await.map(|_| id)
        }));
    }

    let mut winners = vec![];
    let mut existing = HashSet::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(id) => winners.push(id),
            Err(StorageError::Conflict { existing_id, .. }) => {
                existing.insert(existing_id);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert!(existing.iter().all(|id| *id == winners[0]));
}

#[tokio::test]
async fn get_distinguishes_missing_and_deleted() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add("a", "https://a.example", "u1")
        .await
        .unwrap();
    fixture
        .repo
        .add("b", "https://b.example", "u1")
        .await
        .unwrap();

    fixture
        .repo
        .delete(&[DeletionRequest::new("u1", ["a"])])
        .await
        .unwrap();

    assert!(matches!(
        fixture.repo.get("a").await.unwrap_err(),
        StorageError::Deleted(_)
    ));
    assert!(matches!(
        fixture.repo.get("never").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert_eq!(fixture.repo.get("b").await.unwrap(), "https://b.example");

    let listed = fixture.repo.list("u1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "b");
}

#[tokio::test]
async fn delete_ignores_other_owners() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add("a", "https://a.example", "u1")
        .await
        .unwrap();

    fixture
        .repo
        .delete(&[DeletionRequest::new("u2", ["a"])])
        .await
        .unwrap();

    assert_eq!(fixture.repo.get("a").await.unwrap(), "https://a.example");
    assert!(fixture.repo.list("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_url_can_be_shortened_again() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add("a", "https://a.example", "u1")
        .await
        .unwrap();
    fixture
        .repo
        .delete(&[DeletionRequest::new("u1", ["a"])])
        .await
        .unwrap();

    fixture
        .repo
        .add("b", "https://a.example", "u1")
        .await
        .unwrap();

    assert_eq!(fixture.repo.get("b").await.unwrap(), "https://a.example");
}

#[tokio::test]
async fn add_batch_is_all_or_nothing() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add("taken", "https://taken.example", "u1")
        .await
        .unwrap();

    let err = fixture
        .repo
        .add_batch(
            &[
                ShortenedUrl::new("x", "https://x.example"),
                ShortenedUrl::new("taken", "https://y.example"),
            ],
            "u2",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Query(_)));
    assert!(matches!(
        fixture.repo.get("x").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert!(fixture.repo.list("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn records_survive_reconnect() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add("qwerty", "https://avito.ru", "u1")
        .await
        .unwrap();
    fixture.repo.close().await.unwrap();

    let reopened = fixture.reconnect().await;

    assert!(reopened.ping().await);
    assert_eq!(reopened.get("qwerty").await.unwrap(), "https://avito.ru");
}

#[tokio::test]
async fn ping_fails_after_close() {
    let fixture = Fixture::start().await;
    assert!(fixture.repo.ping().await);

    fixture.repo.close().await.unwrap();

    assert!(!fixture.repo.ping().await);
}

#[tokio::test]
async fn calls_past_the_deadline_time_out() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add("locked", "https://locked.example", "u1")
        .await
        .unwrap();
    let impatient =
        PostgresRepository::new(fixture.repo.pool().clone(), Duration::from_millis(200));

    // Hold the row lock so the soft delete has to wait for it.
    let mut tx = fixture.repo.pool().begin().await.unwrap();
    sqlx::query("SELECT id FROM urls WHERE id = $1 FOR UPDATE")
        .bind("locked")
        .fetch_one(&mut *tx)
        .await
        .unwrap();

    let err = impatient
        .delete(&[DeletionRequest::new("u1", ["locked"])])
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Timeout(_)), "{err}");
    tx.rollback().await.unwrap();
    assert_eq!(
        fixture.repo.get("locked").await.unwrap(),
        "https://locked.example"
    );
}
