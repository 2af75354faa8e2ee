//! Repository invariants that only `PostgreSQL` can show: version conflicts,
//! normalization reruns and guarded domain updates.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use sqlx::PgPool;

use shopforge_api::db::{
    self, CustomDomainRepository, RepositoryError, SlotConfigurationRepository,
    StoreRepository, TranslationRepository, UserRepository,
};
use shopforge_api::models::{NewStore, Store};
use shopforge_core::history::SnapshotPolicy;
use shopforge_core::slots::{NewSlot, SlotConfiguration, SlotType};
use shopforge_core::translations;
use shopforge_core::{DomainName, SslStatus};

async fn pool() -> PgPool {
    let url = std::env::var("SHOPFORGE_TEST_DATABASE_URL").unwrap();
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../api/migrations").run(&pool).await.unwrap();
    pool
}

async fn store(pool: &PgPool) -> Store {
    let unique = uuid::Uuid::new_v4().simple().to_string();
    let owner = UserRepository::new(pool)
        .create(&format!("{unique}@example.com"), "Owner")
        .await
        .unwrap();
    StoreRepository::new(pool)
        .create(
            owner.id,
            &NewStore {
                slug: format!("s{unique}"),
                name: "Test store".to_owned(),
                default_language: None,
                settings: None,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "needs SHOPFORGE_TEST_DATABASE_URL"]
async fn test_stale_layout_save_conflicts() {
    let pool = pool().await;
    let store = store(&pool).await;
    let repo = SlotConfigurationRepository::new(&pool);
    let policy = SnapshotPolicy::default();

    let (layout, _) = SlotConfiguration::empty("home")
        .create_slot(NewSlot::new(SlotType::Container, None))
        .unwrap();

    let first = repo.save(store.id, &layout, policy, None, Some(0)).await.unwrap();
    assert_eq!(first.version, 1);

    // A second editor still holding version 0.
    let stale = repo.save(store.id, &layout, policy, None, Some(0)).await;
    assert!(matches!(stale, Err(RepositoryError::Conflict(_))));

    let second = repo.save(store.id, &layout, policy, None, Some(1)).await.unwrap();
    assert_eq!(second.version, 2);
}

#[tokio::test]
#[ignore = "needs SHOPFORGE_TEST_DATABASE_URL"]
async fn test_normalization_rerun_inserts_nothing() {
    let pool = pool().await;
    let store = store(&pool).await;
    sqlx::query("UPDATE shopforge.stores SET translations = $2 WHERE id = $1")
        .bind(store.id)
        .bind(serde_json::json!({
            "en": {"name": "Shop", "description": "Things"},
            "de": {"name": "Laden"},
        }))
        .execute(&pool)
        .await
        .unwrap();

    let target = translations::target("store_translations").unwrap();
    let repo = TranslationRepository::new(&pool);

    let dry = repo.normalize(target, true).await.unwrap();
    assert!(dry.rows_inserted >= 2);

    let first = repo.normalize(target, false).await.unwrap();
    assert_eq!(first.rows_inserted, dry.rows_inserted);

    let second = repo.normalize(target, false).await.unwrap();
    assert_eq!(second.rows_inserted, 0);
    assert_eq!(second.rows_skipped, first.rows_inserted + first.rows_skipped);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM shopforge.store_translations WHERE store_id = $1",
    )
    .bind(store.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rows, 2);
}

#[tokio::test]
#[ignore = "needs SHOPFORGE_TEST_DATABASE_URL"]
async fn test_domain_writes_are_guarded_by_state() {
    let pool = pool().await;
    let store = store(&pool).await;
    let repo = CustomDomainRepository::new(&pool);
    let name = DomainName::parse(&format!("{}.example.com", store.slug)).unwrap();
    let domain = repo.create(store.id, &name, "token", &[]).await.unwrap();

    // Still pending: it cannot become primary.
    assert!(matches!(
        repo.set_primary(store.id, domain.id).await,
        Err(RepositoryError::Conflict(_))
    ));

    // An SSL change decided against a state the row is no longer in.
    let mut outdated = domain.state();
    outdated.ssl = SslStatus::Failed;
    assert!(matches!(
        repo.set_ssl(store.id, domain.id, outdated, SslStatus::Pending, None)
            .await,
        Err(RepositoryError::Conflict(_))
    ));

    repo.delete(store.id, domain.id).await.unwrap();
    assert!(matches!(
        repo.set_primary(store.id, domain.id).await,
        Err(RepositoryError::NotFound)
    ));
}
