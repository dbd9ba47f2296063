//! PostgreSQL 存储集成测试
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test --test postgres_store_test -- --ignored
//! ```

use std::sync::Arc;

use adoption_shared::config::SeedCode;
use adoption_shared::database::Database;
use adoption_shared::test_utils::{test_code, test_database_config, test_owner_id};
use futures::future::join_all;
use tree_adoption::repository::MIGRATOR;
use tree_adoption::{
    AdoptionError, AdoptionLedger, AdoptionRecord, CodeRegistry, ConsumeToken, PgAdoptionLedger,
    PgCodeRegistry, PgRedemptionStore, RedeemRequest, RedemptionService, RedemptionStore,
    SampledTree, SeededMetricSampler, TreeLocation, TreeMetrics,
};

async fn setup() -> Database {
    let db = Database::connect(&test_database_config())
        .await
        .expect("数据库连接失败");
    MIGRATOR.run(db.pool()).await.expect("数据库迁移失败");
    db
}

fn record(owner: &str, token: &ConsumeToken) -> AdoptionRecord {
    AdoptionRecord::from_redemption(
        owner,
        "Oak1",
        token,
        SampledTree {
            species: "Quercia".to_string(),
            location: TreeLocation::new(41.9028, 12.4964, "Italia"),
            metrics: TreeMetrics::new(1.0, 2.0, 3.0, 0.0),
        },
    )
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_consume_and_release() {
    let db = setup().await;
    let registry = PgCodeRegistry::new(db.pool().clone());
    let code = test_code();

    assert_eq!(registry.provision(&[SeedCode::new(&code, None)]).await.unwrap(), 1);
    assert_eq!(registry.provision(&[SeedCode::new(&code, None)]).await.unwrap(), 0);

    let token = registry.try_consume(&code.to_lowercase()).await.unwrap();
    assert_eq!(token.code, code);
    assert!(registry.lookup(&code).await.unwrap().used);

    let again = registry.try_consume(&code).await;
    assert!(matches!(again, Err(AdoptionError::AlreadyRedeemed(_))));

    let stranger = ConsumeToken::issue(&code, None);
    assert!(!registry.release(&stranger).await.unwrap());
    assert!(registry.release(&token).await.unwrap());
    assert!(!registry.lookup(&code).await.unwrap().used);

    let unknown = registry.try_consume("NEVER-PROVISIONED").await;
    assert!(matches!(unknown, Err(AdoptionError::InvalidCode(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "需要 PostgreSQL"]
async fn test_concurrent_consume_single_winner() {
    let db = setup().await;
    let registry = Arc::new(PgCodeRegistry::new(db.pool().clone()));
    let code = test_code();
    registry.provision(&[SeedCode::new(&code, None)]).await.unwrap();

    let tasks = (0..16).map(|_| {
        let registry = registry.clone();
        let code = code.clone();
        tokio::spawn(async move { registry.try_consume(&code).await })
    });

    let winners = join_all(tasks)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_ledger_order_and_uniqueness() {
    let db = setup().await;
    let ledger = PgAdoptionLedger::new(db.pool().clone());
    let owner = test_owner_id();

    let first = record(&owner, &ConsumeToken::issue(test_code(), None));
    let second = record(&owner, &ConsumeToken::issue(test_code(), None));
    ledger.add(&first).await.unwrap();
    ledger.add(&second).await.unwrap();

    let records = ledger.get(&owner).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, first.id);
    assert_eq!(records[1].id, second.id);
    assert_eq!(records[0].metrics, first.metrics);
    assert_eq!(ledger.count(&owner).await.unwrap(), 2);

    let found = ledger.find(second.id).await.unwrap().unwrap();
    assert_eq!(found.location, second.location);

    // 同一兑换码不能产生第二条记录
    let duplicate = AdoptionRecord {
        id: uuid::Uuid::now_v7(),
        ..first.clone()
    };
    let result = ledger.add(&duplicate).await;
    assert!(matches!(result, Err(AdoptionError::AlreadyRedeemed(_))));

    assert!(ledger.get(&test_owner_id()).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_redeem_end_to_end() {
    let db = setup().await;
    let registry = Arc::new(PgCodeRegistry::new(db.pool().clone()));
    let ledger = Arc::new(PgAdoptionLedger::new(db.pool().clone()));
    let code = test_code();
    registry
        .provision(&[SeedCode::new(&code, Some("Olivo"))])
        .await
        .unwrap();

    let service = RedemptionService::new(
        registry.clone(),
        ledger.clone(),
        Arc::new(SeededMetricSampler::with_seed(1)),
    );
    let owner = test_owner_id();

    let record = service
        .redeem(RedeemRequest::new(code.to_uppercase(), "Oak1", &owner))
        .await
        .unwrap();
    assert_eq!(record.code, code);
    assert_eq!(record.species, "Olivo");

    let second = service
        .redeem(RedeemRequest::new(&code, "Oak2", test_owner_id()))
        .await;
    assert!(matches!(second, Err(AdoptionError::AlreadyRedeemed(_))));
    assert_eq!(ledger.count(&owner).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_transactional_redeem() {
    let db = setup().await;
    let registry = Arc::new(PgCodeRegistry::new(db.pool().clone()));
    let ledger = Arc::new(PgAdoptionLedger::new(db.pool().clone()));
    let code = test_code();
    registry.provision(&[SeedCode::new(&code, None)]).await.unwrap();

    let service = RedemptionService::new(
        registry.clone(),
        ledger.clone(),
        Arc::new(SeededMetricSampler::with_seed(1)),
    )
    .with_store(Arc::new(PgRedemptionStore::new(db.pool().clone())));
    let owner = test_owner_id();

    let record = service
        .redeem(RedeemRequest::new(&code, "Oak1", &owner))
        .await
        .unwrap();
    assert!(registry.lookup(&code).await.unwrap().used);
    assert_eq!(
        ledger.find_by_code(&code).await.unwrap().map(|r| r.id),
        Some(record.id)
    );

    let again = service
        .redeem(RedeemRequest::new(&code, "Oak2", test_owner_id()))
        .await;
    assert!(matches!(again, Err(AdoptionError::AlreadyRedeemed(_))));
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_failed_build_rolls_back_consume() {
    let db = setup().await;
    let registry = PgCodeRegistry::new(db.pool().clone());
    let ledger = PgAdoptionLedger::new(db.pool().clone());
    let store = PgRedemptionStore::new(db.pool().clone());
    let code = test_code();
    registry.provision(&[SeedCode::new(&code, None)]).await.unwrap();

    let result = store
        .redeem(
            &code.to_uppercase(),
            Box::new(|_: &ConsumeToken| Err(AdoptionError::Internal("采样失败".to_string()))),
        )
        .await;
    assert!(matches!(result, Err(AdoptionError::Internal(_))));

    assert!(!registry.lookup(&code).await.unwrap().used);
    assert!(ledger.find_by_code(&code).await.unwrap().is_none());

    let unknown = store
        .redeem(
            "NEVER-PROVISIONED",
            Box::new(|token: &ConsumeToken| Ok(record("nobody", token))),
        )
        .await;
    assert!(matches!(unknown, Err(AdoptionError::InvalidCode(_))));
}
