mod common;

use common::{Fixture, ScriptedLoader, ScriptedModel};
use leaf_guard::models::LoadState;
use leaf_guard::{LeafGuardError, ModelId, ModelStore};
use std::sync::Arc;
use std::time::Duration;

fn scripted_loader() -> ScriptedLoader {
    ScriptedLoader::new(
        ScriptedModel::new(&[5.0, 0.1]),
        ScriptedModel::new(&[0.1, 3.0, 0.2, 0.3]),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_load() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader().with_delay(Duration::from_millis(150)));
    let store = Arc::new(ModelStore::new(&fixture.config, loader.clone()));

    let callers: Vec<_> = (0..10)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.ensure_loaded().await })
        })
        .collect();

    for caller in callers {
        caller.await.unwrap().unwrap();
    }

    assert_eq!(loader.loads(ModelId::Leaf), 1);
    assert_eq!(loader.loads(ModelId::Disease), 1);
    assert!(store.is_ready());
    assert_eq!(store.state(ModelId::Leaf), LoadState::Ready);
    assert_eq!(store.state(ModelId::Disease), LoadState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_observe_the_same_failure() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader().with_delay(Duration::from_millis(150)));
    loader.set_failing(true);
    let store = Arc::new(ModelStore::new(&fixture.config, loader.clone()));

    let callers: Vec<_> = (0..10)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.ensure_model_loaded(ModelId::Leaf).await })
        })
        .collect();

    for caller in callers {
        let result = caller.await.unwrap();
        assert!(matches!(
            result,
            Err(LeafGuardError::ModelLoad {
                model: ModelId::Leaf,
                ..
            })
        ));
    }

    assert_eq!(loader.loads(ModelId::Leaf), 1);
    assert_eq!(store.state(ModelId::Leaf), LoadState::Failed);
}

#[tokio::test]
async fn handles_are_absent_until_ready() {
    let fixture = Fixture::new();
    let store = ModelStore::new(&fixture.config, Arc::new(scripted_loader()));

    assert_eq!(store.state(ModelId::Leaf), LoadState::Unloaded);
    assert!(store.handle(ModelId::Leaf).is_none());
    assert!(store.handles().is_none());

    store.ensure_model_loaded(ModelId::Leaf).await.unwrap();
    assert!(store.handle(ModelId::Leaf).is_some());
    // the disease model is still unloaded
    assert!(store.handles().is_none());

    store.ensure_loaded().await.unwrap();
    assert!(store.handles().is_some());
}

#[tokio::test]
async fn ready_models_are_not_reloaded() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader());
    let store = ModelStore::new(&fixture.config, loader.clone());

    store.ensure_loaded().await.unwrap();
    store.ensure_loaded().await.unwrap();
    store.ensure_model_loaded(ModelId::Disease).await.unwrap();

    assert_eq!(loader.loads(ModelId::Leaf), 1);
    assert_eq!(loader.loads(ModelId::Disease), 1);
}

#[tokio::test]
async fn failed_load_can_be_retried() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader());
    loader.set_failing(true);
    let store = ModelStore::new(&fixture.config, loader.clone());

    assert!(store.ensure_loaded().await.is_err());
    assert_eq!(store.state(ModelId::Leaf), LoadState::Failed);
    assert!(store.handle(ModelId::Leaf).is_none());

    loader.set_failing(false);
    store.ensure_loaded().await.unwrap();

    assert_eq!(loader.loads(ModelId::Leaf), 2);
    assert_eq!(store.state(ModelId::Leaf), LoadState::Ready);
}

#[tokio::test]
async fn missing_asset_reports_model_id() {
    let fixture = Fixture::without_assets();
    let loader = Arc::new(scripted_loader());
    let store = ModelStore::new(&fixture.config, loader.clone());

    let err = store.ensure_model_loaded(ModelId::Disease).await.unwrap_err();
    match err {
        LeafGuardError::ModelLoad { model, reason } => {
            assert_eq!(model, ModelId::Disease);
            assert!(reason.contains("not found"), "unexpected reason: {}", reason);
        }
        other => panic!("expected ModelLoad, got {:?}", other),
    }
    assert_eq!(loader.loads(ModelId::Disease), 0);
}

#[tokio::test]
async fn loads_from_materialized_cache_copy() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader());
    let store = ModelStore::new(&fixture.config, loader.clone());

    store.ensure_loaded().await.unwrap();

    let cached = fixture
        .assets()
        .cached_path(fixture.config.asset_name(ModelId::Leaf));
    assert!(cached.is_file());
    assert!(loader.loaded_paths().contains(&cached));

    let stats = store.stats();
    assert!(stats.ready);
    assert!(stats.models.iter().all(|entry| entry.materialized));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_caller_does_not_start_a_second_load() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader().with_delay(Duration::from_millis(300)));
    let store = ModelStore::new(&fixture.config, loader.clone());

    let gave_up = tokio::time::timeout(
        Duration::from_millis(50),
        store.ensure_model_loaded(ModelId::Leaf),
    )
    .await;
    assert!(gave_up.is_err());
    assert_eq!(store.state(ModelId::Leaf), LoadState::Loading);

    // joins the attempt the first caller left behind
    store.ensure_model_loaded(ModelId::Leaf).await.unwrap();

    assert_eq!(loader.loads(ModelId::Leaf), 1);
    assert_eq!(store.load_attempts(), 1);
    assert_eq!(store.state(ModelId::Leaf), LoadState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_load_still_completes() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader().with_delay(Duration::from_millis(100)));
    let store = ModelStore::new(&fixture.config, loader.clone());

    let gave_up = tokio::time::timeout(Duration::from_millis(10), store.ensure_loaded()).await;
    assert!(gave_up.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(store.is_ready());
    assert!(store.handles().is_some());
    assert_eq!(loader.loads(ModelId::Leaf), 1);
    assert_eq!(loader.loads(ModelId::Disease), 1);
}

#[tokio::test]
async fn failed_load_reason_is_reported_in_stats() {
    let fixture = Fixture::new();
    let loader = Arc::new(scripted_loader());
    loader.set_failing(true);
    let store = ModelStore::new(&fixture.config, loader);

    assert!(store.ensure_model_loaded(ModelId::Leaf).await.is_err());

    let stats = store.stats();
    let leaf = stats
        .models
        .iter()
        .find(|entry| entry.model == ModelId::Leaf)
        .unwrap();
    assert_eq!(leaf.state, LoadState::Failed);
    assert!(leaf.last_error.as_deref().unwrap().contains("corrupted model file"));
}
