use std::sync::Arc;
use std::time::Duration;

use cfgsync::common::error::{SyncError, SyncResult};
use cfgsync::remote::repo_mem::BackendCall;
use cfgsync::remote::MemoryConfigBackend;
use cfgsync::session::service::TOKEN_KEY;
use cfgsync::store::{ConfigData, FsLocalStorage, LocalStorage, MemoryStorage};
use cfgsync::{ConfigDomain, GatePhase, SyncEngine, User, UserResolver};
use serde_json::json;
use tokio::time::sleep;

const DEBOUNCE: Duration = Duration::from_millis(2000);

struct TokenResolver;

#[async_trait::async_trait]
impl UserResolver for TokenResolver {
    async fn resolve(&self, token: &str) -> SyncResult<User> {
        if token == "expired" {
            return Err(SyncError::Auth("token expired".into()));
        }
        Ok(User {
            id: format!("user-{token}"),
            email: format!("{token}@example.com"),
            username: token.to_string(),
            role: "user".to_string(),
        })
    }
}

fn data(value: serde_json::Value) -> ConfigData {
    value.as_object().cloned().unwrap()
}

fn engine_with(storage: Arc<dyn LocalStorage>, backend: &Arc<MemoryConfigBackend>) -> SyncEngine {
    let mut engine =
        SyncEngine::with_parts(storage, backend.clone(), Arc::new(TokenResolver), DEBOUNCE);
    engine.start().unwrap();
    engine
}

fn engine(backend: &Arc<MemoryConfigBackend>) -> SyncEngine {
    engine_with(Arc::new(MemoryStorage::new()), backend)
}

fn phase(engine: &SyncEngine) -> GatePhase {
    engine.orchestrator().unwrap().gate_phase()
}

/// Let spawned tasks run without crossing a debounce window.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

async fn wait_for_phase(engine: &SyncEngine, wanted: GatePhase) {
    for _ in 0..1000 {
        if phase(engine) == wanted {
            return;
        }
        settle().await;
    }
    panic!("gate never reached {wanted:?}, stuck at {:?}", phase(engine));
}

async fn login(engine: &SyncEngine, token: &str) {
    engine.session().login(token);
    engine.session().fetch_user().await.unwrap();
    wait_for_phase(engine, GatePhase::Loaded).await;
}

#[tokio::test(start_paused = true)]
async fn remote_value_wins_over_defaults_and_racing_edits() {
    let backend = Arc::new(MemoryConfigBackend::new());
    backend.seed("user-alice", ConfigDomain::Training, data(json!({"epochs": 80})));
    backend.set_latency(Duration::from_millis(100));
    let engine = engine(&backend);
    assert_eq!(engine.training().value().epochs, 50);

    engine.session().login("alice");
    engine.session().fetch_user().await.unwrap();
    // Edit races in right after login, before the session change is even observed.
    engine.training().set(json!({"epochs": 51})).unwrap();
    settle().await;
    assert_eq!(phase(&engine), GatePhase::Loading);

    // And another one while the load is in flight.
    engine.training().set(json!({"epochs": 52})).unwrap();
    assert!(!engine.orchestrator().unwrap().push_pending());

    wait_for_phase(&engine, GatePhase::Loaded).await;
    assert_eq!(engine.training().value().epochs, 80);

    sleep(Duration::from_secs(5)).await;
    assert!(backend.upserts_for(ConfigDomain::Training).is_empty());
    assert_eq!(
        backend.row("user-alice", ConfigDomain::Training).unwrap().config_data["epochs"],
        json!(80)
    );
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_collapses_into_one_push_per_domain() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let engine = engine(&backend);
    login(&engine, "alice").await;

    for epochs in 100..105 {
        engine.training().set(json!({"epochs": epochs})).unwrap();
        sleep(Duration::from_millis(100)).await;
    }
    assert!(engine.orchestrator().unwrap().push_pending());
    assert!(backend.upserts_for(ConfigDomain::Training).is_empty());

    sleep(DEBOUNCE).await;
    let training = backend.upserts_for(ConfigDomain::Training);
    assert_eq!(training.len(), 1);
    assert_eq!(training[0]["epochs"], json!(104));
    assert_eq!(backend.upserts_for(ConfigDomain::Model).len(), 1);
    assert!(!engine.orchestrator().unwrap().push_pending());
}

#[tokio::test(start_paused = true)]
async fn edits_to_different_domains_share_one_timer() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let engine = engine(&backend);
    login(&engine, "alice").await;

    engine.training().set(json!({"lr": 0.01})).unwrap();
    sleep(Duration::from_millis(1500)).await;
    engine.model().set_selected_model("auto-mamformer").unwrap();
    sleep(Duration::from_millis(1500)).await;
    // The model edit restarted the shared timer, so nothing went out yet.
    assert!(backend.upserts_for(ConfigDomain::Training).is_empty());

    sleep(Duration::from_millis(600)).await;
    assert_eq!(backend.upserts_for(ConfigDomain::Training).len(), 1);
    let model = backend.upserts_for(ConfigDomain::Model);
    assert_eq!(model, vec![data(json!({"selectedModel": "auto-mamformer"}))]);
}

#[tokio::test(start_paused = true)]
async fn gate_resets_for_the_next_user() {
    let backend = Arc::new(MemoryConfigBackend::new());
    backend.seed("user-bob", ConfigDomain::Model, data(json!({"selectedModel": "auto-mamformer"})));
    let engine = engine(&backend);
    login(&engine, "alice").await;

    engine.session().logout();
    settle().await;
    assert_eq!(phase(&engine), GatePhase::Idle);

    // Logged out: local edits stay local.
    engine.training().set(json!({"epochs": 9})).unwrap();
    assert!(!engine.orchestrator().unwrap().push_pending());

    backend.clear_calls();
    login(&engine, "bob").await;
    let calls = backend.calls();
    for domain in [ConfigDomain::Training, ConfigDomain::Model] {
        assert!(calls.contains(&BackendCall::SelectOne {
            user_id: "user-bob".to_string(),
            domain,
        }));
    }
    assert_eq!(engine.model().value().selected_model, "auto-mamformer");
    // Bob had no training row, so the local value stays authoritative.
    assert_eq!(engine.training().value().epochs, 9);
    assert!(calls.iter().all(|call| !matches!(call, BackendCall::Upsert { .. })));
}

#[tokio::test(start_paused = true)]
async fn previous_users_late_load_never_reaches_next_user() {
    let backend = Arc::new(MemoryConfigBackend::new());
    backend.seed("user-alice", ConfigDomain::Training, data(json!({"epochs": 80})));
    backend.set_latency(Duration::from_millis(100));
    let engine = engine(&backend);

    engine.session().login("alice");
    engine.session().fetch_user().await.unwrap();
    settle().await;
    assert_eq!(phase(&engine), GatePhase::Loading);

    // Switch users while alice's load is still on the wire.
    engine.session().logout();
    engine.session().login("bob");
    engine.session().fetch_user().await.unwrap();
    wait_for_phase(&engine, GatePhase::Loaded).await;
    sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.training().value().epochs, 50);

    engine.training().set(json!({"lr": 0.01})).unwrap();
    sleep(DEBOUNCE + Duration::from_millis(200)).await;
    let row = backend.row("user-bob", ConfigDomain::Training).unwrap();
    assert_eq!(row.config_data["epochs"], json!(50));
    assert_eq!(row.config_data["lr"], json!(0.01));
}

#[tokio::test(start_paused = true)]
async fn logout_cancels_pending_push() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let engine = engine(&backend);
    login(&engine, "alice").await;

    engine.training().set(json!({"epochs": 70})).unwrap();
    assert!(engine.orchestrator().unwrap().push_pending());

    engine.session().logout();
    settle().await;
    assert!(!engine.orchestrator().unwrap().push_pending());

    sleep(Duration::from_secs(5)).await;
    assert!(backend.upserts_for(ConfigDomain::Training).is_empty());
    // The local value survives logout.
    assert_eq!(engine.training().value().epochs, 70);
}

#[tokio::test(start_paused = true)]
async fn failed_model_load_does_not_block_training_load() {
    let backend = Arc::new(MemoryConfigBackend::new());
    backend.seed("user-alice", ConfigDomain::Training, data(json!({"epochs": 80})));
    backend.seed("user-alice", ConfigDomain::Model, data(json!({"selectedModel": "auto-mamformer"})));
    backend.fail_domain(ConfigDomain::Model);
    let engine = engine(&backend);

    login(&engine, "alice").await;
    assert_eq!(engine.training().value().epochs, 80);
    assert_eq!(engine.model().value().selected_model, "mamformer");
    assert!(engine.status().training.last_sync_time.is_some());
    assert!(engine.status().model.last_sync_time.is_none());
}

#[tokio::test(start_paused = true)]
async fn manual_sync_pushes_immediately() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let engine = engine(&backend);
    assert!(!engine.manual_sync().await);
    assert!(backend.calls().is_empty());

    login(&engine, "alice").await;
    engine.training().set(json!({"target_col": "load"})).unwrap();
    assert!(engine.manual_sync().await);
    let row = backend.row("user-alice", ConfigDomain::Training).unwrap();
    assert_eq!(row.config_data["target_col"], json!("load"));
    assert!(backend.row("user-alice", ConfigDomain::Model).is_some());

    backend.fail_domain(ConfigDomain::Model);
    assert!(!engine.manual_sync().await);
    assert!(!engine.status().training.is_syncing);

    backend.heal_domain(ConfigDomain::Model);
    assert!(engine.manual_sync().await);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_push() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let mut engine = engine(&backend);
    login(&engine, "alice").await;

    engine.training().set(json!({"epochs": 11})).unwrap();
    engine.shutdown();
    sleep(Duration::from_secs(5)).await;
    assert!(backend.upserts_for(ConfigDomain::Training).is_empty());
}

#[tokio::test(start_paused = true)]
async fn in_flight_push_completes_after_logout() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let engine = engine(&backend);
    login(&engine, "alice").await;
    backend.set_latency(Duration::from_millis(500));

    engine.training().set(json!({"epochs": 12})).unwrap();
    sleep(DEBOUNCE + Duration::from_millis(100)).await;
    assert!(engine.status().training.is_syncing);

    engine.session().logout();
    sleep(Duration::from_secs(1)).await;
    let row = backend.row("user-alice", ConfigDomain::Training).unwrap();
    assert_eq!(row.config_data["epochs"], json!(12));
    assert!(!engine.status().training.is_syncing);
}

#[tokio::test(start_paused = true)]
async fn missing_rows_keep_defaults_until_first_edit() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let engine = engine(&backend);
    login(&engine, "alice").await;
    assert_eq!(engine.training().value().epochs, 50);
    assert_eq!(backend.row_count(), 0);

    engine.training().set(json!({"epochs": 60})).unwrap();
    sleep(DEBOUNCE + Duration::from_millis(10)).await;
    assert_eq!(backend.row_count(), 2);
    assert_eq!(
        backend.row("user-alice", ConfigDomain::Training).unwrap().config_data["epochs"],
        json!(60)
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_token_never_loads() {
    let backend = Arc::new(MemoryConfigBackend::new());
    let engine = engine(&backend);

    engine.session().login("expired");
    assert!(engine.session().fetch_user().await.is_none());
    settle().await;
    assert!(!engine.session().is_authenticated());
    assert_eq!(phase(&engine), GatePhase::Idle);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn restart_restores_local_values_and_token() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MemoryConfigBackend::new());

    {
        let storage = Arc::new(FsLocalStorage::at(dir.path()));
        let engine = engine_with(storage, &backend);
        engine.session().login("alice");
        engine.training().set(json!({"epochs": 77, "selectedDatasetId": "ds-1"})).unwrap();
    }

    let storage = Arc::new(FsLocalStorage::at(dir.path()));
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("alice"));
    let engine = engine_with(storage, &backend);
    assert!(engine.session().is_authenticated());
    let training = engine.training().value();
    assert_eq!(training.epochs, 77);
    assert_eq!(training.selected_dataset_id, "ds-1");

    // The restored session still needs its user before the initial load runs.
    settle().await;
    assert_eq!(phase(&engine), GatePhase::Idle);
    engine.session().fetch_user().await.unwrap();
    wait_for_phase(&engine, GatePhase::Loaded).await;
}
