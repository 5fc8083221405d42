use cfgsync::common::log;
use cfgsync::store::SyncIndicator;
use cfgsync::{AppCfg, GatePhase, SyncCode, SyncEngine};
use serde_json::json;

fn cfg_in(dir: &tempfile::TempDir) -> AppCfg {
    AppCfg {
        data_root: dir.path().display().to_string(),
        log_filter: "cfgsync=debug".to_string(),
        ..AppCfg::default()
    }
}

#[test]
fn start_needs_a_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = SyncEngine::from_cfg(&cfg_in(&dir));
    let err = engine.start().unwrap_err();
    assert_eq!(err.code(), SyncCode::Internal);
    assert!(engine.orchestrator().is_none());
}

#[tokio::test(start_paused = true)]
async fn configured_engine_runs_locally_while_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cfg_in(&dir);
    log::init(&cfg);
    log::init(&cfg);

    let mut engine = SyncEngine::from_cfg(&cfg);
    engine.start().unwrap();
    engine.start().unwrap();
    assert_eq!(engine.orchestrator().unwrap().gate_phase(), GatePhase::Idle);

    engine.training().set(json!({"batch_size": 64})).unwrap();
    engine.model().set_selected_model("auto-mamformer").unwrap();
    assert_eq!(engine.model().selected_model_name(), "Auto-Mamformer");
    assert!(!engine.manual_sync().await);

    let status = engine.status();
    assert_eq!(status.training.indicator(), SyncIndicator::LocalOnly);
    assert_eq!(status.model.indicator(), SyncIndicator::LocalOnly);
    assert!(cfg.local_dir().join("training-config-storage.json").exists());

    engine.shutdown();
    assert!(engine.orchestrator().is_none());

    let reopened = SyncEngine::from_cfg(&cfg);
    assert_eq!(reopened.training().value().batch_size, 64);
    assert_eq!(reopened.model().value().selected_model, "auto-mamformer");
}
