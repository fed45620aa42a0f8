use snapscan::engine::initialize;
use snapscan::error::Error;

// Points the model fetch at a port nothing listens on, so a missing
// model fails fast instead of reaching the network.
fn block_model_fetch() {
    unsafe { std::env::set_var("SNAPSCAN_MODEL_URL", "http://127.0.0.1:9/yolov8n.rten") };
}

#[test]
fn initialize_on_unfetchable_model_fails_consistently() -> anyhow::Result<()> {
    block_model_fetch();
    let dir = tempfile::TempDir::new()?;
    let model_path = dir.path().join("models").join("yolov8n.rten");

    let first = initialize(&model_path);
    let second = initialize(&model_path);
    assert!(matches!(first, Err(Error::ModelUnavailable { .. })));
    assert!(matches!(second, Err(Error::ModelUnavailable { .. })));

    // A failed fetch never leaves a handle cached or a truncated file
    // behind for a later call to load.
    assert!(!model_path.exists());
    assert!(!model_path.with_extension("partial").exists());
    Ok(())
}
