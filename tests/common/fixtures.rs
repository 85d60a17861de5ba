//! Engine and entity fixtures shared across integration tests.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use overtab::core::{OvertabCore, RendererBridge};
use overtab::{Config, ContextId, MemoryStore, NullRenderer, TabEntity};

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Config with short timings so integration tests stay fast.
pub fn fast_config() -> Config {
    Config {
        debounce_window: Duration::from_millis(10),
        store_timeout: Duration::from_millis(200),
        consistency_interval: Duration::from_millis(50),
        snapshot_recovery_timeout: Duration::from_millis(100),
        renderer_ack_timeout: Duration::from_millis(50),
        ..Config::default()
    }
}

/// Engine context over the given store with a null renderer.
pub fn engine(context: &str, store: Arc<MemoryStore>) -> OvertabCore {
    engine_with_renderer(context, store, Arc::new(NullRenderer))
}

pub fn engine_with_renderer(
    context: &str,
    store: Arc<MemoryStore>,
    renderer: Arc<dyn RendererBridge>,
) -> OvertabCore {
    Lazy::force(&TRACING);
    OvertabCore::new(fast_config(), ContextId::new(context), store, renderer)
}

/// Entity with fixed geometry owned by the given context.
pub fn entity_owned_by(context: &str, title: &str) -> TabEntity {
    TabEntity::new(format!("https://example.com/{title}"), title)
        .with_position(100.0, 100.0)
        .with_size(400.0, 300.0)
        .with_owner(ContextId::new(context))
}

/// Give debounced persists and broadcast notifications time to land.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}
