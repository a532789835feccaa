/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
///
/// - `RUST_LOG=info` shows every committed transition
/// - `RUST_LOG=agri_trade=debug` adds staged writes and reads
///
/// Returns without touching the existing subscriber if one is already set,
/// so tests and demos may call it more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
