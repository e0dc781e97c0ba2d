use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Logs go to stderr so stdout carries only the report.
pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Loads `.env` from the working directory. A missing file is not an error.
pub(crate) fn load_dotenv() -> Option<dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(_) => None,
        Err(error) if error.not_found() => None,
        Err(error) => Some(error),
    }
}
