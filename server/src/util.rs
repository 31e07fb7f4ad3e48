use {
    crate::Config,
    anyhow::Result,
    fs_err::OpenOptions,
    sqlx::PgPool,
    std::{io, sync::Mutex},
    tracing_subscriber::{EnvFilter, fmt, prelude::*},
};

#[inline]
pub async fn migrate(db: &PgPool) -> Result<()> {
    sqlx::migrate!().run(db).await?;
    Ok(())
}

/// `RUST_LOG` takes precedence over the configured filter.
#[inline]
pub fn init_logging(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)?,
    };
    let registry = tracing_subscriber::registry().with(filter);
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        registry
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).try_init()?;
    }
    Ok(())
}
