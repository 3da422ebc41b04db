//! Tracing subscriber setup for the `tracescope` binary.

use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber. `RUST_LOG` wins over `verbose` when set.
pub fn try_init_tracing_subscriber(verbose: u8) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var(EnvFilter::DEFAULT_ENV)
        .map(EnvFilter::new)
        .unwrap_or_else(|_| {
            let level = match verbose {
                0 => Level::WARN,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            };
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), level))
        });

    tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish()
        .try_init()?;
    Ok(())
}
