//! Tracing setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "g3=info,g3_cli=info",
        1 => "g3=debug,g3_cli=debug",
        _ => "g3=trace,g3_cli=trace",
    }
}

/// Install the global subscriber; logs go to stderr so stdout stays parseable
pub fn init(verbose: u8) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
