//! Logging system demonstration
//!
//! Run with:
//! ```bash
//! cargo run -p core-runtime --example logging_demo
//! cargo run -p core-runtime --example logging_demo -- json
//! cargo run -p core-runtime --example logging_demo -- compact "core_sync=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, redact_url, LogFormat, LoggingConfig};
use std::env;
use tracing::{debug, info, instrument, span, warn, Level};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_spans(true)
        .with_target(true);

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("failed to initialize logging: {e}");
        return;
    }

    info!(format = ?format, "Logging initialized");

    album_fetch(37.0, -122.0).await;
    secrets();
}

#[instrument]
async fn album_fetch(latitude: f64, longitude: f64) {
    let url = "https://api.flickr.com/services/rest/?method=flickr.photos.search\
               &api_key=0123456789abcdef&bbox=-123,36,-121,38&page=1";
    debug!(url = %redact_url(url), "Requesting search page");

    {
        let commit = span!(Level::DEBUG, "replace_photos", photo_count = 21);
        let _entered = commit.enter();
        info!("Album replaced");
    }

    warn!(pin_id = "3f1c", message = "HTTP status 503", "Album fetch failed");
}

fn secrets() {
    info!(
        api_key = %redact_if_sensitive("api_key", "0123456789abcdef"),
        latitude = %redact_if_sensitive("latitude", "37.0"),
        "Only credential fields are masked"
    );
}
