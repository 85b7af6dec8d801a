//! # RadScope
//!
//! Console front end for the RadScope telemetry core.
//!
//! Connects to the configured MQTT broker, drives the ingestion pipeline,
//! and (optionally) runs an auto-started logging session. The dashboard UI
//! consumes the same library; this binary is the headless equivalent.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging (stderr + daily-rotated file via tracing-appender)
//!    - Load configuration, falling back to defaults when the file is absent
//!    - Wire telemetry state, ingestion queue, and MQTT connection
//! 2. **Main loop**
//!    - Periodic status line with connection state and current dose rate
//!    - Ctrl+C for graceful shutdown
//! 3. **Graceful shutdown**
//!    - Stop an armed session (persisting its stop time)
//!    - Tear down the MQTT connection

use std::sync::Arc;

use anyhow::Result;
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use radscope::config::Config;
use radscope::session::{JsonlSessionStore, SessionLogger};
use radscope::storage::DoseRateLog;
use radscope::telemetry::{ingest_channel, telemetry_state};
use radscope::transport::MqttConnection;

/// Default configuration file path, overridable by the first CLI argument
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Seconds between status log lines
const STATUS_INTERVAL_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging: stderr plus a daily-rotated file
    let file_appender = tracing_appender::rolling::daily("logs", "radscope.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("RadScope v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?;

    // Telemetry fan-out: single writer (the ingestor), many readers
    let (state_writer, telemetry) = telemetry_state(
        config.telemetry.history_len,
        config.telemetry.recent_len,
    );
    let (readings, ingestor) = ingest_channel(state_writer);
    tokio::spawn(ingestor.run());

    let mut connection = MqttConnection::connect(&config.mqtt, readings);
    let status = connection.status();
    let mut status_events = connection.status();

    let logger = Arc::new(SessionLogger::new(
        Arc::new(JsonlSessionStore::new(
            &config.storage.base_dir,
            config.storage.utc_offset_minutes,
        )),
        None,
        telemetry.clone(),
        DoseRateLog::new(&config.storage.base_dir, config.storage.utc_offset_minutes),
    ));

    if let Some(name) = &config.session.autostart_name {
        match logger
            .start_session(
                name,
                config.session.default_limit_hours,
                config.session.default_interval_secs,
            )
            .await
        {
            Ok(id) => info!("auto-started logging session {} ({:?})", id, name),
            Err(e) => warn!("could not auto-start session: {}", e),
        }
    }

    let mut status_ticks = interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = status_ticks.tick() => {
                let current = telemetry.current();
                info!(
                    "state={:?} dose_rate={:.3} uSv/h cps={:.1} history={}",
                    *status.borrow(),
                    current.dose_rate,
                    current.cps,
                    telemetry.history().len(),
                );
            }

            changed = status_events.changed() => {
                if changed.is_ok() {
                    info!("connection state: {:?}", *status_events.borrow_and_update());
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if logger.is_armed().await {
        if let Err(e) = logger.stop_session().await {
            warn!("failed to stop session during shutdown: {}", e);
        }
    }
    connection.disconnect().await;

    Ok(())
}
