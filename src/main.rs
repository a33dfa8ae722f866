//! Adaptor daemon: configuration from the environment, events to the log
//!
//! The host supervisor normally owns the bus channels; run standalone,
//! this binary logs outward events and keeps the request channel open so
//! the session stays up until killed.

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use galvanize_radio::{BusEvent, RadioAdaptor, RadioConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RadioConfig::from_env()?;
    info!(
        port = %config.port,
        role = ?config.role,
        address = config.own_address,
        channel = config.channel,
        version = galvanize_radio::VERSION,
        "starting galvanize radio adaptor"
    );

    let (event_tx, mut event_rx) = mpsc::channel::<BusEvent>(64);
    let (_request_tx, request_rx) = mpsc::channel(64);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!(?event, "bus event");
        }
    });

    RadioAdaptor::new(config, event_tx, request_rx).run().await
}
