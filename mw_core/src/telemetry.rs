//! ABOUTME: Tracing subscriber setup for pretty or JSON output
//! ABOUTME: Installs an env-filtered registry exactly once per process

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Output style of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to pretty output
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Initialize tracing on stderr - safe to call multiple times
pub fn init_tracing(format: LogFormat, service: &str) {
    INIT.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                    .with(env_filter)
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                    .with(env_filter)
                    .init();
            }
        }

        tracing::info!(service = %service, "Tracing initialized");
    });
}
