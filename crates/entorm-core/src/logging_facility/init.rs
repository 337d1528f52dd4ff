//! Logging initialization module

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogProfile {
    /// Human-readable output with SQL at debug level
    Development,
    /// JSON structured output for production
    Production,
    /// Test capture mode for deterministic testing
    Test,
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility
///
/// Call once at startup; later calls are ignored whatever their profile.
/// `RUST_LOG` overrides the default filter of each profile.
///
/// ```
/// use entorm_core::logging_facility::{init, LogProfile};
///
/// init(LogProfile::Development);
/// ```
pub fn init(profile: LogProfile) {
    INIT_ONCE.call_once(|| match profile {
        LogProfile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("entorm=debug")),
                )
                .init();
        }
        LogProfile::Production => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("entorm=info")),
                )
                .init();
        }
        LogProfile::Test => {
            // capture is installed separately via init_test_capture()
            tracing_subscriber::registry().init();
        }
    });
}
