//! Observability - OpenTelemetry tracing setup shared across orchestrator
//! services (session manager, agent runtime, WS server, admin CLI).
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use observability::{ ObservabilityConfig, init };
//!
//! let config = ObservabilityConfig::new("orch-server")
//!     .with_otlp_endpoint("http://localhost:4317")
//!     .with_log_level("info");
//!
//! init(config)?;
//!
//! // Or initialize from environment variables
//! observability::init_from_env()?;
//!
//! tracing::info!("service started");
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_SERVICE_NAME` or `SERVICE_NAME` - Service name
//! - `OTEL_SERVICE_VERSION` or `SERVICE_VERSION` - Service version
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` or `TEMPO_ENDPOINT` - OTLP endpoint
//! - `OTEL_LOG_LEVEL` or `RUST_LOG` - Log level filter

pub mod config;
pub mod error;
pub mod telemetry;
pub mod tracing;

pub use config::ObservabilityConfig;
pub use error::ObservabilityError;
pub use telemetry::{init, init_from_env, shutdown};
pub use tracing::{record_duration, record_error};

// Macros are automatically exported via #[macro_export] and available
// as observability::agent_span!(), etc.
