//! LessonForge Gateway - HTTP front door for lesson generation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   LessonForge Gateway                    │
//! ├─────────────────────────────────────────────────────────┤
//! │  POST /api/lessons          POST /api/compile           │
//! │        │                          │                     │
//! │  ┌─────▼──────┐             ┌─────▼──────┐              │
//! │  │ QuotaGuard │  5/min      │ QuotaGuard │  30/min      │
//! │  └─────┬──────┘             └─────┬──────┘              │
//! │  ┌─────▼──────────┐         ┌─────▼──────┐              │
//! │  │ LessonPipeline │         │  Compiler  │              │
//! │  │ admit + spawn  │         └────────────┘              │
//! │  └─────┬──────────┘                                     │
//! │  ┌─────▼──────┐   GET /lessons/:id   ┌───────────────┐  │
//! │  │LessonStore │ ───────────────────► │SandboxExecutor│  │
//! │  └────────────┘                      └───────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Generation requests return `202 Accepted` with the new record; the
//! pipeline finishes in a background task and clients poll
//! `GET /api/lessons/:id`.

pub mod config;
pub mod error;
pub mod gateway;
pub mod quota;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::{client_key, Gateway, GatewayState};
pub use quota::{QuotaDecision, QuotaGuard, QuotaPolicy};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8787;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";
