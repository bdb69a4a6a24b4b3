//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use lessonforge_agent::GeneratorConfig;
use lessonforge_sandbox::RuntimeBundle;

use crate::quota::QuotaPolicy;
use crate::{GatewayError, Result, DEFAULT_HOST, DEFAULT_PORT};

/// Main gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSettings,
    pub quota: QuotaSettings,
    pub pipeline: PipelineSettings,
    pub generator: GeneratorConfig,
    pub storage: StorageSettings,
    pub sandbox: RuntimeBundle,
}

impl GatewayConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn with_database_path(mut self, path: Option<String>) -> Self {
        self.storage.database_path = path;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.generator.model = model.into();
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                GatewayError::InvalidConfig(format!(
                    "invalid listen address {}:{}: {}",
                    self.server.host, self.server.port, e
                ))
            })
    }

    /// Load configuration from a JSON file. Missing sections keep their defaults.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Listen address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Per-endpoint request quotas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    pub generation: QuotaPolicy,
    pub compilation: QuotaPolicy,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            generation: QuotaPolicy::generation(),
            compilation: QuotaPolicy::compilation(),
        }
    }
}

/// Repair budget and timing for background generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    /// How long a generated lesson blocks a request with the same outline
    pub duplicate_window_secs: u64,
}

impl PipelineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_attempts: lessonforge_agent::DEFAULT_MAX_ATTEMPTS,
            timeout_secs: lessonforge_agent::DEFAULT_TIMEOUT.as_secs(),
            duplicate_window_secs: lessonforge_agent::DEFAULT_DUPLICATE_WINDOW.as_secs(),
        }
    }
}

/// Lesson persistence. `None` keeps lessons in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_path: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: Some(".lessonforge/lessons.db".to_string()),
        }
    }
}
