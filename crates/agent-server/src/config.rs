//! Server Configuration
//!
//! Everything is read from the environment (after `.env` is loaded).
//! Invalid numbers fall back to their defaults with a warning.

use std::path::PathBuf;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use agent_core::provider::GenerationOptions;
use agent_runtime::{env, OpenAiConfig};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Model endpoint settings
    pub openai: OpenAiConfig,

    /// Model id and sampling
    pub generation: GenerationOptions,

    /// Retries when opening a model stream
    pub max_retries: u32,

    /// Model calls allowed per turn
    pub max_iterations: usize,

    /// Phone catalog JSON; bundled sample when unset
    pub catalog_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let generation = GenerationOptions {
            model: env::var_or("OPENAI_MODEL", "gpt-4o-mini"),
            temperature: env::parse_or("MODEL_TEMPERATURE", 0.7),
            max_tokens: None,
        };

        Self {
            bind_addr: env::var_or("BIND_ADDR", "0.0.0.0:8000"),
            cors_origins: env::var_or("CORS_ORIGINS", "*")
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            openai: OpenAiConfig::from_env(),
            generation,
            max_retries: env::parse_or("MODEL_MAX_RETRIES", 2),
            max_iterations: env::parse_or("AGENT_MAX_ITERATIONS", 8),
            catalog_path: env::var_opt("PHONE_CATALOG_PATH").map(PathBuf::from),
        }
    }

    /// CORS layer for the configured origins
    pub fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

        if self.cors_origins.iter().any(|o| o == "*") {
            return layer.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        layer.allow_origin(AllowOrigin::list(origins))
    }
}
