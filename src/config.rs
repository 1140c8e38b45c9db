use clap::Parser;
use std::time::Duration;

use crate::domain::model::{ModelConfiguration, DEFAULT_MODEL_NAME, DEFAULT_MODEL_PATH};

/// Process configuration. Every flag can also be given through the
/// environment variable named next to it.
#[derive(Debug, Clone, Parser)]
#[command(name = "recyclable-detector", version, about)]
pub struct AppConfig {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Logical name of the default model (cache key).
    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,

    /// ONNX weights loaded for the default model.
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: String,

    /// Include internal error text in error responses.
    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Upper bound for uploaded and fetched image bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Images wider or taller than this are rejected at decode time.
    #[arg(long, env = "MAX_IMAGE_DIMENSION", default_value_t = 8192)]
    pub max_image_dimension: u32,

    /// Comma separated list of allowed origins, `*` for any.
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    #[arg(long, env = "INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Square input resolution of the model.
    #[arg(long, env = "INPUT_SIZE", default_value_t = 640)]
    pub input_size: u32,

    /// Load the default model before accepting requests.
    #[arg(long, env = "PRELOAD", default_value_t = false)]
    pub preload: bool,
}

impl AppConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn default_model(&self) -> ModelConfiguration {
        ModelConfiguration::with_model(self.model_name.clone(), self.model_path.clone())
    }

    /// `None` means any origin.
    pub fn cors_origin_list(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins)
        }
    }
}
