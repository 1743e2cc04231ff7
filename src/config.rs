use crate::services::compression_service::{CompressionSettings, ToolCommand, ToolSet};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt::Display, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub output_dir: String,
    pub public_path: String,
    pub max_batch_files: usize,
    pub batch_concurrency: usize,
    /// Zero disables the timeout.
    pub compress_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub tools: ToolSet,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image upload and compression service")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_CDN_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploads are staged (overrides IMAGE_CDN_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Directory receiving compressed images (overrides IMAGE_CDN_OUTPUT_DIR)
    #[arg(long)]
    pub output_dir: Option<String>,

    /// URL segment compressed images are served under (overrides IMAGE_CDN_PUBLIC_PATH)
    #[arg(long)]
    pub public_path: Option<String>,

    /// Maximum files per batch upload (overrides IMAGE_CDN_MAX_BATCH_FILES)
    #[arg(long)]
    pub max_batch_files: Option<usize>,

    /// Files of a batch compressed at once (overrides IMAGE_CDN_BATCH_CONCURRENCY)
    #[arg(long)]
    pub batch_concurrency: Option<usize>,

    /// Per-image compression timeout in seconds, 0 for none (overrides IMAGE_CDN_COMPRESS_TIMEOUT_SECS)
    #[arg(long)]
    pub compress_timeout_secs: Option<u64>,

    /// Maximum request body size in bytes (overrides IMAGE_CDN_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// JPEG compressor command (overrides IMAGE_CDN_JPEG_TOOL)
    #[arg(long)]
    pub jpeg_tool: Option<ToolCommand>,

    /// PNG compressor command (overrides IMAGE_CDN_PNG_TOOL)
    #[arg(long)]
    pub png_tool: Option<ToolCommand>,

    /// SVG optimizer command (overrides IMAGE_CDN_SVG_TOOL)
    #[arg(long)]
    pub svg_tool: Option<ToolCommand>,

    /// GIF compressor command (overrides IMAGE_CDN_GIF_TOOL)
    #[arg(long)]
    pub gif_tool: Option<ToolCommand>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |key| env::var(key))
    }

    /// Merge `args` over the variables visible through `lookup`, falling back
    /// to defaults.
    fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = ToolSet::default();

        // --- Environment fallback ---
        let env_host = env_or(&lookup, "IMAGE_CDN_HOST", "0.0.0.0".to_string())?;
        let env_port = env_or(&lookup, "PORT", 5678)?;
        let env_uploads = env_or(&lookup, "IMAGE_CDN_UPLOAD_DIR", "uploads".to_string())?;
        let env_output = env_or(&lookup, "IMAGE_CDN_OUTPUT_DIR", "compressed".to_string())?;
        let env_public = env_or(&lookup, "IMAGE_CDN_PUBLIC_PATH", "compressed".to_string())?;
        let env_batch = env_or(&lookup, "IMAGE_CDN_MAX_BATCH_FILES", 5)?;
        let env_concurrency = env_or(&lookup, "IMAGE_CDN_BATCH_CONCURRENCY", 1)?;
        let env_timeout = env_or(&lookup, "IMAGE_CDN_COMPRESS_TIMEOUT_SECS", 120)?;
        let env_body = env_or(&lookup, "IMAGE_CDN_MAX_BODY_BYTES", 50 * 1024 * 1024)?;
        let env_jpeg = env_or(&lookup, "IMAGE_CDN_JPEG_TOOL", defaults.jpeg)?;
        let env_png = env_or(&lookup, "IMAGE_CDN_PNG_TOOL", defaults.png)?;
        let env_svg = env_or(&lookup, "IMAGE_CDN_SVG_TOOL", defaults.svg)?;
        let env_gif = env_or(&lookup, "IMAGE_CDN_GIF_TOOL", defaults.gif)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or(env_uploads),
            output_dir: args.output_dir.unwrap_or(env_output),
            public_path: args.public_path.unwrap_or(env_public),
            max_batch_files: args.max_batch_files.unwrap_or(env_batch),
            batch_concurrency: args.batch_concurrency.unwrap_or(env_concurrency),
            compress_timeout_secs: args.compress_timeout_secs.unwrap_or(env_timeout),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_body),
            tools: ToolSet {
                jpeg: args.jpeg_tool.unwrap_or(env_jpeg),
                png: args.png_tool.unwrap_or(env_png),
                svg: args.svg_tool.unwrap_or(env_svg),
                gif: args.gif_tool.unwrap_or(env_gif),
            },
        };

        if cfg.max_batch_files == 0 {
            anyhow::bail!("max batch files must be at least 1");
        }
        if cfg.public_path.trim_matches('/').is_empty() {
            anyhow::bail!("public path must not be empty");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine settings: fixed per-format parameters plus the configured tools
    /// and timeout.
    pub fn compression_settings(&self) -> CompressionSettings {
        CompressionSettings {
            timeout: (self.compress_timeout_secs > 0)
                .then(|| Duration::from_secs(self.compress_timeout_secs)),
            tools: self.tools.clone(),
            ..CompressionSettings::default()
        }
    }
}

/// Read and parse `key`, using `default` when it is unset.
fn env_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
