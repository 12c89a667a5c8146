use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

/// Maximum accepted request body, in bytes (16 MiB).
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// File extensions accepted by `POST /upload`.
pub const ALLOWED_EXTENSIONS: [&str; 11] = [
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "zip", "mp4", "mp3",
];

/// Centralized application configuration.
/// Built once at startup from environment variables and CLI arguments,
/// then shared read-only with every handler.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub debug: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File upload/download service backed by a local directory")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_STREAM_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_STREAM_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded files are stored (overrides UPLOAD_STREAM_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Enable debug mode (overrides UPLOAD_STREAM_DEBUG)
    #[arg(long)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            storage_dir: PathBuf::from("uploads"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |key| env::var(key))
    }

    /// Merge parsed CLI args over values looked up by `lookup`.
    ///
    /// CLI values win; missing environment values fall back to defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Self::default();

        // --- Environment fallback ---
        let env_host = lookup("UPLOAD_STREAM_HOST").unwrap_or(defaults.host);
        let env_port = match lookup("UPLOAD_STREAM_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing UPLOAD_STREAM_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => defaults.port,
            Err(err) => return Err(err).context("reading UPLOAD_STREAM_PORT"),
        };
        let env_storage = lookup("UPLOAD_STREAM_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);
        let env_debug = lookup("UPLOAD_STREAM_DEBUG")
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            debug: args.debug || env_debug,
            ..defaults
        })
    }

    /// Config rooted at `storage_dir` with every other setting at its default.
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upload limit in MiB, as shown to clients.
    pub fn max_upload_mib(&self) -> f64 {
        self.max_upload_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}
