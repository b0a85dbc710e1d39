use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureSettings,
    pub broker: BrokerConfig,
    pub join: JoinConfig,
    pub session: SessionDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// External encoder process settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSettings {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: String,
    /// Input format passed to `-f` (e.g. "avfoundation", "pulse")
    pub input_format: String,
    /// Input device passed to `-i` (e.g. ":BlackHole 2ch")
    pub input_source: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// When set, every published chunk payload is also appended to
    /// `<archive_dir>/<session_id>.wav`
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// NATS server URL
    pub url: String,
    /// Chunks are published to "<subject_prefix>.<session_id>"
    pub subject_prefix: String,
}

/// Browser-automation helper settings.
///
/// The helper is an external program that joins the meeting UI, prints a
/// ready line on stdout once it is in the meeting, and exits when the
/// meeting ends.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinConfig {
    pub helper_command: String,
    #[serde(default)]
    pub helper_args: Vec<String>,
    /// Upper bound on the wait for the helper's ready line
    pub ready_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionDefaults {
    /// Duration of each chunk window in seconds
    pub window_secs: u64,
    /// Liveness polling interval in seconds
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("MEETING_RELAY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
