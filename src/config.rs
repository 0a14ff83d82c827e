use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
    pub recognizer: RecognizerConfig,
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

/// External transcoder invocation. The default command turns whatever the
/// browser sends into mono 16-bit little-endian PCM at 16kHz on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscodeConfig {
    #[serde(default = "default_transcode_command")]
    pub command: String,
    #[serde(default = "default_transcode_args")]
    pub args: Vec<String>,
    /// How long to wait for the transcoder to exit after its input closes
    /// before killing it, in milliseconds
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            command: default_transcode_command(),
            args: default_transcode_args(),
            grace_ms: default_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognizerConfig {
    /// Path to the recognition model directory, loaded once at startup
    pub model_path: String,
    /// Decode sample rate; must match the transcoder's output format
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f32,
}

fn default_transcode_command() -> String {
    "ffmpeg".to_string()
}

fn default_transcode_args() -> Vec<String> {
    [
        "-loglevel",
        "quiet",
        "-i",
        "pipe:0",
        "-f",
        "s16le",
        "-acodec",
        "pcm_s16le",
        "-ar",
        "16000",
        "-ac",
        "1",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_grace_ms() -> u64 {
    1000
}

fn default_sample_rate() -> f32 {
    16000.0
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
