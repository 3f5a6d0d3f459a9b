//! Application configuration (lipsync.toml): paths, speech, media, inference, hparam overrides.
//! Every field defaults to the stock Wav2Lip layout, so an empty file is valid.

use crate::hparams::{HParamValue, HParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "lipsync.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Full application config.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: Paths,
    pub speech: SpeechConfig,
    pub media: MediaConfig,
    pub inference: InferenceConfig,
    /// Overrides applied on top of the default hyperparameters.
    pub hparams: BTreeMap<String, HParamValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Paths {
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_file: String,
    pub checkpoint: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("outputs"),
            output_file: "result.mp4".to_string(),
            checkpoint: PathBuf::from("checkpoints/wav2lip_gan.pth"),
        }
    }
}

impl Paths {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

/// Speech engine selection; `engine` picks the variant.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum SpeechConfig {
    Google {
        #[serde(default = "default_language")]
        language: String,
        #[serde(default = "default_google_endpoint")]
        endpoint: String,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_command_extension")]
        extension: String,
    },
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig::Google {
            language: default_language(),
            endpoint: default_google_endpoint(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_google_endpoint() -> String {
    "https://translate.google.com/translate_tts".to_string()
}

fn default_command_extension() -> String {
    "wav".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub fps: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            fps: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub program: String,
    /// First argument, usually the model's inference script. Omitted when unset.
    pub script: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    /// Appended after the fixed arguments (e.g. `--resize_factor 2`).
    pub extra_args: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            script: Some(PathBuf::from("inference.py")),
            working_dir: None,
            extra_args: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load_path(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&s)
    }

    /// Default hyperparameters with the `[hparams]` overrides applied.
    pub fn hparams(&self) -> HParams {
        HParams::default().with_overrides(self.hparams.clone())
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_path(path)
        } else {
            Ok(Self::default())
        }
    }
}
