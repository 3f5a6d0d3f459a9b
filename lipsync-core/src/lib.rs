//! lipsync core: hyperparameters, configuration, speech synthesis, media prep and
//! the generation pipeline that drives the external lip-sync model.

pub mod config;
pub mod error;
pub mod generate;
pub mod hparams;
pub mod inference;
pub mod media;
pub mod process;
pub mod speech;
pub mod workspace;

pub use config::{AppConfig, ConfigError, InferenceConfig, MediaConfig, Paths, SpeechConfig, DEFAULT_CONFIG_FILE};
pub use error::GenerateError;
pub use generate::{GenerationRequest, Generator};
pub use hparams::{image_list, HParamValue, HParams, HParamsError};
pub use process::ProcessFailed;
pub use speech::{CommandTts, GoogleTts, SpeechSynthesizer};
pub use workspace::TempWorkspace;

