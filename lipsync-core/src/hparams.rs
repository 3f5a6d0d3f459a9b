//! Model hyperparameters: an open-ended key/value bundle handed to the Wav2Lip code.
//!
//! Keys are fixed once built except through [`HParams::set`]. Lookups are
//! presence-checked and return [`HParamsError`] instead of panicking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key skipped by [`HParams::debug_string`].
const HIDDEN_KEY: &str = "sentences";

#[derive(Debug, Error, PartialEq)]
pub enum HParamsError {
    #[error("no hyperparameter named {0:?}")]
    Missing(String),
    #[error("hyperparameter {key:?} is not {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// A single scalar setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl HParamValue {
    /// Parse a command-line literal: booleans, `None`, integers, floats, else a string.
    pub fn parse_literal(s: &str) -> Self {
        match s.trim() {
            "true" | "True" => return HParamValue::Bool(true),
            "false" | "False" => return HParamValue::Bool(false),
            "None" | "none" | "null" => return HParamValue::None,
            _ => {}
        }
        if let Ok(i) = s.trim().parse::<i64>() {
            return HParamValue::Int(i);
        }
        if let Ok(f) = s.trim().parse::<f64>() {
            return HParamValue::Float(f);
        }
        HParamValue::Str(s.to_string())
    }
}

impl fmt::Display for HParamValue {
    // Rendered the way the model code prints its literals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HParamValue::Bool(true) => f.write_str("True"),
            HParamValue::Bool(false) => f.write_str("False"),
            HParamValue::Int(i) => write!(f, "{i}"),
            HParamValue::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{x:.1}")
            }
            HParamValue::Float(x) => write!(f, "{x}"),
            HParamValue::Str(s) => f.write_str(s),
            HParamValue::None => f.write_str("None"),
        }
    }
}

impl From<bool> for HParamValue {
    fn from(v: bool) -> Self {
        HParamValue::Bool(v)
    }
}

impl From<i64> for HParamValue {
    fn from(v: i64) -> Self {
        HParamValue::Int(v)
    }
}

impl From<i32> for HParamValue {
    fn from(v: i32) -> Self {
        HParamValue::Int(v.into())
    }
}

impl From<f64> for HParamValue {
    fn from(v: f64) -> Self {
        HParamValue::Float(v)
    }
}

impl From<&str> for HParamValue {
    fn from(v: &str) -> Self {
        HParamValue::Str(v.to_string())
    }
}

impl From<String> for HParamValue {
    fn from(v: String) -> Self {
        HParamValue::Str(v)
    }
}

/// Named hyperparameter bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HParams {
    data: BTreeMap<String, HParamValue>,
}

impl HParams {
    /// Build a bundle holding exactly the supplied pairs.
    pub fn new<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<HParamValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            data: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Result<&HParamValue, HParamsError> {
        self.data
            .get(key)
            .ok_or_else(|| HParamsError::Missing(key.to_string()))
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, HParamsError> {
        match self.get(key)? {
            HParamValue::Int(i) => Ok(*i),
            _ => Err(wrong_type(key, "an integer")),
        }
    }

    /// Integers widen to floats.
    pub fn get_f64(&self, key: &str) -> Result<f64, HParamsError> {
        match self.get(key)? {
            HParamValue::Float(x) => Ok(*x),
            HParamValue::Int(i) => Ok(*i as f64),
            _ => Err(wrong_type(key, "a number")),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, HParamsError> {
        match self.get(key)? {
            HParamValue::Bool(b) => Ok(*b),
            _ => Err(wrong_type(key, "a boolean")),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str, HParamsError> {
        match self.get(key)? {
            HParamValue::Str(s) => Ok(s),
            _ => Err(wrong_type(key, "a string")),
        }
    }

    /// Insert or overwrite. Values are not validated.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<HParamValue>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, HParamValue)>,
    {
        for (k, v) in overrides {
            self.set(k, v);
        }
        self
    }

    pub fn values(&self) -> &BTreeMap<String, HParamValue> {
        &self.data
    }

    /// Sorted `  key: value` listing under a header line.
    pub fn debug_string(&self) -> String {
        let lines: Vec<String> = self
            .data
            .iter()
            .filter(|(k, _)| k.as_str() != HIDDEN_KEY)
            .map(|(k, v)| format!("  {k}: {v}"))
            .collect();
        format!("Hyperparameters:\n{}", lines.join("\n"))
    }
}

fn wrong_type(key: &str, expected: &'static str) -> HParamsError {
    HParamsError::WrongType {
        key: key.to_string(),
        expected,
    }
}

impl Default for HParams {
    /// Wav2Lip defaults.
    fn default() -> Self {
        use HParamValue::*;
        Self::new([
            // Mel-spectrogram
            ("num_mels", Int(80)),
            ("fmin", Int(55)),
            ("fmax", Int(7600)),
            ("mel_fmin", Int(55)),
            ("mel_fmax", Int(7600)),
            // Audio preprocessing
            ("rescale", Bool(true)),
            ("rescaling_max", Float(0.9)),
            ("use_lws", Bool(false)),
            ("n_fft", Int(800)),
            ("hop_size", Int(200)),
            ("win_size", Int(800)),
            ("sample_rate", Int(16000)),
            ("frame_shift_ms", None),
            ("signal_normalization", Bool(true)),
            ("allow_clipping_in_normalization", Bool(true)),
            ("symmetric_mels", Bool(true)),
            ("max_abs_value", Float(4.0)),
            ("preemphasize", Bool(true)),
            ("preemphasis", Float(0.97)),
            ("min_level_db", Int(-100)),
            ("ref_level_db", Int(20)),
            // Training
            ("img_size", Int(96)),
            ("fps", Int(25)),
            ("batch_size", Int(16)),
            ("initial_learning_rate", Float(1e-4)),
            // Effectively unbounded; training is stopped by hand.
            ("nepochs", Int(200_000_000_000_000_000)),
            ("num_workers", Int(16)),
            ("checkpoint_interval", Int(3000)),
            ("eval_interval", Int(3000)),
            ("save_optimizer_state", Bool(true)),
            // SyncNet
            ("syncnet_wt", Float(0.0)),
            ("syncnet_batch_size", Int(64)),
            ("syncnet_lr", Float(1e-4)),
            ("syncnet_eval_interval", Int(10000)),
            ("syncnet_checkpoint_interval", Int(10000)),
            // Discriminator
            ("disc_wt", Float(0.07)),
            ("disc_initial_learning_rate", Float(1e-4)),
        ])
    }
}

/// Read `<filelists_dir>/<split>.txt` and join the first token of each line onto `data_root`.
/// Blank lines are skipped.
pub fn image_list(data_root: &Path, split: &str, filelists_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let list_path = filelists_dir.join(format!("{split}.txt"));
    let contents = std::fs::read_to_string(&list_path)
        .map_err(|e| anyhow::anyhow!("read filelist {:?}: {}", list_path, e))?;
    Ok(contents
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|entry| data_root.join(entry))
        .collect())
}
