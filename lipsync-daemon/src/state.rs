use lipsync_core::{GenerateError, Generator, HParams};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Generator>,
    pub hparams: Arc<HParams>,
    pub runs: Arc<RunState>,
}

impl AppState {
    pub fn new(generator: Generator, hparams: HParams) -> Self {
        Self {
            generator: Arc::new(generator),
            hparams: Arc::new(hparams),
            runs: Arc::new(RunState::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub status: RunStatus,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

impl Default for LastRun {
    fn default() -> Self {
        Self {
            status: RunStatus::Idle,
            output: None,
            error: None,
        }
    }
}

/// Serializes generations (they share one temp workspace path) and remembers the last one.
#[derive(Default)]
pub struct RunState {
    gate: Mutex<()>,
    last: RwLock<LastRun>,
}

impl RunState {
    /// Run `f` while holding the gate, recording its outcome.
    pub fn run_exclusive<F>(&self, f: F) -> Result<PathBuf, GenerateError>
    where
        F: FnOnce() -> Result<PathBuf, GenerateError>,
    {
        let _guard = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.set(LastRun {
            status: RunStatus::Running,
            output: None,
            error: None,
        });
        let result = f();
        match &result {
            Ok(path) => self.set(LastRun {
                status: RunStatus::Completed,
                output: Some(path.clone()),
                error: None,
            }),
            Err(e) => self.set(LastRun {
                status: RunStatus::Failed,
                output: None,
                error: Some(e.user_message()),
            }),
        }
        result
    }

    fn set(&self, run: LastRun) {
        *self.last.write().unwrap() = run;
    }

    pub fn last(&self) -> LastRun {
        self.last.read().unwrap().clone()
    }

    pub fn last_output(&self) -> Option<PathBuf> {
        self.last.read().unwrap().output.clone()
    }
}
