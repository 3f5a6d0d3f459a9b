//! External lip-sync inference: argument assembly and invocation of the model's script.

use crate::config::InferenceConfig;
use crate::process::run_checked;
use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// Inputs and output of one inference run. Paths should be absolute when a working dir is set.
#[derive(Debug, Clone)]
pub struct InferenceJob {
    pub checkpoint: PathBuf,
    pub face: PathBuf,
    pub audio: PathBuf,
    pub outfile: PathBuf,
}

/// Argument list after the program: `[script] --checkpoint_path .. --face .. --audio .. --outfile .. [extra]`.
pub fn inference_args(config: &InferenceConfig, job: &InferenceJob) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(script) = &config.script {
        args.push(script.clone().into_os_string());
    }
    let pairs: [(&str, &Path); 4] = [
        ("--checkpoint_path", job.checkpoint.as_path()),
        ("--face", job.face.as_path()),
        ("--audio", job.audio.as_path()),
        ("--outfile", job.outfile.as_path()),
    ];
    for (flag, value) in pairs {
        args.push(flag.into());
        args.push(value.as_os_str().to_os_string());
    }
    args.extend(config.extra_args.iter().map(OsString::from));
    args
}

/// Run inference and block until it exits. No timeout.
pub fn run_inference(config: &InferenceConfig, job: &InferenceJob) -> anyhow::Result<()> {
    let mut cmd = Command::new(&config.program);
    cmd.args(inference_args(config, job));
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    let now = Instant::now();
    info!("running inference on {}", job.face.display());
    let output = run_checked(&mut cmd)?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        debug!("inference: {}", line);
    }
    info!("inference finished in {:?}", now.elapsed());
    Ok(())
}
