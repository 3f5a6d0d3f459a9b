//! Subprocess helpers: spawn with an argument list (never a shell), capture output, check status.

use log::debug;
use std::io::Write;
use std::process::{Command, ExitStatus, Output, Stdio};
use thiserror::Error;

/// How much of a failing process's stderr is carried in the error.
const STDERR_TAIL_BYTES: usize = 2048;

/// A process ran but exited unsuccessfully.
#[derive(Debug, Error)]
#[error("{program} exited with {status}")]
pub struct ProcessFailed {
    pub program: String,
    pub status: ExitStatus,
    /// Tail of stderr.
    pub stderr: String,
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().to_string()
}

fn describe(cmd: &Command) -> String {
    let mut s = program_name(cmd);
    for a in cmd.get_args() {
        s.push(' ');
        s.push_str(&a.to_string_lossy());
    }
    s
}

fn check(cmd: &Command, output: Output) -> anyhow::Result<Output> {
    if !output.status.success() {
        return Err(ProcessFailed {
            program: program_name(cmd),
            status: output.status,
            stderr: stderr_tail(&output.stderr),
        }
        .into());
    }
    Ok(output)
}

/// Run to completion with stdout and stderr captured. Non-zero exit becomes [`ProcessFailed`].
pub fn run_checked(cmd: &mut Command) -> anyhow::Result<Output> {
    debug!("running {}", describe(cmd));
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| anyhow::anyhow!("spawn {}: {}", program_name(cmd), e))?;
    check(cmd, output)
}

/// Write `input` to stdin, then collect stdout and stderr.
pub fn run_with_stdin(cmd: &mut Command, input: &[u8]) -> anyhow::Result<Output> {
    debug!("running {}", describe(cmd));
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow::anyhow!("spawn {}: {}", program_name(cmd), e))?;

    // Feed stdin from its own thread while stdout/stderr drain, or a child that
    // writes before reading (or never reads) fills its pipe and both sides block.
    let stdin = child.stdin.take();
    let (output, written) = std::thread::scope(|s| {
        let writer = s.spawn(move || -> std::io::Result<()> {
            let Some(mut stdin) = stdin else { return Ok(()) };
            match stdin.write_all(input) {
                // A child that never reads its stdin closes the pipe early; that is not our failure.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        });
        let output = child.wait_with_output();
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
        (output, written)
    });
    let output = check(cmd, output?)?;
    written?;
    Ok(output)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
