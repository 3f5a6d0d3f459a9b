//! Integration tests: run the CLI binary with temp fixtures.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn lipsync_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_lipsync-cli"))
}

#[test]
fn hparams_prints_sorted_listing() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(lipsync_bin())
        .arg("hparams")
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.starts_with("Hyperparameters:\n"));
    assert!(stdout.contains("  num_mels: 80\n"));
    assert!(stdout.contains("  fps: 25\n"));
}

#[test]
fn hparams_overrides_from_config_and_flags() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lipsync.toml"), "[hparams]\nsyncnet_wt = 0.03\n").unwrap();
    let out = Command::new(lipsync_bin())
        .args(["hparams", "--set", "fps=30", "--json"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["fps"], 30);
    assert_eq!(json["syncnet_wt"], 0.03);
}

#[test]
fn explicit_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(lipsync_bin())
        .args(["--config", "missing.toml", "hparams"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
fn stub_config(base: &Path, inference_exit: i32) {
    write_script(&base.join("tts.sh"), "printf 'speech:%s' \"$LIPSYNC_TEXT\"\n");
    write_script(
        &base.join("inference.sh"),
        &format!(
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    --audio) audio="$2"; shift ;;
    --outfile) out="$2"; shift ;;
  esac
  shift
done
if [ {inference_exit} -ne 0 ]; then echo "bad checkpoint" >&2; exit {inference_exit}; fi
cp "$audio" "$out"
"#
        ),
    );
    fs::write(
        base.join("lipsync.toml"),
        format!(
            r#"
[speech]
engine = "command"
program = "{tts}"

[inference]
program = "sh"
script = "{inference}"
"#,
            tts = base.join("tts.sh").display(),
            inference = base.join("inference.sh").display(),
        ),
    )
    .unwrap();
    fs::write(base.join("talk.mp4"), b"mp4").unwrap();
}

#[test]
#[cfg(unix)]
fn generate_with_stub_programs() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    stub_config(base, 0);

    let out = Command::new(lipsync_bin())
        .args(["generate", "--text", "Hello", "--media", "talk.mp4"])
        .current_dir(base)
        .output()
        .unwrap();

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let printed = String::from_utf8(out.stdout).unwrap();
    assert!(printed.trim().ends_with("outputs/result.mp4"));
    assert_eq!(fs::read(base.join("outputs/result.mp4")).unwrap(), b"speech:Hello");
    assert!(!base.join("temp").exists());
}

#[test]
#[cfg(unix)]
fn generate_reports_inference_failure() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    stub_config(base, 2);

    let out = Command::new(lipsync_bin())
        .args(["generate", "--text", "Hello", "--media", "talk.mp4"])
        .current_dir(base)
        .output()
        .unwrap();

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Video processing failed"), "stderr: {stderr}");
    assert!(stderr.contains("bad checkpoint"), "stderr: {stderr}");
    assert!(!base.join("temp").exists());
}

#[test]
fn filelist_joins_entries_onto_data_root() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("filelists")).unwrap();
    fs::write(dir.path().join("filelists/val.txt"), "spk1/clip3 1\nspk2/clip9\n").unwrap();
    let out = Command::new(lipsync_bin())
        .args(["filelist", "--data-root", "lrs2_preprocessed", "--split", "val"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        String::from_utf8(out.stdout).unwrap(),
        "lrs2_preprocessed/spk1/clip3\nlrs2_preprocessed/spk2/clip9\n"
    );
}
