//! Media preparation via ffmpeg/ffprobe: audio duration probing and still-to-video rendering.

use crate::config::MediaConfig;
use crate::process::run_checked;
use anyhow::Context;
use log::{debug, info};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_wav(path: &Path) -> bool {
    let mut header = [0u8; 12];
    let Ok(mut f) = std::fs::File::open(path) else { return false };
    use std::io::Read;
    f.read_exact(&mut header).is_ok() && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE"
}

fn wav_duration(path: &Path) -> anyhow::Result<Duration> {
    let reader = hound::WavReader::open(path).with_context(|| format!("open wav {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        anyhow::bail!("wav {} has a zero sample rate", path.display());
    }
    Ok(Duration::from_secs_f64(
        reader.duration() as f64 / spec.sample_rate as f64,
    ))
}

/// Duration of an audio file. WAV is read from its header, anything else goes through ffprobe.
pub fn audio_duration(config: &MediaConfig, path: &Path) -> anyhow::Result<Duration> {
    if is_wav(path) {
        return wav_duration(path);
    }
    let output = run_checked(
        Command::new(&config.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration", "-of"])
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path),
    )?;
    let text = String::from_utf8_lossy(&output.stdout);
    let secs: f64 = text
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("ffprobe returned no duration for {}: {:?}", path.display(), text.trim()))?;
    if !secs.is_finite() || secs < 0.0 {
        anyhow::bail!("ffprobe returned invalid duration {} for {}", secs, path.display());
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Number of whole frames covering `duration` at `fps`.
pub fn frame_count(duration: Duration, fps: u32) -> u64 {
    (duration.as_secs_f64() * fps as f64).ceil() as u64
}

/// ffmpeg arguments rendering `source` into a silent `duration`-long clip at `fps`.
pub fn still_to_video_args(source: &Path, duration: Duration, fps: u32, out: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    if is_image(source) {
        args.extend([OsString::from("-loop"), OsString::from("1")]);
    } else {
        args.extend([OsString::from("-stream_loop"), OsString::from("-1")]);
    }
    args.push("-i".into());
    args.push(source.as_os_str().to_os_string());
    args.extend(
        [
            "-t".to_string(),
            format!("{:.3}", duration.as_secs_f64()),
            "-r".to_string(),
            fps.to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(out.as_os_str().to_os_string());
    args
}

/// Render `source` (image or video) into a clip matching `duration` at the configured frame rate.
pub fn still_to_video(config: &MediaConfig, source: &Path, duration: Duration, out: &Path) -> anyhow::Result<()> {
    if !source.exists() {
        anyhow::bail!("source media {} does not exist", source.display());
    }
    if config.fps == 0 {
        anyhow::bail!("frame rate must be > 0");
    }
    info!(
        "rendering {} to {:.3}s at {} fps ({} frames)",
        source.display(),
        duration.as_secs_f64(),
        config.fps,
        frame_count(duration, config.fps)
    );
    run_checked(Command::new(&config.ffmpeg).args(still_to_video_args(source, duration, config.fps, out)))?;
    let written = std::fs::metadata(out).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        anyhow::bail!("ffmpeg produced no video at {}", out.display());
    }
    debug!("wrote {} bytes to {}", written, out.display());
    Ok(())
}
