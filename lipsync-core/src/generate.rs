//! Generation: speech -> optional still-to-video -> inference, inside a scoped temp workspace.

use crate::config::AppConfig;
use crate::error::GenerateError;
use crate::inference::{run_inference, InferenceJob};
use crate::media;
use crate::process::{run_checked, ProcessFailed};
use crate::speech::{self, SpeechSynthesizer};
use crate::workspace::TempWorkspace;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

const AUDIO_STEM: &str = "output_audio";
const PROCESSED_VIDEO: &str = "processed_video.mp4";

/// One generation call's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub text: String,
    pub media_path: PathBuf,
    /// Input is a still image that must be turned into a clip first.
    #[serde(default)]
    pub is_static: bool,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, media_path: impl Into<PathBuf>, is_static: bool) -> Self {
        Self {
            text: text.into(),
            media_path: media_path.into(),
            is_static,
        }
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        if !self.media_path.is_file() {
            return Err(GenerateError::Unclassified(format!(
                "media file {} not found",
                self.media_path.display()
            )));
        }
        Ok(())
    }
}

pub struct Generator {
    config: AppConfig,
    synthesizer: Box<dyn SpeechSynthesizer>,
}

impl Generator {
    pub fn new(config: AppConfig) -> Self {
        let synthesizer = speech::from_config(&config.speech);
        Self::with_synthesizer(config, synthesizer)
    }

    pub fn with_synthesizer(config: AppConfig, synthesizer: Box<dyn SpeechSynthesizer>) -> Self {
        Self { config, synthesizer }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.paths.output_path()
    }

    /// Produce a lip-synced video for `request` and return its absolute path.
    /// The temp workspace is gone by the time this returns, whatever the outcome.
    pub fn generate(&self, request: &GenerationRequest) -> Result<PathBuf, GenerateError> {
        let now = Instant::now();
        info!(
            "generating from {} (static: {}, {} chars of text)",
            request.media_path.display(),
            request.is_static,
            request.text.chars().count()
        );
        let result = self.run(request);
        match &result {
            Ok(path) => info!("generated {} in {:?}", path.display(), now.elapsed()),
            Err(e) => error!("generation failed [{}]: {}", e.kind(), e),
        }
        result
    }

    fn run(&self, request: &GenerationRequest) -> Result<PathBuf, GenerateError> {
        let paths = &self.config.paths;
        std::fs::create_dir_all(&paths.output_dir).map_err(|e| {
            GenerateError::Unclassified(format!("create {}: {}", paths.output_dir.display(), e))
        })?;
        let workspace = TempWorkspace::create(&paths.temp_dir).map_err(unclassified)?;
        request.validate()?;

        let audio = workspace.join(&format!("{}.{}", AUDIO_STEM, self.synthesizer.extension()));
        info!("synthesizing speech with {}", self.synthesizer.name());
        self.synthesizer
            .synthesize(&request.text, &audio)
            .map_err(|e| GenerateError::Synthesis(format!("{e:#}")))?;

        let face = if request.is_static {
            let processed = workspace.join(PROCESSED_VIDEO);
            self.prepare_still(&request.media_path, &audio, &processed)
                .map_err(|e| GenerateError::Conversion(format!("{e:#}")))?;
            processed
        } else {
            request.media_path.clone()
        };

        let outfile = absolute(&self.output_path())?;
        remove_stale(&outfile)?;
        let job = InferenceJob {
            checkpoint: absolute(&paths.checkpoint)?,
            face: absolute(&face)?,
            audio: absolute(&audio)?,
            outfile: outfile.clone(),
        };
        run_inference(&self.config.inference, &job).map_err(classify_inference)?;

        match std::fs::metadata(&outfile) {
            Ok(m) if m.len() > 0 => Ok(outfile),
            _ => Err(GenerateError::Unclassified(format!(
                "inference finished but produced no video at {}",
                outfile.display()
            ))),
        }
    }

    fn prepare_still(&self, source: &Path, audio: &Path, out: &Path) -> anyhow::Result<()> {
        let duration = media::audio_duration(&self.config.media, audio)?;
        media::still_to_video(&self.config.media, source, duration, out)
    }

    /// Problems that would make every generation fail. Runs nothing but the media tools' `-version`.
    pub fn preflight(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let inference = &self.config.inference;
        if !self.config.paths.checkpoint.is_file() {
            problems.push(format!(
                "checkpoint {} not found",
                self.config.paths.checkpoint.display()
            ));
        }
        if let Some(dir) = &inference.working_dir {
            if !dir.is_dir() {
                problems.push(format!("inference working dir {} not found", dir.display()));
            }
        }
        if let Some(script) = &inference.script {
            let resolved = match &inference.working_dir {
                Some(dir) if script.is_relative() => dir.join(script),
                _ => script.clone(),
            };
            if !resolved.is_file() {
                problems.push(format!("inference script {} not found", resolved.display()));
            }
        }
        // ffprobe measures any non-WAV speech (the Google engine writes MP3).
        for tool in [&self.config.media.ffmpeg, &self.config.media.ffprobe] {
            if run_checked(Command::new(tool).arg("-version")).is_err() {
                problems.push(format!("{} is not runnable (needed for static image mode)", tool));
            }
        }
        for p in &problems {
            warn!("preflight: {}", p);
        }
        problems
    }
}

fn unclassified(e: anyhow::Error) -> GenerateError {
    GenerateError::Unclassified(format!("{e:#}"))
}

fn classify_inference(e: anyhow::Error) -> GenerateError {
    match e.downcast_ref::<ProcessFailed>() {
        Some(failed) => GenerateError::ExternalProcess {
            status: failed.status.to_string(),
            detail: if failed.stderr.is_empty() {
                "no output on stderr".to_string()
            } else {
                failed.stderr.clone()
            },
        },
        None => unclassified(e),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, GenerateError> {
    std::path::absolute(path)
        .map_err(|e| GenerateError::Unclassified(format!("resolve {}: {}", path.display(), e)))
}

/// A previous run's output must not pass for this run's.
fn remove_stale(path: &Path) -> Result<(), GenerateError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GenerateError::Unclassified(format!(
            "remove previous output {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Writes fixed bytes and counts calls.
    struct FakeTts {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl SpeechSynthesizer for FakeTts {
        fn name(&self) -> &str {
            "fake"
        }

        fn extension(&self) -> &str {
            "wav"
        }

        fn synthesize(&self, text: &str, out: &Path) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("service unavailable");
            }
            std::fs::write(out, text.as_bytes())?;
            Ok(())
        }
    }

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.temp_dir = dir.join("temp");
        config.paths.output_dir = dir.join("outputs");
        config.paths.checkpoint = dir.join("checkpoints/wav2lip_gan.pth");
        config.inference.program = "sh".into();
        config.inference.script = None;
        config
    }

    fn fake(fail: bool) -> (Box<dyn SpeechSynthesizer>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(FakeTts {
                calls: Arc::clone(&calls),
                fail,
            }),
            calls,
        )
    }

    #[test]
    fn synthesis_failure_cleans_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("face.mp4");
        std::fs::write(&media, b"video").unwrap();
        let (tts, calls) = fake(true);
        let generator = Generator::with_synthesizer(config_in(dir.path()), tts);

        let err = generator.generate(&GenerationRequest::new("hi", &media, false)).unwrap_err();
        assert!(matches!(err, GenerateError::Synthesis(ref m) if m.contains("service unavailable")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("temp").exists());
        assert!(dir.path().join("outputs").is_dir());
    }

    #[test]
    fn missing_media_is_rejected_before_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let (tts, calls) = fake(false);
        let generator = Generator::with_synthesizer(config_in(dir.path()), tts);

        let err = generator
            .generate(&GenerationRequest::new("hi", dir.path().join("nope.mp4"), false))
            .unwrap_err();
        assert_eq!(err.kind(), "unclassified");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("temp").exists());
    }

    #[test]
    #[cfg(unix)]
    fn inference_exit_status_is_external_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("face.mp4");
        std::fs::write(&media, b"video").unwrap();
        let mut config = config_in(dir.path());
        config.inference.extra_args = vec![];
        config.inference.program = "sh".into();
        // sh reads the first argument as a script path; make it one that fails loudly.
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo 'CUDA out of memory' >&2\nexit 1\n").unwrap();
        config.inference.script = Some(script);
        let (tts, _) = fake(false);
        let generator = Generator::with_synthesizer(config, tts);

        let err = generator.generate(&GenerationRequest::new("hi", &media, false)).unwrap_err();
        match err {
            GenerateError::ExternalProcess { ref status, ref detail } => {
                assert!(status.contains('1'));
                assert_eq!(detail, "CUDA out of memory");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dir.path().join("temp").exists());
    }

    #[test]
    #[cfg(unix)]
    fn success_without_output_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("face.mp4");
        std::fs::write(&media, b"video").unwrap();
        let mut config = config_in(dir.path());
        config.inference.program = "true".into();
        let (tts, _) = fake(false);
        let generator = Generator::with_synthesizer(config, tts);

        let err = generator.generate(&GenerationRequest::new("hi", &media, false)).unwrap_err();
        assert!(err.to_string().contains("produced no video"));
    }

    #[test]
    fn preflight_reports_missing_pieces() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.inference.script = Some(PathBuf::from("inference.py"));
        config.inference.working_dir = Some(dir.path().join("Wav2Lip"));
        config.media.ffmpeg = "definitely-not-ffmpeg".into();
        config.media.ffprobe = "definitely-not-ffprobe".into();
        let problems = Generator::new(config).preflight();
        assert_eq!(problems.len(), 5);
        assert!(problems[0].contains("checkpoint"));
        assert!(problems[1].contains("working dir"));
        assert!(problems[2].contains("inference.py"));
        assert!(problems[3].contains("definitely-not-ffmpeg"));
        assert!(problems[4].contains("definitely-not-ffprobe"));
    }

    #[test]
    #[cfg(unix)]
    fn preflight_flags_missing_ffprobe_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.inference.script = None;
        config.media.ffmpeg = "true".into();
        config.media.ffprobe = "definitely-not-ffprobe".into();
        let problems = Generator::new(config).preflight();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("checkpoint"));
        assert!(problems[1].contains("definitely-not-ffprobe"));
    }

    #[test]
    fn request_deserializes_with_default_mode() {
        let r: GenerationRequest =
            serde_json::from_str(r#"{"text": "hello", "media_path": "in.mp4"}"#).unwrap();
        assert!(!r.is_static);
        assert_eq!(r.media_path, PathBuf::from("in.mp4"));
    }
}
