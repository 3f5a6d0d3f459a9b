//! Text-to-speech engines. The orchestrator only sees [`SpeechSynthesizer`].

use crate::config::SpeechConfig;
use crate::process::run_with_stdin;
use anyhow::Context;
use log::{debug, info};
use reqwest::blocking::Client;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

/// Longest text the Google endpoint accepts per request, in characters.
pub const GOOGLE_MAX_CHARS: usize = 100;

const USER_AGENT: &str = concat!("lipsync/", env!("CARGO_PKG_VERSION"));

pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;
    /// File extension of the audio this engine writes.
    fn extension(&self) -> &str;
    fn synthesize(&self, text: &str, out: &Path) -> anyhow::Result<()>;
}

/// Build the engine selected in config.
pub fn from_config(config: &SpeechConfig) -> Box<dyn SpeechSynthesizer> {
    match config {
        SpeechConfig::Google { language, endpoint } => Box::new(GoogleTts {
            language: language.clone(),
            endpoint: endpoint.clone(),
        }),
        SpeechConfig::Command {
            program,
            args,
            extension,
        } => Box::new(CommandTts {
            program: program.clone(),
            args: args.clone(),
            extension: extension.clone(),
        }),
    }
}

/// Google Translate's TTS endpoint. Returns MP3.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    pub language: String,
    pub endpoint: String,
}

impl SpeechSynthesizer for GoogleTts {
    fn name(&self) -> &str {
        "google"
    }

    fn extension(&self) -> &str {
        "mp3"
    }

    fn synthesize(&self, text: &str, out: &Path) -> anyhow::Result<()> {
        let chunks = chunk_text(text, GOOGLE_MAX_CHARS);
        if chunks.is_empty() {
            anyhow::bail!("no text to speak");
        }
        let now = Instant::now();
        // Built per call: a blocking client must not live inside an async runtime.
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            debug!("requesting chunk {}/{}: {:?}", idx + 1, chunks.len(), chunk);
            let bytes = client
                .get(&self.endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", self.language.as_str()),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.to_string().as_str()),
                    ("textlen", chunk.chars().count().to_string().as_str()),
                ])
                .send()
                .with_context(|| format!("request speech from {}", self.endpoint))?
                .error_for_status()?
                .bytes()?;
            if bytes.is_empty() {
                anyhow::bail!("speech service returned no audio for chunk {}", idx + 1);
            }
            audio.extend_from_slice(&bytes);
        }
        std::fs::write(out, &audio).with_context(|| format!("write {}", out.display()))?;
        info!("synthesized {} bytes in {:?}", audio.len(), now.elapsed());
        Ok(())
    }
}

/// Local TTS program: text on stdin and in `LIPSYNC_TEXT`, audio on stdout.
#[derive(Debug, Clone)]
pub struct CommandTts {
    pub program: String,
    pub args: Vec<String>,
    pub extension: String,
}

impl SpeechSynthesizer for CommandTts {
    fn name(&self) -> &str {
        &self.program
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn synthesize(&self, text: &str, out: &Path) -> anyhow::Result<()> {
        if text.trim().is_empty() {
            anyhow::bail!("no text to speak");
        }
        let now = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).env("LIPSYNC_TEXT", text);
        let output = run_with_stdin(&mut cmd, text.as_bytes())?;
        if output.stdout.is_empty() {
            anyhow::bail!("{} produced no audio", self.program);
        }
        std::fs::write(out, &output.stdout).with_context(|| format!("write {}", out.display()))?;
        info!("synthesized {} bytes in {:?}", output.stdout.len(), now.elapsed());
        Ok(())
    }
}

const CLAUSE_END: &[char] = &['.', ',', ';', ':', '!', '?'];

fn joined_len(words: &[&str]) -> usize {
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len().saturating_sub(1)
}

/// Split text into chunks of at most `max_chars` characters on whitespace,
/// preferring to break after a word ending in `.,;:!?` when a chunk overflows.
/// Words longer than the limit are cut into their own chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(current.join(" "));
                current.clear();
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }
        while !current.is_empty() && joined_len(&current) + 1 + word_len > max_chars {
            let cut = current
                .iter()
                .rposition(|w| w.ends_with(CLAUSE_END))
                .map(|i| i + 1)
                .filter(|&i| i < current.len())
                .unwrap_or(current.len());
            let rest = current.split_off(cut);
            chunks.push(current.join(" "));
            current = rest;
        }
        current.push(word);
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}
