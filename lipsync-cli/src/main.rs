//! lipsync CLI: generate a lip-synced video, inspect hyperparameters, check the setup.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use lipsync_core::{image_list, AppConfig, GenerationRequest, Generator, HParamValue, DEFAULT_CONFIG_FILE};
use log::{debug, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lipsync", about = "Turn text and a face into a lip-synced video")]
struct Cli {
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    /// Config file; `lipsync.toml` is used when present, defaults otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Speak text over a video or still image
    Generate(GenerateArgs),
    /// Print the model hyperparameters
    Hparams(HparamsArgs),
    /// Report missing checkpoint, script or tools
    Check,
    /// List training samples named in filelists/<split>.txt
    Filelist(FilelistArgs),
}

#[derive(Args)]
struct FilelistArgs {
    /// Preprocessed dataset root the entries are relative to
    #[arg(long)]
    data_root: PathBuf,

    /// Split name, e.g. train or val
    #[arg(long, default_value = "train")]
    split: String,

    #[arg(long, default_value = "filelists")]
    filelists_dir: PathBuf,
}

#[derive(Args)]
struct GenerateArgs {
    /// Text to speak
    #[arg(short, long, conflicts_with = "text_file", required_unless_present = "text_file")]
    text: Option<String>,

    /// Read the text to speak from a file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Face video, or a still image with --static
    #[arg(short, long)]
    media: PathBuf,

    /// The media is a still image; render it to a clip as long as the speech
    #[arg(long = "static")]
    is_static: bool,
}

#[derive(Args)]
struct HparamsArgs {
    /// Override a value, e.g. --set fps=30 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    overrides: Vec<(String, HParamValue)>,

    /// Print as JSON for the model code instead of the debug listing
    #[arg(long)]
    json: bool,
}

fn parse_key_val(s: &str) -> Result<(String, HParamValue), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    let k = k.trim();
    if k.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((k.to_string(), HParamValue::parse_literal(v)))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    pretty_env_logger::formatted_builder()
        .filter_module("lipsync_cli", cli.verbosity.log_level_filter())
        .filter_module("lipsync_core", cli.verbosity.log_level_filter())
        .init();

    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Generate(args) => run_generate(config, args),
        Commands::Hparams(args) => run_hparams(&config, args),
        Commands::Check => run_check(config),
        Commands::Filelist(args) => run_filelist(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load_path(p)?,
        None => AppConfig::load_or_default(&PathBuf::from(DEFAULT_CONFIG_FILE))?,
    };
    debug!("config: {:?}", config);
    Ok(config)
}

fn run_generate(config: AppConfig, args: GenerateArgs) -> Result<()> {
    let text = match (args.text, args.text_file) {
        (Some(t), _) => t,
        (None, Some(f)) => std::fs::read_to_string(&f).with_context(|| format!("read {}", f.display()))?,
        (None, None) => anyhow::bail!("no text given"),
    };
    let generator = Generator::new(config);
    let request = GenerationRequest::new(text, args.media, args.is_static);
    let out = generator
        .generate(&request)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("{}", out.display());
    Ok(())
}

fn run_hparams(config: &AppConfig, args: HparamsArgs) -> Result<()> {
    let hparams = config.hparams().with_overrides(args.overrides);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&hparams)?);
    } else {
        println!("{}", hparams.debug_string());
    }
    Ok(())
}

fn run_check(config: AppConfig) -> Result<()> {
    let problems = Generator::new(config).preflight();
    if problems.is_empty() {
        info!("setup looks complete");
        println!("ok");
        return Ok(());
    }
    for p in &problems {
        println!("{p}");
    }
    anyhow::bail!("{} problem(s) found", problems.len())
}

fn run_filelist(args: FilelistArgs) -> Result<()> {
    let entries = image_list(&args.data_root, &args.split, &args.filelists_dir)?;
    debug!("{} entries in split {}", entries.len(), args.split);
    for e in entries {
        println!("{}", e.display());
    }
    Ok(())
}
