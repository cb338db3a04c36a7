//! Binary entry point for the recording converter.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use ts2mp4_core::{Converter, ExternalTools, Outcome, Policy, ProbeFormat, Toolchain};

/// Shape of the ffprobe output to request and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProbeFormatArg {
    Text,
    Json,
}

impl From<ProbeFormatArg> for ProbeFormat {
    fn from(arg: ProbeFormatArg) -> Self {
        match arg {
            ProbeFormatArg::Text => ProbeFormat::Text,
            ProbeFormatArg::Json => ProbeFormat::Json,
        }
    }
}

/// Convert raw broadcast .TS recordings to MP4 with ffmpeg.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Path to .ts file(s) to convert.
    #[arg(value_name = "TS-FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Video codec to use (or 'copy' to leave it unchanged).
    #[arg(long, env = "TS2MP4_VIDEO_CODEC", default_value = "libx265")]
    video_codec: String,

    /// Video codec preset.
    #[arg(long, env = "TS2MP4_VIDEO_PRESET", default_value = "slow")]
    video_preset: String,

    /// Video suffix to use.
    #[arg(long, env = "TS2MP4_VIDEO_SUFFIX", default_value = ".mp4")]
    video_suffix: String,

    /// Audio codec to use (or 'copy' to leave it unchanged).
    #[arg(long, env = "TS2MP4_AUDIO_CODEC", default_value = "copy")]
    audio_codec: String,

    /// Audio bitrate to use (if not 'copy' codec).
    #[arg(long, env = "TS2MP4_AUDIO_BITRATE", default_value = "256k")]
    audio_bitrate: String,

    /// Redo conversions even if the output exists.
    #[arg(short, long)]
    force: bool,

    /// Do not run subtitle extraction and ignore existing .srt sidecars.
    #[arg(long)]
    no_subtitle_extraction: bool,

    /// Print each mux plan as JSON before encoding.
    #[arg(long)]
    report: bool,

    /// Which ffprobe output to parse streams from.
    #[arg(long, value_enum, env = "TS2MP4_PROBE_FORMAT", default_value = "json")]
    probe_format: ProbeFormatArg,

    #[arg(long, env = "TS2MP4_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[arg(long, env = "TS2MP4_FFPROBE", default_value = "ffprobe")]
    ffprobe: PathBuf,

    #[arg(long, env = "TS2MP4_CCEXTRACTOR", default_value = "ccextractor")]
    ccextractor: PathBuf,

    /// Enable verbose debug and trace logs.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn policy(&self) -> Policy {
        Policy {
            video_codec: self.video_codec.clone(),
            video_preset: self.video_preset.clone(),
            video_suffix: self.video_suffix.clone(),
            audio_codec: self.audio_codec.clone(),
            audio_bitrate: self.audio_bitrate.clone(),
            force_overwrite: self.force,
            subtitle_extraction_disabled: self.no_subtitle_extraction,
        }
    }

    fn tools(&self) -> ExternalTools {
        ExternalTools {
            ffprobe: self.ffprobe.clone(),
            ffmpeg: self.ffmpeg.clone(),
            ccextractor: self.ccextractor.clone(),
            probe_format: self.probe_format.into(),
        }
    }
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::default()
            .add_directive("ts2mp4=trace".parse()?)
            .add_directive("ts2mp4_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("ts2mp4=info".parse()?)
            .add_directive("ts2mp4_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Converts every input in turn. A failing file does not stop the rest; the
/// returned exit status is 1 if any output was rejected, otherwise 2 if
/// anything else failed.
fn convert_all<T: Toolchain>(converter: &Converter<T>, inputs: &[PathBuf]) -> u8 {
    let mut status = 0;
    for input in inputs {
        match converter.run(input) {
            Ok(Outcome::Skipped) => info!("{}: already converted", input.display()),
            Ok(Outcome::Committed(out)) => info!("{}: done, {}", input.display(), out.display()),
            Err(err) => {
                error!("{}: {}", input.display(), err);
                let code = err.exit_code();
                if status == 0 || code < status {
                    status = code;
                }
            }
        }
    }
    status
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;
    let converter = Converter::new(cli.tools(), cli.policy()).with_report(cli.report);
    Ok(ExitCode::from(convert_all(&converter, &cli.inputs)))
}
