//! External programs the conversion delegates to.
//! Probing, subtitle extraction and encoding all go through the
//! [`Toolchain`] trait so the conversion runner can be tested without them.

use crate::catalog::{ProbeFormat, StreamDescriptor};
use crate::error::{ConvertError, Result};
use crate::paths;
use crate::plan::MuxPlan;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info, trace, warn};

/// The three external collaborators of a conversion run.
pub trait Toolchain {
    /// List the elementary streams of `source`.
    fn probe(&self, source: &Path) -> Result<Vec<StreamDescriptor>>;

    /// Produce the `.srt` and `.epg.xml` sidecars for `source`.
    fn extract_subtitles(&self, source: &Path) -> Result<()>;

    /// Run the encoder for `plan`, writing to `output`. Returns whether the
    /// encoder exited successfully; callers must not rely on it.
    fn encode(&self, plan: &MuxPlan, output: &Path) -> Result<bool>;
}

/// [`Toolchain`] backed by `ffprobe`, `ccextractor` and `ffmpeg`.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
    pub ccextractor: PathBuf,
    pub probe_format: ProbeFormat,
}

impl Default for ExternalTools {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
            ccextractor: PathBuf::from("ccextractor"),
            probe_format: ProbeFormat::default(),
        }
    }
}

/// Arguments for `ffprobe` in the given output shape.
pub fn ffprobe_args(source: &Path, format: ProbeFormat) -> Vec<String> {
    let source = source.display().to_string();
    match format {
        ProbeFormat::Text => vec!["-hide_banner".to_string(), source],
        ProbeFormat::Json => vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_streams".to_string(),
            "-of".to_string(),
            "json".to_string(),
            source,
        ],
    }
}

/// Arguments for `ccextractor`: OCR the DVB subtitles to SRT and dump the
/// EPG of the current programme.
pub fn ccextractor_args(source: &Path) -> Vec<String> {
    vec![
        source.display().to_string(),
        "-codec".to_string(),
        "dvbsub".to_string(),
        "--nofontcolor".to_string(),
        "-xmltv".to_string(),
        "1".to_string(),
        "-xmltvonlycurrent".to_string(),
    ]
}

fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
    match last {
        Some(line) => format!("{}: {}", output.status, line.trim()),
        None => output.status.to_string(),
    }
}

impl Toolchain for ExternalTools {
    fn probe(&self, source: &Path) -> Result<Vec<StreamDescriptor>> {
        trace!(
            "probe(source={}, format={})",
            source.display(),
            self.probe_format
        );
        let probe_error = |reason: String| ConvertError::Probe {
            path: source.to_path_buf(),
            reason,
        };
        let output = Command::new(&self.ffprobe)
            .args(ffprobe_args(source, self.probe_format))
            .output()
            .map_err(|e| probe_error(e.to_string()))?;
        if !output.status.success() {
            return Err(probe_error(describe_failure(&output)));
        }
        // The text listing goes to stderr, JSON to stdout.
        let text = match self.probe_format {
            ProbeFormat::Text => String::from_utf8_lossy(&output.stderr),
            ProbeFormat::Json => String::from_utf8_lossy(&output.stdout),
        };
        let streams = self.probe_format.decode(&text)?;
        debug!("{}: {} streams", source.display(), streams.len());
        Ok(streams)
    }

    fn extract_subtitles(&self, source: &Path) -> Result<()> {
        info!("extracting subtitles from {}", source.display());
        let extraction_error = |reason: String| ConvertError::Extraction {
            path: source.to_path_buf(),
            reason,
        };
        let output = Command::new(&self.ccextractor)
            .args(ccextractor_args(source))
            .output()
            .map_err(|e| extraction_error(e.to_string()))?;
        if !output.status.success() {
            return Err(extraction_error(describe_failure(&output)));
        }
        let dumped = paths::extracted_epg_path(source);
        if dumped.exists() {
            let epg = paths::epg_path(source);
            debug!("renaming {} to {}", dumped.display(), epg.display());
            fs::rename(&dumped, &epg)?;
        }
        Ok(())
    }

    fn encode(&self, plan: &MuxPlan, output: &Path) -> Result<bool> {
        let args = plan.to_args(output);
        trace!("encode: {} {}", self.ffmpeg.display(), args.join(" "));
        let status = Command::new(&self.ffmpeg)
            .args(&args)
            .status()
            .map_err(|e| ConvertError::Encode {
                path: plan.output_path.clone(),
                reason: e.to_string(),
            })?;
        // Recordings often end in garbage that makes ffmpeg exit non-zero
        // after writing a perfectly usable file; the size check decides.
        if !status.success() {
            warn!("{} exited with {}", self.ffmpeg.display(), status);
        }
        Ok(status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builds_probe_arguments() {
        let src = Path::new("rec.ts");
        assert_eq!(
            ffprobe_args(src, ProbeFormat::Json),
            vec!["-v", "error", "-show_streams", "-of", "json", "rec.ts"]
        );
        assert_eq!(
            ffprobe_args(src, ProbeFormat::Text),
            vec!["-hide_banner", "rec.ts"]
        );
    }

    #[test]
    fn builds_extraction_arguments() {
        assert_eq!(
            ccextractor_args(Path::new("rec.ts")),
            vec![
                "rec.ts",
                "-codec",
                "dvbsub",
                "--nofontcolor",
                "-xmltv",
                "1",
                "-xmltvonlycurrent"
            ]
        );
    }

    #[test]
    fn missing_prober_is_a_probe_failure() {
        let dir = tempdir().unwrap();
        let tools = ExternalTools {
            ffprobe: dir.path().join("no-such-ffprobe"),
            ..ExternalTools::default()
        };
        let err = tools.probe(&dir.path().join("rec.ts")).unwrap_err();
        assert!(matches!(err, ConvertError::Probe { .. }));
    }

    #[test]
    fn missing_extractor_is_an_extraction_failure() {
        let dir = tempdir().unwrap();
        let tools = ExternalTools {
            ccextractor: dir.path().join("no-such-ccextractor"),
            ..ExternalTools::default()
        };
        let err = tools
            .extract_subtitles(&dir.path().join("rec.ts"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Extraction { .. }));
    }
}
