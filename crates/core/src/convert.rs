//! Conversion of one recording: skip check, probe, optional subtitle
//! extraction, plan, encode, size check and commit.

use crate::error::{ConvertError, Result};
use crate::paths;
use crate::plan::{self, Policy};
use crate::tools::Toolchain;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Prefix of the per-run scratch directory created next to the source.
pub const TMP_DIR_PREFIX: &str = "ts2mp4-tmp-";

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The destination already existed and overwriting was not forced.
    Skipped,
    /// The converted file was moved into place at the given path.
    Committed(PathBuf),
}

/// The encoder output is accepted only when it is larger than 1% of the
/// source; anything smaller is a failed or truncated encode.
pub fn accept_output(output_size: u64, source_size: u64) -> bool {
    u128::from(output_size) * 100 > u128::from(source_size)
}

/// Runs conversions with a fixed policy and toolchain.
pub struct Converter<T: Toolchain> {
    tools: T,
    policy: Policy,
    report: bool,
}

impl<T: Toolchain> Converter<T> {
    pub fn new(tools: T, policy: Policy) -> Self {
        Self {
            tools,
            policy,
            report: false,
        }
    }

    /// Print every synthesized plan as JSON on stdout before encoding.
    pub fn with_report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    /// Convert `source`. The scratch directory is removed on every path out
    /// of this function, and an existing destination is only ever replaced
    /// by an accepted output.
    pub fn run(&self, source: &Path) -> Result<Outcome> {
        trace!("run(source={})", source.display());
        let destination = paths::output_path(source, &self.policy.video_suffix);
        if destination.exists() && !self.policy.force_overwrite {
            info!("{} exists, skipping", destination.display());
            return Ok(Outcome::Skipped);
        }

        let parent = match source.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp_dir = tempfile::Builder::new()
            .prefix(TMP_DIR_PREFIX)
            .tempdir_in(parent)?;
        debug!("working in {}", tmp_dir.path().display());

        let catalog = self.tools.probe(source)?;
        info!("{}: {} streams", source.display(), catalog.len());

        let srt = paths::subtitle_path(source);
        let has_subtitles = catalog.iter().any(|s| s.is_mappable_subtitle());
        if has_subtitles && !self.policy.subtitle_extraction_disabled && !srt.exists() {
            self.tools.extract_subtitles(source)?;
        }
        let sidecar = srt.exists().then_some(srt.as_path());

        let plan = plan::synthesize(source, &catalog, &self.policy, sidecar)?;
        let tmp_output = paths::temporary_output(tmp_dir.path(), &self.policy.video_suffix);
        info!("ffmpeg {}", plan.to_args(&tmp_output).join(" "));
        if self.report {
            let report = serde_json::to_string_pretty(&plan).map_err(ConvertError::Report)?;
            println!("{report}");
        }

        let exited_cleanly = self.tools.encode(&plan, &tmp_output)?;
        let source_size = fs::metadata(source)?.len();
        let output_size = fs::metadata(&tmp_output).map(|m| m.len()).unwrap_or(0);
        debug!(
            "encoder finished (clean exit: {}), {} of {} bytes",
            exited_cleanly, output_size, source_size
        );
        if !tmp_output.exists() || !accept_output(output_size, source_size) {
            return Err(ConvertError::RejectedOutput {
                path: source.to_path_buf(),
                output_size,
                source_size,
            });
        }
        fs::rename(&tmp_output, &plan.output_path)?;
        info!("wrote {}", plan.output_path.display());
        Ok(Outcome::Committed(plan.output_path))
    }
}
