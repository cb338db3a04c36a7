//! File naming conventions around a recording.

use std::path::{Path, PathBuf};

/// Destination of the converted file: the source with its extension
/// replaced by `suffix` (".mp4" and "mp4" are both accepted).
pub fn output_path(source: &Path, suffix: &str) -> PathBuf {
    source.with_extension(suffix.trim_start_matches('.'))
}

/// Subtitle sidecar produced by the extraction tool.
pub fn subtitle_path(source: &Path) -> PathBuf {
    source.with_extension("srt")
}

/// Where the EPG metadata sidecar is kept.
pub fn epg_path(source: &Path) -> PathBuf {
    source.with_extension("epg.xml")
}

/// Name the extraction tool gives its EPG dump: `<stem>_epg.xml` next to
/// the source.
pub fn extracted_epg_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    source.with_file_name(format!("{stem}_epg.xml"))
}

/// Encoder output inside the per-run temporary directory.
pub fn temporary_output(tmp_dir: &Path, suffix: &str) -> PathBuf {
    tmp_dir.join(format!("video.{}", suffix.trim_start_matches('.')))
}
