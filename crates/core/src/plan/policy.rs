//! Encoding policy shared by every file of a run.

/// Codec value meaning "pass the stream through untouched".
pub const COPY: &str = "copy";

/// How streams are re-encoded and when work is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub video_codec: String,
    /// Only used when `video_codec` is not `copy`.
    pub video_preset: String,
    pub video_suffix: String,
    pub audio_codec: String,
    /// Only used when `audio_codec` is not `copy`.
    pub audio_bitrate: String,
    pub force_overwrite: bool,
    /// Never run subtitle extraction and never use a subtitle sidecar.
    pub subtitle_extraction_disabled: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            video_codec: "libx265".to_string(),
            video_preset: "slow".to_string(),
            video_suffix: ".mp4".to_string(),
            audio_codec: COPY.to_string(),
            audio_bitrate: "256k".to_string(),
            force_overwrite: false,
            subtitle_extraction_disabled: false,
        }
    }
}

impl Policy {
    pub fn reencodes_video(&self) -> bool {
        self.video_codec != COPY
    }

    pub fn reencodes_audio(&self) -> bool {
        self.audio_codec != COPY
    }
}
