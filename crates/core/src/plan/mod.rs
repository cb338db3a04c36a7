//! Mux plan synthesis: which source stream goes to which output slot, with
//! which codec and tags.
//!
//! The plan is a pure function of the catalog, the policy and whether a
//! subtitle sidecar is available. Nothing here touches the filesystem.

use crate::catalog::{CodecType, StreamDescriptor};
use crate::error::{ConvertError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

mod policy;

pub use policy::{Policy, COPY};

/// Subtitle codec used for the text track taken from the sidecar.
pub const TEXT_SUBTITLE_CODEC: &str = "mov_text";
/// Subtitle codec used for bitmap subtitles taken from the recording.
pub const IMAGE_SUBTITLE_CODEC: &str = "dvdsub";
/// Raised muxing queue bound; sources with many sparse streams otherwise
/// abort with "Too many packets buffered for output stream".
pub const MAX_MUXING_QUEUE_SIZE: &str = "1024";

/// A single flag/value pair of the encoder command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub flag: String,
    pub value: String,
}

impl Directive {
    pub fn new(flag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: value.into(),
        }
    }
}

/// Everything the encoder needs besides the binary and the place it writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MuxPlan {
    pub inputs: Vec<PathBuf>,
    pub directives: Vec<Directive>,
    pub output_path: PathBuf,
}

impl MuxPlan {
    /// Full ffmpeg argument list writing to `output`.
    pub fn to_args(&self, output: &Path) -> Vec<String> {
        let mut args = vec!["-hide_banner".to_string()];
        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.display().to_string());
        }
        for d in &self.directives {
            args.push(d.flag.clone());
            args.push(d.value.clone());
        }
        args.push(output.display().to_string());
        args
    }
}

#[cfg(test)]
impl MuxPlan {
    /// Whether any `-map` directive takes `input:stream`.
    pub(crate) fn maps(&self, source: &str) -> bool {
        self.directives
            .iter()
            .any(|d| d.flag == "-map" && d.value == source)
    }
}

/// Running state of the single pass over the catalog.
#[derive(Debug, Default)]
struct Cursor {
    directives: Vec<Directive>,
    /// Next output stream slot.
    destination: usize,
    /// Subtitle outputs planned so far, bonus track included.
    subtitle_outputs: usize,
    /// Non-teletext subtitle streams seen so far.
    subtitles_seen: usize,
    bonus_track: bool,
}

impl Cursor {
    fn push(&mut self, flag: impl Into<String>, value: impl Into<String>) {
        self.directives.push(Directive::new(flag, value));
    }

    /// Map the first track of the subtitle sidecar (input 1) as text
    /// subtitles, tagged with the language of the recording's subtitles.
    fn add_bonus_track(&mut self, language: Option<&str>) {
        let slot = self.subtitle_outputs;
        self.push("-map", "1:s:0");
        self.push(format!("-c:s:{slot}"), TEXT_SUBTITLE_CODEC);
        if let Some(lang) = language {
            self.push(format!("-metadata:s:s:{slot}"), format!("language={lang}"));
        }
        self.subtitle_outputs += 1;
        self.destination += 1;
        self.bonus_track = true;
    }

    fn add_stream(mut self, stream: &StreamDescriptor, use_sidecar: bool) -> Result<Self> {
        match stream.codec_type {
            CodecType::Video | CodecType::Audio => {
                self.push("-map", stream.map_source());
            }
            CodecType::Subtitle if stream.is_teletext() => {
                trace!("dropping teletext stream {}", stream.map_source());
                return Ok(self);
            }
            CodecType::Subtitle => {
                if use_sidecar && self.subtitles_seen == 0 {
                    self.add_bonus_track(stream.language.as_deref());
                }
                self.subtitles_seen += 1;
                let slot = self.subtitle_outputs;
                self.push("-map", stream.map_source());
                self.push(format!("-c:s:{slot}"), IMAGE_SUBTITLE_CODEC);
                self.subtitle_outputs += 1;
            }
            CodecType::Other => {
                debug!(
                    "not mapping stream {} ({})",
                    stream.map_source(),
                    stream.codec_name
                );
                return Ok(self);
            }
        }
        let disposition = disposition_value(stream)?;
        self.push(format!("-disposition:{}", self.destination), disposition);
        self.destination += 1;
        Ok(self)
    }
}

/// Value of the `-disposition` directive for a stream: `0` without flags,
/// the flag name with exactly one.
fn disposition_value(stream: &StreamDescriptor) -> Result<String> {
    let mut flags = stream.disposition.iter();
    match (flags.next(), flags.next()) {
        (None, _) => Ok("0".to_string()),
        (Some(flag), None) => Ok(flag.clone()),
        _ => Err(ConvertError::AmbiguousDisposition {
            stream: stream.map_source(),
            flags: stream.disposition.iter().cloned().collect(),
        }),
    }
}

/// Build the mux plan for `source`.
///
/// `subtitle_source` is the subtitle sidecar when one exists on disk; it is
/// ignored when the policy disables subtitle extraction.
pub fn synthesize(
    source: &Path,
    catalog: &[StreamDescriptor],
    policy: &Policy,
    subtitle_source: Option<&Path>,
) -> Result<MuxPlan> {
    trace!(
        "synthesize(source={}, streams={}, sidecar={:?})",
        source.display(),
        catalog.len(),
        subtitle_source
    );
    let sidecar = subtitle_source.filter(|_| !policy.subtitle_extraction_disabled);
    let mut cursor = catalog
        .iter()
        .try_fold(Cursor::default(), |cursor, stream| {
            cursor.add_stream(stream, sidecar.is_some())
        })?;

    cursor.push("-c:v", policy.video_codec.as_str());
    if policy.reencodes_video() {
        cursor.push("-preset", policy.video_preset.as_str());
    }
    cursor.push("-c:a", policy.audio_codec.as_str());
    if policy.reencodes_audio() {
        cursor.push("-b:a", policy.audio_bitrate.as_str());
    }
    cursor.push("-max_muxing_queue_size", MAX_MUXING_QUEUE_SIZE);
    cursor.push("-map_metadata:g", "0:g");

    let mut inputs = vec![source.to_path_buf()];
    if let Some(sidecar) = sidecar.filter(|_| cursor.bonus_track) {
        inputs.push(sidecar.to_path_buf());
    }
    debug!(
        "planned {} output streams ({} subtitles)",
        cursor.destination, cursor.subtitle_outputs
    );
    Ok(MuxPlan {
        inputs,
        directives: cursor.directives,
        output_path: crate::paths::output_path(source, &policy.video_suffix),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::text;
    use std::collections::BTreeSet;

    const FIXTURE: &str = "
    Stream #0:0[0x13a]: Video: h264 (Main) ([27][0][0][0] / 0x001B), yuv420p(tv, bt709, top first), 1920x1080 [SAR 1:1 DAR 16:9], 25 fps, 50 tbr, 90k tbn, 50 tbc
    Stream #0:1[0x366](swe): Audio: ac3 (AC-3 / 0x332D4341), 48000 Hz, 5.1(side), fltp, 448 kb/s
    Stream #0:2[0xc37](fin): Subtitle: dvb_subtitle ([6][0][0][0] / 0x0006)
    Stream #0:4[0xc4f](swe): Subtitle: dvb_subtitle ([6][0][0][0] / 0x0006) (hearing impaired)
    Stream #0:5[0x13ec](fin): Subtitle: dvb_teletext ([6][0][0][0] / 0x0006)
";

    fn catalog() -> Vec<StreamDescriptor> {
        text::parse_streams(FIXTURE).collect()
    }

    fn stream(index: u32, codec_type: CodecType, name: &str, flags: &[&str]) -> StreamDescriptor {
        StreamDescriptor {
            source_input: 0,
            stream_index: index,
            codec_type,
            codec_name: name.to_string(),
            language: None,
            disposition: flags.iter().map(|f| f.to_string()).collect::<BTreeSet<_>>(),
            raw_remainder: String::new(),
        }
    }

    fn pairs(plan: &MuxPlan) -> Vec<(&str, &str)> {
        plan.directives
            .iter()
            .map(|d| (d.flag.as_str(), d.value.as_str()))
            .collect()
    }

    fn position(plan: &MuxPlan, flag: &str, value: &str) -> Option<usize> {
        plan.directives
            .iter()
            .position(|d| d.flag == flag && d.value == value)
    }

    #[test]
    fn plans_recording_with_subtitle_sidecar() {
        let src = Path::new("/rec/show.ts");
        let srt = Path::new("/rec/show.srt");
        let plan = synthesize(src, &catalog(), &Policy::default(), Some(srt)).unwrap();
        assert_eq!(
            pairs(&plan),
            vec![
                ("-map", "0:0"),
                ("-disposition:0", "0"),
                ("-map", "0:1"),
                ("-disposition:1", "0"),
                ("-map", "1:s:0"),
                ("-c:s:0", "mov_text"),
                ("-metadata:s:s:0", "language=fin"),
                ("-map", "0:2"),
                ("-c:s:1", "dvdsub"),
                ("-disposition:3", "0"),
                ("-map", "0:4"),
                ("-c:s:2", "dvdsub"),
                ("-disposition:4", "0"),
                ("-c:v", "libx265"),
                ("-preset", "slow"),
                ("-c:a", "copy"),
                ("-max_muxing_queue_size", "1024"),
                ("-map_metadata:g", "0:g"),
            ]
        );
        assert_eq!(plan.inputs, vec![src.to_path_buf(), srt.to_path_buf()]);
        assert_eq!(plan.output_path, PathBuf::from("/rec/show.mp4"));
    }

    #[test]
    fn never_maps_teletext() {
        let plan = synthesize(
            Path::new("show.ts"),
            &catalog(),
            &Policy::default(),
            Some(Path::new("show.srt")),
        )
        .unwrap();
        assert!(!plan.maps("0:5"));
        // Five output streams: video, audio, bonus, two dvb subtitles.
        assert!(position(&plan, "-disposition:4", "0").is_some());
        assert!(!plan.directives.iter().any(|d| d.flag == "-disposition:5"));
    }

    #[test]
    fn teletext_first_does_not_shift_bonus_track() {
        let streams = vec![
            stream(0, CodecType::Video, "h264", &[]),
            stream(1, CodecType::Subtitle, "dvb_teletext", &[]),
            stream(2, CodecType::Subtitle, "dvb_subtitle", &[]),
        ];
        let plan = synthesize(
            Path::new("a.ts"),
            &streams,
            &Policy::default(),
            Some(Path::new("a.srt")),
        )
        .unwrap();
        let bonus = position(&plan, "-map", "1:s:0").unwrap();
        let own = position(&plan, "-map", "0:2").unwrap();
        assert!(bonus < own);
        assert!(position(&plan, "-disposition:2", "0").is_some());
    }

    #[test]
    fn no_bonus_track_without_sidecar() {
        let plan = synthesize(Path::new("a.ts"), &catalog(), &Policy::default(), None).unwrap();
        assert!(!plan.maps("1:s:0"));
        assert_eq!(plan.inputs.len(), 1);
        assert!(position(&plan, "-c:s:0", "dvdsub").is_some());
        assert!(position(&plan, "-c:s:1", "dvdsub").is_some());
        assert!(position(&plan, "-disposition:3", "0").is_some());
    }

    #[test]
    fn disabled_extraction_ignores_sidecar_and_numbers_from_zero() {
        let policy = Policy {
            subtitle_extraction_disabled: true,
            ..Policy::default()
        };
        let plan = synthesize(
            Path::new("a.ts"),
            &catalog(),
            &policy,
            Some(Path::new("a.srt")),
        )
        .unwrap();
        assert!(!plan.maps("1:s:0"));
        assert_eq!(plan.inputs, vec![PathBuf::from("a.ts")]);
        assert!(!plan.directives.iter().any(|d| d.value == TEXT_SUBTITLE_CODEC));
        assert_eq!(position(&plan, "-c:s:0", "dvdsub"), Some(5));
    }

    #[test]
    fn no_bonus_track_without_mappable_subtitles() {
        let streams = vec![
            stream(0, CodecType::Video, "h264", &[]),
            stream(1, CodecType::Subtitle, "dvb_teletext", &[]),
        ];
        let plan = synthesize(
            Path::new("a.ts"),
            &streams,
            &Policy::default(),
            Some(Path::new("a.srt")),
        )
        .unwrap();
        assert!(!plan.maps("1:s:0"));
        assert_eq!(plan.inputs.len(), 1);
    }

    #[test]
    fn passes_single_disposition_flag_through() {
        let streams = vec![
            stream(0, CodecType::Video, "h264", &[]),
            stream(1, CodecType::Audio, "ac3", &["default"]),
            stream(2, CodecType::Subtitle, "dvb_subtitle", &["hearing_impaired"]),
        ];
        let plan = synthesize(Path::new("a.ts"), &streams, &Policy::default(), None).unwrap();
        assert!(position(&plan, "-disposition:0", "0").is_some());
        assert!(position(&plan, "-disposition:1", "default").is_some());
        assert!(position(&plan, "-disposition:2", "hearing_impaired").is_some());
    }

    #[test]
    fn rejects_multiple_disposition_flags() {
        let streams = vec![stream(3, CodecType::Audio, "ac3", &["default", "forced"])];
        let err = synthesize(Path::new("a.ts"), &streams, &Policy::default(), None).unwrap_err();
        match err {
            ConvertError::AmbiguousDisposition { stream, flags } => {
                assert_eq!(stream, "0:3");
                assert_eq!(flags, vec!["default".to_string(), "forced".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn copy_suppresses_preset_and_bitrate() {
        let copy_all = Policy {
            video_codec: COPY.into(),
            audio_codec: COPY.into(),
            ..Policy::default()
        };
        let plan = synthesize(Path::new("a.ts"), &catalog(), &copy_all, None).unwrap();
        assert!(!plan.directives.iter().any(|d| d.flag == "-preset"));
        assert!(!plan.directives.iter().any(|d| d.flag == "-b:a"));

        let reencode = Policy {
            audio_codec: "aac".into(),
            ..Policy::default()
        };
        let plan = synthesize(Path::new("a.ts"), &catalog(), &reencode, None).unwrap();
        let tail: Vec<_> = pairs(&plan).into_iter().rev().take(6).rev().collect();
        assert_eq!(
            tail,
            vec![
                ("-c:v", "libx265"),
                ("-preset", "slow"),
                ("-c:a", "aac"),
                ("-b:a", "256k"),
                ("-max_muxing_queue_size", "1024"),
                ("-map_metadata:g", "0:g"),
            ]
        );
    }

    #[test]
    fn other_streams_are_not_mapped() {
        let streams = vec![
            stream(0, CodecType::Video, "h264", &[]),
            stream(1, CodecType::Other, "epg", &[]),
            stream(2, CodecType::Audio, "mp2", &[]),
        ];
        let plan = synthesize(Path::new("a.ts"), &streams, &Policy::default(), None).unwrap();
        assert!(!plan.maps("0:1"));
        assert!(position(&plan, "-disposition:1", "0").is_some());
    }

    #[test]
    fn renders_ffmpeg_arguments() {
        let plan = MuxPlan {
            inputs: vec![PathBuf::from("a.ts"), PathBuf::from("a.srt")],
            directives: vec![Directive::new("-map", "0:0")],
            output_path: PathBuf::from("a.mp4"),
        };
        assert_eq!(
            plan.to_args(Path::new("tmp/video.mp4")),
            vec![
                "-hide_banner",
                "-i",
                "a.ts",
                "-i",
                "a.srt",
                "-map",
                "0:0",
                "tmp/video.mp4"
            ]
        );
    }
}
