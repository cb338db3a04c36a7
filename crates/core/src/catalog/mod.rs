//! Stream catalog built from ffprobe output.
//! Two output shapes are understood: the human readable listing ffprobe
//! prints on stderr, and the JSON document from `-show_streams -of json`.

use crate::error::Result;
use std::collections::BTreeSet;
use std::fmt;

pub mod json;
pub mod text;

/// Codec name of broadcast teletext subtitles, which never make it into the
/// output.
pub const TELETEXT_CODEC: &str = "dvb_teletext";

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl CodecType {
    /// Parse a codec type token, ignoring case. Anything unknown (data,
    /// attachment, ...) is `Other`.
    pub fn parse(token: &str) -> Self {
        if token.eq_ignore_ascii_case("video") {
            CodecType::Video
        } else if token.eq_ignore_ascii_case("audio") {
            CodecType::Audio
        } else if token.eq_ignore_ascii_case("subtitle") {
            CodecType::Subtitle
        } else {
            CodecType::Other
        }
    }
}

/// One elementary stream as reported by the prober.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Input container the stream belongs to (0 is the recording itself).
    pub source_input: u32,
    /// Index of the stream within its input.
    pub stream_index: u32,
    pub codec_type: CodecType,
    pub codec_name: String,
    pub language: Option<String>,
    /// Names of the disposition flags that are set.
    pub disposition: BTreeSet<String>,
    /// Rest of the probe line, kept for diagnostics.
    pub raw_remainder: String,
}

impl StreamDescriptor {
    /// The `input:stream` specifier ffmpeg's `-map` expects.
    pub fn map_source(&self) -> String {
        format!("{}:{}", self.source_input, self.stream_index)
    }

    pub fn is_teletext(&self) -> bool {
        self.codec_name == TELETEXT_CODEC
    }

    /// True for subtitle streams that are carried into the output.
    pub fn is_mappable_subtitle(&self) -> bool {
        self.codec_type == CodecType::Subtitle && !self.is_teletext()
    }
}

/// Shape of the probe output handed to the catalog builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeFormat {
    /// Free text stream listing, as printed by plain `ffprobe <file>`.
    Text,
    /// `ffprobe -show_streams -of json`.
    #[default]
    Json,
}

impl ProbeFormat {
    /// Decode probe output into descriptors in probe order.
    pub fn decode(self, output: &str) -> Result<Vec<StreamDescriptor>> {
        match self {
            ProbeFormat::Text => Ok(text::parse_streams(output).collect()),
            ProbeFormat::Json => json::parse_streams(output),
        }
    }
}

impl fmt::Display for ProbeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFormat::Text => f.write_str("text"),
            ProbeFormat::Json => f.write_str("json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_type_is_case_insensitive() {
        assert_eq!(CodecType::parse("Video"), CodecType::Video);
        assert_eq!(CodecType::parse("audio"), CodecType::Audio);
        assert_eq!(CodecType::parse("SUBTITLE"), CodecType::Subtitle);
        assert_eq!(CodecType::parse("data"), CodecType::Other);
    }

    #[test]
    fn both_formats_decode_to_the_same_descriptor() {
        let text = "  Stream #0:2[0xc37](fin): Subtitle: dvb_subtitle ([6][0][0][0] / 0x0006)\n";
        let json = r#"{"streams": [{"index": 2, "codec_name": "dvb_subtitle",
            "codec_type": "subtitle", "disposition": {"default": 0},
            "tags": {"language": "fin"}}]}"#;
        let from_text = ProbeFormat::Text.decode(text).unwrap();
        let from_json = ProbeFormat::Json.decode(json).unwrap();
        assert_eq!(from_text.len(), 1);
        assert_eq!(from_json.len(), 1);
        for s in [&from_text[0], &from_json[0]] {
            assert_eq!(s.map_source(), "0:2");
            assert_eq!(s.codec_type, CodecType::Subtitle);
            assert_eq!(s.language.as_deref(), Some("fin"));
            assert!(s.is_mappable_subtitle());
        }
    }
}
