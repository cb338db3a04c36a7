//! Parser for the free text stream listing ffprobe prints on stderr.

use super::{CodecType, StreamDescriptor};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::trace;

/// Matches lines such as
/// `Stream #0:1[0x366](swe): Audio: ac3 (AC-3 / 0x332D4341), 48000 Hz`.
fn stream_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^\s*
            Stream\s+\#(?P<input>\d+):(?P<stream>\d+)
            (?:\[0x[0-9a-fA-F]+\])?
            (?:\((?P<lang>[^)\s]+)\))?
            :\s+
            (?P<type>\S+):\s+
            (?P<name>[^\s,]+),?
            \s*(?P<rest>.*?)\s*
            $",
        )
        .expect("stream line pattern is valid")
    })
}

/// Parse a single line. Lines that are not stream lines give `None`.
pub fn parse_line(line: &str) -> Option<StreamDescriptor> {
    let caps = stream_line().captures(line)?;
    let descriptor = StreamDescriptor {
        source_input: caps["input"].parse().ok()?,
        stream_index: caps["stream"].parse().ok()?,
        codec_type: CodecType::parse(&caps["type"]),
        codec_name: caps["name"].to_string(),
        language: caps.name("lang").map(|m| m.as_str().to_string()),
        disposition: BTreeSet::new(),
        raw_remainder: caps["rest"].to_string(),
    };
    trace!("parse_line: {:?}", descriptor);
    Some(descriptor)
}

/// Lazily yield every stream line of `output` in order.
pub fn parse_streams(output: &str) -> impl Iterator<Item = StreamDescriptor> + '_ {
    output.lines().filter_map(parse_line)
}
