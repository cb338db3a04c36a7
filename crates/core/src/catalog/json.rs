//! Decoder for `ffprobe -show_streams -of json` output.

use super::{CodecType, StreamDescriptor};
use crate::error::{ConvertError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

#[derive(Debug, Deserialize)]
struct ProbeDocument {
    streams: Vec<ProbeStream>,
}

/// One entry of the `streams` list. ffprobe leaves out keys it has nothing
/// to say about, so everything except the index is optional.
#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    #[serde(default)]
    codec_name: String,
    #[serde(default)]
    codec_type: String,
    #[serde(default)]
    disposition: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    tags: Option<Tags>,
}

#[derive(Debug, Default, Deserialize)]
struct Tags {
    language: Option<String>,
}

/// ffprobe reports flags as 0/1, but be lenient about booleans and strings.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        _ => false,
    }
}

impl From<ProbeStream> for StreamDescriptor {
    fn from(stream: ProbeStream) -> Self {
        let disposition: BTreeSet<String> = stream
            .disposition
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, v)| is_set(v))
            .map(|(k, _)| k)
            .collect();
        StreamDescriptor {
            source_input: 0,
            stream_index: stream.index,
            codec_type: CodecType::parse(&stream.codec_type),
            codec_name: stream.codec_name,
            language: stream.tags.unwrap_or_default().language,
            disposition,
            raw_remainder: String::new(),
        }
    }
}

/// Decode a whole probe document into descriptors, in the order ffprobe
/// listed them.
pub fn parse_streams(output: &str) -> Result<Vec<StreamDescriptor>> {
    trace!("json::parse_streams: {} bytes", output.len());
    let doc: ProbeDocument = serde_json::from_str(output).map_err(ConvertError::MalformedProbe)?;
    let streams: Vec<StreamDescriptor> = doc.streams.into_iter().map(Into::into).collect();
    debug!("decoded {} streams", streams.len());
    Ok(streams)
}
