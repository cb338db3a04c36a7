//! Core of the ts2mp4 converter.
//! Probe output is turned into a stream catalog, the catalog into an ffmpeg
//! mux plan, and the plan is run through the external tools per input file.

pub mod catalog;
pub mod convert;
pub mod error;
pub mod paths;
pub mod plan;
pub mod tools;

pub use catalog::{CodecType, ProbeFormat, StreamDescriptor};
pub use convert::{Converter, Outcome};
pub use error::{ConvertError, Result};
pub use plan::{Directive, MuxPlan, Policy};
pub use tools::{ExternalTools, Toolchain};
