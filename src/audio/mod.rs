//! Audio container inspection and repair.

pub mod probe;
pub mod reencode;

pub use probe::{AudioProbe, FfprobeProbe, MockProbe};
pub use reencode::{FfmpegReencoder, MockReencoder, Reencoder, temp_artifact_path};
