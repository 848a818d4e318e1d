//! Inbound stream ingestion
//!
//! Each accepted connection is read by [`read_frames`], which splits the
//! stream on the zero byte and appends every frame to the shared buffer.
//! Frames from one connection keep their order; frames from different
//! connections interleave freely.

pub mod frame;
pub mod reader;

pub use frame::{FrameSplitter, FrameTooLarge, DELIMITER};
pub use reader::{read_frames, ReadSummary};
