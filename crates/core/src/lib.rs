//! Subtitle timeline engine: cue editing, playback sync, SRT codec and versioned saves.

pub mod config;
pub mod editor;
pub mod error;
pub mod playback;
pub mod remote;
pub mod session;
pub mod srt;
pub mod store;
pub mod version;

pub use error::{Error, ErrorKind, Result, SaveFailure};
