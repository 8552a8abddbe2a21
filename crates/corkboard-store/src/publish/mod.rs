//! Publish primitives for the backing file
//!
//! A publish is staged into `<path>.tmp` next to the canonical path and
//! then renamed onto it, so readers of the canonical path only ever see a
//! complete old file or a complete new file.

mod atomic;

pub use atomic::{commit, discard, stage, temp_path};
