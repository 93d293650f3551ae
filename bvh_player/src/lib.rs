//! Playback layer over `bvh_formats`: owns a parsed file and a playhead,
//! re-binding the skeleton whenever the playhead moves so view code can read
//! joint transforms directly.

pub mod playback;

pub use playback::{Direction, Playback};
