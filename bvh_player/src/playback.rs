use std::path::Path;

use anyhow::Result;
use bvh_formats::{BvhFile, MotionTable, Skeleton};

/// Direction of a single-frame step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A loaded animation and its playhead. Independent playbacks can coexist;
/// each owns its skeleton and motion table outright.
#[derive(Debug, Clone)]
pub struct Playback {
    skeleton: Skeleton,
    motion: MotionTable,
    current_frame: usize,
}

impl Playback {
    /// Takes ownership of a parsed file and binds its first frame, when one
    /// exists.
    pub fn new(file: BvhFile) -> Self {
        let mut playback = Playback {
            skeleton: file.skeleton,
            motion: file.motion,
            current_frame: 0,
        };
        playback.rebind();
        playback
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BvhFile::load(path)?))
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn motion(&self) -> &MotionTable {
        &self.motion
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn frame_count(&self) -> usize {
        self.motion.frame_count()
    }

    /// Seconds per frame, 0.0 when the file declared none.
    pub fn frame_time(&self) -> f32 {
        self.motion.frame_time()
    }

    /// Jumps to `frame` and binds it. Indices past the end clamp to the
    /// last frame; with no frames at all the pose is left untouched.
    pub fn apply_frame(&mut self, frame: usize) {
        if self.motion.is_empty() {
            return;
        }
        self.current_frame = frame.min(self.motion.frame_count() - 1);
        self.rebind();
    }

    /// Steps one frame forward or backward, wrapping at both ends, and
    /// binds the frame it lands on.
    pub fn advance(&mut self, direction: Direction) {
        let frames = self.motion.frame_count();
        if frames == 0 {
            return;
        }
        self.current_frame = match direction {
            Direction::Forward => {
                if self.current_frame + 1 >= frames {
                    0
                } else {
                    self.current_frame + 1
                }
            }
            Direction::Backward => {
                if self.current_frame == 0 {
                    frames - 1
                } else {
                    self.current_frame - 1
                }
            }
        };
        self.rebind();
    }

    fn rebind(&mut self) {
        let Some(row) = self.motion.row(self.current_frame) else {
            return;
        };
        log::debug!(
            "binding frame {}/{}",
            self.current_frame,
            self.motion.frame_count()
        );
        self.skeleton.apply_row(row);
    }
}
