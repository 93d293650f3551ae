pub mod bvh;

pub use bvh::{BvhFile, Channel, Joint, MotionTable, Skeleton};
