//! Per-stream tracking state: face stabilization, keypoint detection and
//! the frame-by-frame driver tying them to the algorithms.

pub mod face;
pub mod features;
pub mod frame;
pub mod tracker;
