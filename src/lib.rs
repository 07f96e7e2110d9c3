//! Lip feature tracking for telling apart a handful of mouth shapes
//! ("sounds") from webcam or file video.
//!
//! Every frame is blended with its predecessors, the largest face is located
//! and stabilized, mouth keypoints are extracted and aligned with the previous
//! frame so that a column of the resulting track follows one physical feature.
//! Unstable columns are trimmed and the live track is scored against a
//! library of reference tracks, one per [`SoundClass`].
//!
//! Face and keypoint detection are supplied by the caller through the
//! [`FaceDetector`] and [`KeypointDetector`] traits.

pub mod algorithms;
pub mod config;
pub mod error;
pub mod sound;
pub mod system;
pub mod tracking;

pub use config::{MouthRegion, TrackerConfig};
pub use error::{Error, Result};
pub use sound::{classify, ScoreMode, ScoreVector, SoundClass};
pub use system::{build_reference, LipReader, Recognition, ReferenceLibrary};
pub use tracking::{
    face::{FaceDetector, FaceStabilizer, Rect},
    features::{FastKeypointDetector, Keypoint, KeypointDetector},
    frame::{KeypointFrame, KeypointTrack},
    tracker::{TrackedFrame, Tracker},
};
