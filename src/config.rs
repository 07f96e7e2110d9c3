use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sound::ScoreMode,
};

/// Smallest step the live threshold may be lowered by, bounding the number
/// of retries of an adaptive trim.
pub const MIN_PERSISTENCE_STEP: f32 = 0.01;

/// Rectangle of the mouth relative to the face once it has been resized
/// to the working resolution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouthRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Tuning values shared by every stage of the tracking pipeline.
///
/// Missing fields fall back to [`TrackerConfig::default`] when the
/// configuration is read from JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of raw frames averaged together before face detection.
    pub blend_window: usize,
    /// Number of face boxes averaged to stabilize the face rectangle.
    pub face_history: usize,
    /// Number of aligned keypoint frames kept while classifying live input.
    pub feature_history: usize,
    /// Squared pixel distance under which two keypoints are the same feature.
    pub proximity_threshold: f32,
    /// First persistence threshold tried on the live history.
    pub live_persistence: f32,
    /// Threshold the live history falls back to when too few features survive.
    pub fallback_persistence: f32,
    /// Amount the fallback threshold is lowered on every retry.
    pub persistence_step: f32,
    /// Number of tracked columns the live history should keep.
    pub min_tracked_features: usize,
    pub working_width: u32,
    pub working_height: u32,
    pub mouth_region: MouthRegion,
    /// Threshold handed to the built-in FAST keypoint detector.
    pub detector_sensitivity: u8,
    /// Keep only the largest detections of every frame.
    pub max_keypoints: Option<usize>,
    pub score_mode: ScoreMode,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        const WORKING_HEIGHT: u32 = 560;

        Self {
            blend_window: 3,
            face_history: 5,
            feature_history: 18,
            proximity_threshold: 20.0,
            live_persistence: 0.7,
            fallback_persistence: 0.65,
            persistence_step: 0.05,
            min_tracked_features: 10,
            working_width: 480,
            working_height: WORKING_HEIGHT,
            mouth_region: MouthRegion {
                x: 120,
                y: 395,
                width: 240,
                height: WORKING_HEIGHT - 405,
            },
            detector_sensitivity: 20,
            max_keypoints: None,
            score_mode: ScoreMode::Performance,
        }
    }
}

impl TrackerConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        macro_rules! ensure {
            ($cond:expr, $($msg:tt)+) => {
                if !($cond) {
                    return Err(Error::InvalidConfig(format!($($msg)+)));
                }
            };
        }

        ensure!(self.blend_window > 0, "blend_window must be at least 1");
        ensure!(self.face_history > 0, "face_history must be at least 1");
        ensure!(self.feature_history > 0, "feature_history must be at least 1");
        ensure!(
            self.proximity_threshold.is_finite() && self.proximity_threshold > 0.0,
            "proximity_threshold must be positive and finite, got {}",
            self.proximity_threshold
        );
        for (name, value) in [
            ("live_persistence", self.live_persistence),
            ("fallback_persistence", self.fallback_persistence),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{name} must lie in [0, 1], got {value}"
            );
        }
        ensure!(
            self.persistence_step.is_finite() && self.persistence_step >= MIN_PERSISTENCE_STEP,
            "persistence_step must be finite and at least {MIN_PERSISTENCE_STEP}, got {}",
            self.persistence_step
        );
        ensure!(
            self.working_width > 0 && self.working_height > 0,
            "working resolution {}x{} is empty",
            self.working_width,
            self.working_height
        );

        let MouthRegion {
            x,
            y,
            width,
            height,
        } = self.mouth_region;
        ensure!(width > 0 && height > 0, "mouth_region is empty");
        ensure!(
            x.checked_add(width)
                .is_some_and(|right| right <= self.working_width)
                && y.checked_add(height)
                    .is_some_and(|bottom| bottom <= self.working_height),
            "mouth_region ({x}, {y}, {width}, {height}) exceeds the {}x{} working resolution",
            self.working_width,
            self.working_height
        );

        Ok(())
    }
}
