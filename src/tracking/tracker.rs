use image::{
    imageops::{self, grayscale, FilterType},
    GrayImage, Rgb, RgbImage,
};
use log::{debug, warn};

use crate::{
    algorithms::{
        alignment::align_keypoints,
        blend::FrameBlender,
        trimming::trim_unstable_features,
    },
    config::{MouthRegion, TrackerConfig},
    error::Result,
    tracking::{
        face::{FaceDetector, FaceStabilizer, Rect},
        features::{strongest, FastKeypointDetector, KeypointDetector},
        frame::{column_count, KeypointFrame, KeypointTrack},
    },
};

/// Result of pushing one raw frame through the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFrame {
    /// Stabilized face box in raw frame coordinates.
    pub face: Rect,
    /// Mouth keypoints aligned with the previous frame.
    pub keypoints: KeypointFrame,
}

/// Frame-by-frame driver for one video stream.
///
/// Owns everything that must not leak between streams (blend window, face
/// history and the aligned keypoint history); call [`Tracker::reset`] before
/// reusing it on another source.
pub struct Tracker<F, K> {
    config: TrackerConfig,
    face_detector: F,
    keypoint_detector: K,
    blender: FrameBlender<Rgb<u8>>,
    stabilizer: FaceStabilizer,
    /// The most recent aligned keypoint frames, oldest first
    history: KeypointTrack,
}

impl<F: FaceDetector> Tracker<F, FastKeypointDetector> {
    /// Tracker using the built-in FAST keypoint detector.
    pub fn with_fast_keypoints(config: TrackerConfig, face_detector: F) -> Result<Self> {
        let keypoint_detector = FastKeypointDetector::new(config.detector_sensitivity);
        Self::new(config, face_detector, keypoint_detector)
    }
}

impl<F: FaceDetector, K: KeypointDetector> Tracker<F, K> {
    pub fn new(config: TrackerConfig, face_detector: F, keypoint_detector: K) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            blender: FrameBlender::new(config.blend_window),
            stabilizer: FaceStabilizer::new(config.face_history),
            history: KeypointTrack::with_capacity(config.feature_history),
            config,
            face_detector,
            keypoint_detector,
        })
    }

    /// Settings the tracker was validated and built with.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Blends `raw` with the previous frames, stabilizes the largest face,
    /// detects mouth keypoints and aligns them with the previous frame.
    ///
    /// A frame without a face or keypoints is not an error: it yields a
    /// minimal face box and placeholder keypoints.
    pub fn process_frame(&mut self, raw: RgbImage) -> TrackedFrame {
        let blended = self.blender.push(raw);
        let gray = grayscale(&blended);

        let detections = self.face_detector.detect(&gray);
        if detections.is_empty() {
            debug!("no face detected, holding the face history");
        }
        let face = self.stabilizer.stabilize(&detections);

        let mut detected = match self.mouth_region(&gray, &face) {
            Some(mouth) => self.keypoint_detector.detect_keypoints(&mouth),
            None => {
                warn!("stabilized face {face:?} lies outside the frame");
                Vec::new()
            }
        };
        if let Some(limit) = self.config.max_keypoints {
            detected = strongest(detected, limit);
        }

        let keypoints = match self.history.last() {
            Some(previous) => align_keypoints(previous, &detected, self.config.proximity_threshold),
            None => detected,
        };

        self.history.push(keypoints.clone());
        if self.history.len() > self.config.feature_history {
            let excess = self.history.len() - self.config.feature_history;
            self.history.drain(..excess);
        }

        debug!(
            "face {face:?}, {} keypoints aligned, {} frames of history",
            keypoints.len(),
            self.history.len()
        );

        TrackedFrame { face, keypoints }
    }

    /// Standardizes the face to the working resolution and cuts out the mouth.
    fn mouth_region(&self, gray: &GrayImage, face: &Rect) -> Option<GrayImage> {
        let face = face.clamp_to(gray.width(), gray.height())?;
        let cropped =
            imageops::crop_imm(gray, face.x as u32, face.y as u32, face.width, face.height)
                .to_image();
        let standardized = imageops::resize(
            &cropped,
            self.config.working_width,
            self.config.working_height,
            FilterType::CatmullRom,
        );

        let MouthRegion {
            x,
            y,
            width,
            height,
        } = self.config.mouth_region;
        Some(imageops::crop_imm(&standardized, x, y, width, height).to_image())
    }

    /// Aligned keypoint frames of this stream, oldest first.
    pub fn history(&self) -> &[KeypointFrame] {
        &self.history
    }

    /// Trims the live history at the configured persistence, lowering the
    /// threshold step by step while too few features survive.
    ///
    /// Returns the trimmed track and the threshold that produced it.
    pub fn adaptive_trim(&self) -> (KeypointTrack, f32) {
        let proximity = self.config.proximity_threshold;
        let wanted = self.config.min_tracked_features;

        let mut threshold = self.config.live_persistence;
        let mut trimmed = trim_unstable_features(&self.history, threshold, proximity);

        // validated persistences lie in [0, 1] and the step is bounded below,
        // so the last retry at 0 comes after a bounded number of attempts
        let mut retry = 0u32;
        while threshold > 0.0 && (trimmed.is_empty() || column_count(&trimmed) < wanted) {
            threshold = (self.config.fallback_persistence
                - retry as f32 * self.config.persistence_step)
                .max(0.0);
            trimmed = trim_unstable_features(&self.history, threshold, proximity);
            retry += 1;
        }

        debug!(
            "kept {} features at persistence {threshold:.2}",
            column_count(&trimmed)
        );
        (trimmed, threshold)
    }

    /// Forgets everything learned from the current stream.
    pub fn reset(&mut self) {
        self.blender.reset();
        self.stabilizer.reset();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::features::Keypoint;

    fn tracker_with(
        keypoints: Vec<Vec<Keypoint>>,
    ) -> Tracker<impl FaceDetector, impl KeypointDetector> {
        tracker_configured(
            keypoints,
            TrackerConfig {
                feature_history: 3,
                ..Default::default()
            },
        )
    }

    fn tracker_configured(
        keypoints: Vec<Vec<Keypoint>>,
        config: TrackerConfig,
    ) -> Tracker<impl FaceDetector, impl KeypointDetector> {
        let mut frames = keypoints.into_iter();
        Tracker::new(
            config,
            |_: &GrayImage| vec![Rect::new(10, 10, 60, 70)],
            move |_: &GrayImage| frames.next().unwrap_or_default(),
        )
        .unwrap()
    }

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint::new(x, y, 6.0, 0.0)
    }

    #[test]
    fn keypoints_are_aligned_across_frames() {
        let mut tracker = tracker_with(vec![
            vec![kp(10.0, 10.0), kp(50.0, 20.0)],
            vec![kp(51.0, 20.0), kp(10.0, 11.0)],
        ]);

        let first = tracker.process_frame(RgbImage::new(100, 100));
        assert_eq!(first.face, Rect::new(10, 10, 60, 70));
        let second = tracker.process_frame(RgbImage::new(100, 100));
        assert_eq!(second.keypoints, vec![kp(10.0, 11.0), kp(51.0, 20.0)]);
    }

    #[test]
    fn history_is_bounded() {
        let mut tracker = tracker_with(vec![vec![kp(5.0, 5.0)]; 6]);
        for _ in 0..6 {
            tracker.process_frame(RgbImage::new(100, 100));
        }
        assert_eq!(tracker.history().len(), 3);

        tracker.reset();
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn mouth_is_cut_at_working_resolution() {
        let config = TrackerConfig::default();
        let expected = (config.mouth_region.width, config.mouth_region.height);
        let mut seen = None;
        {
            let mut tracker = Tracker::new(
                config,
                |_: &GrayImage| vec![Rect::new(0, 0, 32, 32)],
                |region: &GrayImage| {
                    seen = Some(region.dimensions());
                    Vec::<Keypoint>::new()
                },
            )
            .unwrap();
            tracker.process_frame(RgbImage::new(64, 64));
        }
        assert_eq!(seen, Some(expected));
    }

    #[test]
    fn adaptive_trim_lowers_threshold_until_enough_features() {
        // one steady feature, one that is only present every other frame
        let frames = (0..3)
            .map(|i| {
                if i % 2 == 0 {
                    vec![kp(10.0, 10.0), kp(60.0, 60.0)]
                } else {
                    vec![kp(10.0, 10.0)]
                }
            })
            .collect();
        let mut tracker = tracker_configured(
            frames,
            TrackerConfig {
                feature_history: 3,
                min_tracked_features: 2,
                ..Default::default()
            },
        );
        for _ in 0..3 {
            tracker.process_frame(RgbImage::new(100, 100));
        }

        let (trimmed, threshold) = tracker.adaptive_trim();
        assert_eq!(column_count(&trimmed), 2);
        assert!(threshold < 0.7);
    }

    #[test]
    fn empty_history_trims_to_nothing() {
        let tracker = tracker_with(Vec::new());
        let (trimmed, threshold) = tracker.adaptive_trim();
        assert!(trimmed.is_empty());
        assert_eq!(threshold, 0.0);
    }

    #[test]
    fn adaptive_trim_ends_at_zero_when_features_never_suffice() {
        let mut tracker = tracker_configured(
            vec![vec![kp(10.0, 10.0)]; 4],
            TrackerConfig {
                live_persistence: 1.0,
                fallback_persistence: 1.0,
                persistence_step: crate::config::MIN_PERSISTENCE_STEP,
                min_tracked_features: 50,
                ..Default::default()
            },
        );
        for _ in 0..4 {
            tracker.process_frame(RgbImage::new(100, 100));
        }

        let (trimmed, threshold) = tracker.adaptive_trim();
        assert_eq!(threshold, 0.0);
        assert_eq!(column_count(&trimmed), 1);
    }
}
