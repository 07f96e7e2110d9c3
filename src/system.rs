use std::collections::BTreeMap;

use image::RgbImage;
use log::{info, warn};

use crate::{
    algorithms::{
        scoring::{dissimilarity_sum, performance},
        trimming::{sort_features, trim_unstable_features},
    },
    error::{Error, Result},
    sound::{classify, ScoreMode, ScoreVector, SoundClass},
    tracking::{
        face::{FaceDetector, Rect},
        features::KeypointDetector,
        frame::{column_count, KeypointFrame, KeypointTrack},
        tracker::Tracker,
    },
};

/// Runs a reference clip through `tracker` and keeps the columns that
/// persist through more than `persistence` of its frames, sorted by location.
///
/// `stop` is polled before every frame; returning `true` ends the clip early
/// and the frames seen so far are used.
pub fn build_reference<F, K, I>(
    tracker: &mut Tracker<F, K>,
    frames: I,
    persistence: f32,
    mut stop: impl FnMut() -> bool,
) -> KeypointTrack
where
    F: FaceDetector,
    K: KeypointDetector,
    I: IntoIterator<Item = RgbImage>,
{
    tracker.reset();

    let mut track = KeypointTrack::new();
    for frame in frames {
        if stop() {
            info!("reference clip interrupted after {} frames", track.len());
            break;
        }
        track.push(tracker.process_frame(frame).keypoints);
    }
    tracker.reset();

    let trimmed = trim_unstable_features(&track, persistence, tracker.config().proximity_threshold);
    sort_features(&trimmed)
}

/// Reference track of every sound, built once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    tracks: BTreeMap<SoundClass, KeypointTrack>,
}

impl ReferenceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the reference of every clip with its sound's persistence threshold.
    pub fn record<F, K, C>(
        tracker: &mut Tracker<F, K>,
        clips: impl IntoIterator<Item = (SoundClass, C)>,
        mut stop: impl FnMut() -> bool,
    ) -> Self
    where
        F: FaceDetector,
        K: KeypointDetector,
        C: IntoIterator<Item = RgbImage>,
    {
        let mut library = Self::new();
        for (sound, frames) in clips {
            let track = build_reference(tracker, frames, sound.reference_persistence(), &mut stop);
            info!(
                "reference {sound}: {} frames, {} features",
                track.len(),
                column_count(&track)
            );
            library.insert(sound, track);
        }
        library
    }

    pub fn insert(&mut self, sound: SoundClass, track: KeypointTrack) -> Option<KeypointTrack> {
        self.tracks.insert(sound, track)
    }

    pub fn get(&self, sound: SoundClass) -> Option<&KeypointTrack> {
        self.tracks.get(&sound)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SoundClass, &KeypointTrack)> {
        self.tracks.iter().map(|(&sound, track)| (sound, track))
    }

    /// Fails with the first sound that has no reference track.
    pub fn ensure_complete(&self) -> Result<()> {
        match SoundClass::ALL
            .into_iter()
            .find(|sound| !self.tracks.contains_key(sound))
        {
            Some(missing) => Err(Error::MissingReference(missing)),
            None => Ok(()),
        }
    }

    /// Scores `feed` against the reference of every sound.
    pub fn score(&self, feed: &[KeypointFrame], mode: ScoreMode, proximity: f32) -> ScoreVector {
        self.iter()
            .map(|(sound, library)| {
                let score = match mode {
                    ScoreMode::Performance => performance(library, feed, proximity),
                    ScoreMode::Dissimilarity => dissimilarity_sum(library, feed),
                };
                (sound, score)
            })
            .collect()
    }
}

/// Outcome of one live frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub face: Rect,
    pub keypoints: KeypointFrame,
    /// Persistence threshold the live history was trimmed at.
    pub persistence: f32,
    pub scores: ScoreVector,
    pub sound: Option<SoundClass>,
}

/// Live classifier: tracks a stream and compares its recent history
/// against the reference library on every frame.
pub struct LipReader<F, K> {
    tracker: Tracker<F, K>,
    library: ReferenceLibrary,
}

impl<F: FaceDetector, K: KeypointDetector> LipReader<F, K> {
    pub fn new(mut tracker: Tracker<F, K>, library: ReferenceLibrary) -> Result<Self> {
        library.ensure_complete()?;
        for (sound, track) in library.iter() {
            if track.is_empty() {
                warn!("reference {sound} kept no features and will never match");
            }
        }
        tracker.reset();

        Ok(Self { tracker, library })
    }

    pub fn tracker(&self) -> &Tracker<F, K> {
        &self.tracker
    }

    pub fn library(&self) -> &ReferenceLibrary {
        &self.library
    }

    pub fn recognize(&mut self, frame: RgbImage) -> Recognition {
        let tracked = self.tracker.process_frame(frame);
        let (trimmed, persistence) = self.tracker.adaptive_trim();

        let config = self.tracker.config();
        let scores = if trimmed.is_empty() {
            ScoreVector::new()
        } else {
            self.library
                .score(&trimmed, config.score_mode, config.proximity_threshold)
        };
        let sound = classify(&scores, config.score_mode);

        match sound {
            Some(sound) => info!("sound {sound} ({:.3})", scores[&sound]),
            None => info!("no sound recognized"),
        }

        Recognition {
            face: tracked.face,
            keypoints: tracked.keypoints,
            persistence,
            scores,
            sound,
        }
    }

    /// Recognizes every frame of `frames` until the source runs dry or `stop`
    /// returns `true`, handing each result to `on_recognition`.
    ///
    /// Returns the number of frames processed.
    pub fn run<I>(
        &mut self,
        frames: I,
        mut stop: impl FnMut() -> bool,
        mut on_recognition: impl FnMut(&Recognition),
    ) -> usize
    where
        I: IntoIterator<Item = RgbImage>,
    {
        let mut processed = 0;
        for frame in frames {
            if stop() {
                info!("stopped after {processed} frames");
                break;
            }
            let recognition = self.recognize(frame);
            on_recognition(&recognition);
            processed += 1;
        }
        processed
    }
}
