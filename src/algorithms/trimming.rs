use crate::{
    algorithms::distance::dissimilarity,
    tracking::{
        features::Keypoint,
        frame::{KeypointFrame, KeypointTrack},
    },
};

/// Drops the feature columns of `track` that do not persist through enough
/// frames.
///
/// Frames are first padded with placeholders to the length of the last frame.
/// A column scores one appearance for every frame where it is present and
/// differs from the previous frame by less than `proximity` (the first frame
/// is compared with itself). Columns with more than `threshold * frames`
/// appearances survive; a threshold of zero or less keeps every column.
///
/// Frame order and column order are preserved. When no column survives the
/// result is empty.
pub fn trim_unstable_features(
    track: &[KeypointFrame],
    threshold: f32,
    proximity: f32,
) -> KeypointTrack {
    let Some(last) = track.last() else {
        return KeypointTrack::new();
    };
    let width = last.len();

    let padded: KeypointTrack = track
        .iter()
        .map(|frame| {
            let mut frame = frame.clone();
            if frame.len() < width {
                frame.resize(width, Keypoint::default());
            }
            frame
        })
        .collect();

    let required = threshold as f64 * padded.len() as f64;
    let kept: Vec<usize> = (0..width)
        .filter(|&column| {
            if threshold <= 0.0 {
                return true;
            }
            let mut previous = &padded[0][column];
            let mut appearances = 0usize;
            for frame in &padded {
                let keypoint = &frame[column];
                if dissimilarity(previous, keypoint) < proximity && !keypoint.is_placeholder() {
                    appearances += 1;
                }
                previous = keypoint;
            }
            appearances as f64 > required
        })
        .collect();

    if kept.is_empty() {
        return KeypointTrack::new();
    }

    padded
        .iter()
        .map(|frame| kept.iter().map(|&column| frame[column]).collect())
        .collect()
}

/// Reorders the columns of `track` left to right (then top to bottom) by
/// their location in the first frame, moving each column as a whole.
pub fn sort_features(track: &[KeypointFrame]) -> KeypointTrack {
    let Some(first) = track.first() else {
        return KeypointTrack::new();
    };

    let mut order: Vec<usize> = (0..first.len()).collect();
    order.sort_by(|&a, &b| Keypoint::cmp_location_x(&first[a], &first[b]));

    track
        .iter()
        .map(|frame| {
            order
                .iter()
                .filter_map(|&column| frame.get(column).copied())
                .collect()
        })
        .collect()
}
