use crate::{
    algorithms::distance::{dissimilarity, performance_score, squared_distance},
    tracking::{features::Keypoint, frame::KeypointFrame},
};

/// Returned by [`dissimilarity_sum`] when either track is empty.
/// It means "cannot compare" and must never be read as a distance.
pub const INCOMPARABLE: f64 = 10_000_000.0;

/// Squared radius searched for a counterpart by [`dissimilarity_sum`].
const DISSIMILARITY_SEARCH_RADIUS: f32 = 100.0;

/// Nearest keypoint of `candidates` to `target` by squared distance.
fn nearest<'a>(target: &Keypoint, candidates: &'a [Keypoint]) -> Option<(&'a Keypoint, f32)> {
    candidates
        .iter()
        .map(|candidate| (candidate, squared_distance(target, candidate)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Mean per-keypoint performance of `feed` against the reference `library`,
/// roughly in `[0, 1]`.
///
/// Only the most recent `library.len()` frames of `feed` are used, so frame
/// `i` of the library is compared with frame `i` of that tail. Every library
/// keypoint counts; those without a feed keypoint closer than `proximity`
/// contribute nothing. Empty input scores 0.
pub fn performance(library: &[KeypointFrame], feed: &[KeypointFrame], proximity: f32) -> f64 {
    let feed = &feed[feed.len().saturating_sub(library.len())..];
    if library.is_empty() || feed.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut counted = 0usize;
    for (reference_frame, feed_frame) in library.iter().zip(feed) {
        for reference in reference_frame {
            if let Some((closest, distance)) = nearest(reference, feed_frame) {
                if distance < proximity {
                    total += performance_score(reference, closest, proximity);
                }
            }
            counted += 1;
        }
    }

    if counted == 0 {
        return 0.0;
    }
    total / counted as f64
}

/// Sum of the [`dissimilarity`] between each `library` keypoint and its
/// nearest counterpart in the matching `feed` frame, lower is more similar.
///
/// A keypoint with no counterpart nearby is compared against an empty
/// keypoint at the origin. Returns [`INCOMPARABLE`] for empty input.
pub fn dissimilarity_sum(library: &[KeypointFrame], feed: &[KeypointFrame]) -> f64 {
    if library.is_empty() || feed.is_empty() {
        return INCOMPARABLE;
    }

    library
        .iter()
        .zip(feed)
        .flat_map(|(reference_frame, feed_frame)| {
            reference_frame.iter().map(move |reference| {
                let counterpart = match nearest(reference, feed_frame) {
                    Some((closest, distance)) if distance < DISSIMILARITY_SEARCH_RADIUS => *closest,
                    _ => Keypoint::new(0.0, 0.0, 0.0, 0.0),
                };
                dissimilarity(reference, &counterpart) as f64
            })
        })
        .sum()
}
