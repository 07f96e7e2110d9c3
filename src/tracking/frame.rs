use crate::tracking::features::Keypoint;

/// Keypoints of one video frame. The position of a keypoint encodes its
/// identity over time, not the order the detector reported it in.
pub type KeypointFrame = Vec<Keypoint>;

/// One keypoint frame per processed video frame. After alignment column `j`
/// of consecutive frames is the best guess of the same physical feature.
pub type KeypointTrack = Vec<KeypointFrame>;

/// Number of feature columns of a track, taken from its first frame.
pub fn column_count(track: &[KeypointFrame]) -> usize {
    track.first().map_or(0, Vec::len)
}
