use crate::tracking::features::Keypoint;

/// Weights of the performance terms, summing to 1.
const ANGLE_WEIGHT: f64 = 0.3;
const SIZE_WEIGHT: f64 = 0.3;
const DISTANCE_WEIGHT: f64 = 0.4;

/// Weight of the orientation term of [`dissimilarity`].
const ANGLE_DISSIMILARITY_SCALE: f32 = 10.0;

/// Squared euclidean distance between two keypoint locations.
pub fn squared_distance(a: &Keypoint, b: &Keypoint) -> f32 {
    (a.location - b.location).norm_squared()
}

/// Cosine of an angle given in degrees.
///
/// Comparing cosines keeps 179° and -179° close together.
fn cos_degrees(angle: f32) -> f32 {
    angle.to_radians().cos()
}

/// How different two keypoints are, based on location, size and angle.
pub fn dissimilarity(a: &Keypoint, b: &Keypoint) -> f32 {
    squared_distance(a, b)
        + (a.size - b.size).abs()
        + ANGLE_DISSIMILARITY_SCALE * (cos_degrees(a.angle) - cos_degrees(b.angle)).abs()
}

/// How well `feed` reproduces `reference`, in `[0, 1]` (1 for identical keypoints).
///
/// `proximity` is the squared distance at which the location term reaches 0.
/// A placeholder reference (no size) or one without orientation reuses the
/// location term in place of the relative term it cannot compute.
pub fn performance_score(reference: &Keypoint, feed: &Keypoint, proximity: f32) -> f64 {
    let distance_term =
        1.0 - (squared_distance(reference, feed) as f64 / proximity as f64).min(1.0);

    let size_term = if reference.is_placeholder() {
        distance_term
    } else {
        1.0 - ((reference.size - feed.size).abs() as f64 / reference.size.abs() as f64).min(1.0)
    };

    let angle_term = if reference.has_angle() {
        1.0 - (cos_degrees(reference.angle) - cos_degrees(feed.angle)).abs() as f64 / 2.0
    } else {
        distance_term
    };

    DISTANCE_WEIGHT * distance_term + SIZE_WEIGHT * size_term + ANGLE_WEIGHT * angle_term
}
