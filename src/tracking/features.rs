use std::cmp::Ordering;

use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use nalgebra::Vector2;

/// A mouth feature as reported by a keypoint detector.
///
/// A `size` of zero marks a placeholder: a feature that was not found again
/// in this frame but whose last location is remembered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub location: Vector2<f32>,
    pub size: f32,
    /// Orientation in degrees, [`Keypoint::UNDEFINED_ANGLE`] when unknown.
    pub angle: f32,
}

impl Default for Keypoint {
    fn default() -> Self {
        Self::placeholder(Vector2::zeros())
    }
}

impl Keypoint {
    pub const UNDEFINED_ANGLE: f32 = -1.0;

    pub fn new(x: f32, y: f32, size: f32, angle: f32) -> Self {
        Self {
            location: Vector2::new(x, y),
            size,
            angle,
        }
    }

    pub fn placeholder(location: Vector2<f32>) -> Self {
        Self {
            location,
            size: 0.0,
            angle: Self::UNDEFINED_ANGLE,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.size == 0.0
    }

    pub fn has_angle(&self) -> bool {
        self.angle != Self::UNDEFINED_ANGLE
    }

    /// Top to bottom, then left to right.
    pub fn cmp_location_y(a: &Self, b: &Self) -> Ordering {
        a.location
            .y
            .total_cmp(&b.location.y)
            .then(a.location.x.total_cmp(&b.location.x))
    }

    /// Left to right, then top to bottom.
    pub fn cmp_location_x(a: &Self, b: &Self) -> Ordering {
        a.location
            .x
            .total_cmp(&b.location.x)
            .then(a.location.y.total_cmp(&b.location.y))
    }

    /// Largest first.
    pub fn cmp_size(a: &Self, b: &Self) -> Ordering {
        b.size.total_cmp(&a.size)
    }

    /// Largest angle first.
    pub fn cmp_angle(a: &Self, b: &Self) -> Ordering {
        b.angle.total_cmp(&a.angle)
    }
}

/// Keeps the `n` largest keypoints, in their original detection order.
pub fn strongest(mut keypoints: Vec<Keypoint>, n: usize) -> Vec<Keypoint> {
    if keypoints.len() <= n {
        return keypoints;
    }

    let mut by_size: Vec<usize> = (0..keypoints.len()).collect();
    by_size.sort_by(|&i, &j| Keypoint::cmp_size(&keypoints[i], &keypoints[j]));
    let mut keep = vec![false; keypoints.len()];
    for &i in &by_size[..n] {
        keep[i] = true;
    }

    let mut flags = keep.into_iter();
    keypoints.retain(|_| flags.next().unwrap_or(false));
    keypoints
}

/// Finds keypoints inside the (grayscale) mouth region.
///
/// Results carry no identity across calls; the tracker aligns them.
pub trait KeypointDetector {
    fn detect_keypoints(&mut self, region: &GrayImage) -> Vec<Keypoint>;
}

impl<F> KeypointDetector for F
where
    F: FnMut(&GrayImage) -> Vec<Keypoint>,
{
    fn detect_keypoints(&mut self, region: &GrayImage) -> Vec<Keypoint> {
        self(region)
    }
}

/// Uses FAST (Features from Accelerated Segment Test) corners as keypoints,
/// with the corner score as size and the intensity centroid as orientation.
pub struct FastKeypointDetector {
    pub threshold: u8,
}

impl FastKeypointDetector {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl KeypointDetector for FastKeypointDetector {
    fn detect_keypoints(&mut self, region: &GrayImage) -> Vec<Keypoint> {
        const GAUSSIAN_KERNEL_SIGMA: f32 = 2.0;

        // orientation is measured on a smoothed copy so single noisy pixels do not swing it
        let smoothed = imageproc::filter::gaussian_blur_f32(region, GAUSSIAN_KERNEL_SIGMA);

        corners_fast9(region, self.threshold)
            .into_iter()
            .map(|Corner { x, y, score }| {
                Keypoint::new(
                    x as f32,
                    y as f32,
                    score.max(1.0),
                    intensity_centroid_angle(x, y, &smoothed),
                )
            })
            .collect()
    }
}

/// Orientation (degrees in `[0, 360)`) of the vector from a pixel to the
/// intensity centroid of the disc around it.
fn intensity_centroid_angle(x: u32, y: u32, image: &GrayImage) -> f32 {
    const PATCH_RADIUS: i64 = 7;

    let (width, height) = (image.width() as i64, image.height() as i64);
    let (mut m01, mut m10) = (0f64, 0f64);

    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > PATCH_RADIUS * PATCH_RADIUS {
                continue;
            }
            let (px, py) = (x as i64 + dx, y as i64 + dy);
            if px < 0 || py < 0 || px >= width || py >= height {
                continue;
            }
            let intensity = image.get_pixel(px as u32, py as u32).0[0] as f64;
            m10 += dx as f64 * intensity;
            m01 += dy as f64 * intensity;
        }
    }

    if m10 == 0.0 && m01 == 0.0 {
        return Keypoint::UNDEFINED_ANGLE;
    }
    (m01.atan2(m10).to_degrees() as f32).rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn placeholder_keeps_location() {
        let kp = Keypoint::placeholder(Vector2::new(3.0, 4.0));
        assert!(kp.is_placeholder());
        assert!(!kp.has_angle());
        assert_eq!(kp.location, Vector2::new(3.0, 4.0));
    }

    #[test]
    fn orderings() {
        let a = Keypoint::new(1.0, 5.0, 2.0, 10.0);
        let b = Keypoint::new(2.0, 1.0, 8.0, 90.0);
        assert_eq!(Keypoint::cmp_location_x(&a, &b), Ordering::Less);
        assert_eq!(Keypoint::cmp_location_y(&a, &b), Ordering::Greater);
        assert_eq!(Keypoint::cmp_size(&a, &b), Ordering::Greater);
        assert_eq!(Keypoint::cmp_angle(&a, &b), Ordering::Greater);
    }

    #[test]
    fn strongest_keeps_detection_order() {
        let kps = vec![
            Keypoint::new(0.0, 0.0, 1.0, 0.0),
            Keypoint::new(1.0, 0.0, 9.0, 0.0),
            Keypoint::new(2.0, 0.0, 3.0, 0.0),
            Keypoint::new(3.0, 0.0, 7.0, 0.0),
        ];
        let kept = strongest(kps, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].location.x, 1.0);
        assert_eq!(kept[1].location.x, 3.0);
    }

    #[test]
    fn fast_finds_bright_square_corners() {
        let image = GrayImage::from_fn(40, 40, |x, y| {
            if (15..25).contains(&x) && (15..25).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let keypoints = FastKeypointDetector::new(50).detect_keypoints(&image);
        assert!(!keypoints.is_empty());
        for kp in &keypoints {
            assert!(kp.size >= 1.0);
            assert!(kp.angle == Keypoint::UNDEFINED_ANGLE || (0.0..360.0).contains(&kp.angle));
        }
    }

    #[test]
    fn flat_image_has_no_keypoints() {
        let image = GrayImage::from_pixel(30, 30, Luma([128]));
        assert!(FastKeypointDetector::new(20)
            .detect_keypoints(&image)
            .is_empty());
    }
}
