use std::collections::VecDeque;

use image::GrayImage;
use nalgebra::Vector2;

/// Axis aligned box in image pixels. Unlike `imageproc::rect::Rect` it may be
/// empty, which is how a frame without a face is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box spanning `top_left` (inclusive) to `bottom_right` (exclusive).
    pub fn from_corners(top_left: Vector2<i32>, bottom_right: Vector2<i32>) -> Self {
        Self {
            x: top_left.x,
            y: top_left.y,
            width: (bottom_right.x - top_left.x).max(0) as u32,
            height: (bottom_right.y - top_left.y).max(0) as u32,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn top_left(&self) -> Vector2<i32> {
        Vector2::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Vector2<i32> {
        Vector2::new(self.x + self.width as i32, self.y + self.height as i32)
    }

    /// Part of this box inside a `width` x `height` image, if any.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let top_left = self.top_left().sup(&Vector2::zeros());
        let bottom_right = self
            .bottom_right()
            .inf(&Vector2::new(width as i32, height as i32));
        let clamped = Rect::from_corners(top_left, bottom_right);

        (!clamped.is_empty()).then_some(clamped)
    }
}

/// Locates candidate faces in a grayscale frame.
pub trait FaceDetector {
    fn detect(&mut self, image: &GrayImage) -> Vec<Rect>;
}

impl<F> FaceDetector for F
where
    F: FnMut(&GrayImage) -> Vec<Rect>,
{
    fn detect(&mut self, image: &GrayImage) -> Vec<Rect> {
        self(image)
    }
}

/// Smooths the face box across frames by averaging the corners of the most
/// recent detections, absorbing single-frame jitter and misses.
pub struct FaceStabilizer {
    capacity: usize,
    history: VecDeque<Rect>,
}

impl FaceStabilizer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Records the largest of `detections` (an empty box when there are none)
    /// and returns the average box of the history. The result always has a
    /// width and height of at least one pixel.
    pub fn stabilize(&mut self, detections: &[Rect]) -> Rect {
        let face = detections
            .iter()
            .copied()
            .fold(Rect::default(), |largest, candidate| {
                if candidate.area() > largest.area() {
                    candidate
                } else {
                    largest
                }
            });

        self.history.push_back(face);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let count = self.history.len() as i32;
        let (top_left, bottom_right) = self.history.iter().fold(
            (Vector2::<i32>::zeros(), Vector2::<i32>::zeros()),
            |(tl, br), rect| (tl + rect.top_left(), br + rect.bottom_right()),
        );
        let top_left = top_left / count;
        let mut bottom_right = bottom_right / count;

        if bottom_right.x <= top_left.x {
            bottom_right.x = top_left.x + 1;
        }
        if bottom_right.y <= top_left.y {
            bottom_right.y = top_left.y + 1;
        }

        Rect::from_corners(top_left, bottom_right)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_detection_is_returned_unchanged() {
        let mut stabilizer = FaceStabilizer::new(5);
        let face = Rect::new(40, 60, 120, 140);
        assert_eq!(stabilizer.stabilize(&[face]), face);
    }

    #[test]
    fn largest_detection_wins() {
        let mut stabilizer = FaceStabilizer::new(5);
        let small = Rect::new(0, 0, 10, 10);
        let large = Rect::new(100, 100, 50, 50);
        assert_eq!(stabilizer.stabilize(&[small, large, small]), large);
    }

    #[test]
    fn no_face_gives_minimal_box() {
        let mut stabilizer = FaceStabilizer::new(5);
        let rect = stabilizer.stabilize(&[]);
        assert_eq!(rect, Rect::new(0, 0, 1, 1));
    }

    #[test]
    fn outlier_moves_average_by_a_fraction() {
        let mut stabilizer = FaceStabilizer::new(5);
        let face = Rect::new(100, 100, 200, 200);
        for _ in 0..5 {
            stabilizer.stabilize(&[face]);
        }

        let outlier = Rect::new(150, 100, 200, 200);
        let rect = stabilizer.stabilize(&[outlier]);
        assert_eq!(stabilizer.len(), 5);
        assert!(rect.x - face.x <= (outlier.x - face.x) / 5);
        assert_eq!(rect.x, 110);
        assert_eq!(rect.width, 200);
    }

    #[test]
    fn missed_frame_is_absorbed() {
        let mut stabilizer = FaceStabilizer::new(2);
        stabilizer.stabilize(&[Rect::new(10, 10, 20, 20)]);
        let rect = stabilizer.stabilize(&[]);
        assert_eq!(rect, Rect::new(5, 5, 10, 10));
    }

    #[test]
    fn clamp_to_image() {
        let rect = Rect::new(-10, 5, 30, 30);
        assert_eq!(rect.clamp_to(15, 20), Some(Rect::new(0, 5, 15, 15)));
        assert_eq!(Rect::new(50, 50, 5, 5).clamp_to(10, 10), None);
    }
}
