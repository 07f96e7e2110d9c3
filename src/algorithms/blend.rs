use std::collections::VecDeque;

use image::{ImageBuffer, Pixel};
use log::warn;

type Image<P> = ImageBuffer<P, Vec<u8>>;

/// Unweighted average of equally sized frames, each weighted `1 / frames.len()`.
///
/// Returns `None` for an empty window or frames of mismatched dimensions.
pub fn blend_frames<'a, P, I>(frames: I) -> Option<Image<P>>
where
    P: Pixel<Subpixel = u8> + 'a,
    I: IntoIterator<Item = &'a Image<P>>,
{
    let mut frames = frames.into_iter();
    let first = frames.next()?;
    let (width, height) = first.dimensions();

    let mut sums: Vec<f32> = first.as_raw().iter().map(|&v| v as f32).collect();
    let mut count = 1usize;
    for frame in frames {
        if frame.dimensions() != (width, height) {
            return None;
        }
        for (sum, &v) in sums.iter_mut().zip(frame.as_raw()) {
            *sum += v as f32;
        }
        count += 1;
    }

    let weight = 1.0 / count as f32;
    let averaged = sums
        .into_iter()
        .map(|sum| (sum * weight).round().clamp(0.0, u8::MAX as f32) as u8)
        .collect();

    ImageBuffer::from_raw(width, height, averaged)
}

/// Sliding window of the most recent raw frames, blended together to
/// suppress per-frame sensor noise before detection.
pub struct FrameBlender<P: Pixel<Subpixel = u8>> {
    capacity: usize,
    window: VecDeque<Image<P>>,
}

impl<P: Pixel<Subpixel = u8>> FrameBlender<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            window: VecDeque::with_capacity(capacity),
        }
    }

    /// Adds `frame` to the window, evicting the oldest frames past capacity,
    /// and returns the blend of the window.
    pub fn push(&mut self, frame: Image<P>) -> Image<P> {
        if self
            .window
            .back()
            .is_some_and(|last| last.dimensions() != frame.dimensions())
        {
            warn!(
                "frame size changed to {:?}, restarting blend window",
                frame.dimensions()
            );
            self.window.clear();
        }

        self.window.push_back(frame);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }

        match blend_frames(self.window.iter()) {
            Some(blended) => blended,
            // dimensions are kept uniform above, so only a lone frame could get here
            None => self.window.back().cloned().unwrap_or_else(|| ImageBuffer::new(0, 0)),
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn empty_window_has_no_blend() {
        let frames: Vec<GrayImage> = Vec::new();
        assert!(blend_frames(frames.iter()).is_none());
    }

    #[test]
    fn averages_every_channel() {
        let frames = vec![
            RgbImage::from_pixel(2, 2, Rgb([0, 100, 200])),
            RgbImage::from_pixel(2, 2, Rgb([30, 110, 250])),
        ];
        let blended = blend_frames(frames.iter()).unwrap();
        assert_eq!(blended.get_pixel(1, 1), &Rgb([15, 105, 225]));
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let frames = vec![GrayImage::new(2, 2), GrayImage::new(3, 2)];
        assert!(blend_frames(frames.iter()).is_none());
    }

    #[test]
    fn blender_evicts_oldest() {
        let mut blender = FrameBlender::new(2);
        blender.push(GrayImage::from_pixel(1, 1, Luma([90])));
        blender.push(GrayImage::from_pixel(1, 1, Luma([10])));
        let blended = blender.push(GrayImage::from_pixel(1, 1, Luma([30])));

        assert_eq!(blender.len(), 2);
        assert_eq!(blended.get_pixel(0, 0), &Luma([20]));
    }

    #[test]
    fn blender_restarts_on_new_size() {
        let mut blender = FrameBlender::new(3);
        blender.push(GrayImage::from_pixel(2, 2, Luma([200])));
        let blended = blender.push(GrayImage::from_pixel(4, 4, Luma([40])));

        assert_eq!(blender.len(), 1);
        assert_eq!(blended.dimensions(), (4, 4));
        assert_eq!(blended.get_pixel(3, 3), &Luma([40]));
    }
}
