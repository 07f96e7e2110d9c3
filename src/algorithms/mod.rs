//! Stateless building blocks of the lip tracker: keypoint metrics,
//! frame blending, alignment, trimming and scoring of keypoint tracks.

pub mod alignment;
pub mod blend;
pub mod distance;
pub mod scoring;
pub mod trimming;
