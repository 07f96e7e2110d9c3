use crate::{
    algorithms::distance::squared_distance,
    tracking::{features::Keypoint, frame::KeypointFrame},
};

/// Orders the raw detections of a new frame so that slot `i` holds the same
/// physical feature as slot `i` of `previous`.
///
/// Every slot greedily takes its nearest remaining detection when it lies
/// within `proximity` (squared pixels), or any nearest detection when the slot
/// was already a placeholder. Slots left without a match become placeholders
/// at their previous location, and whatever is still unclaimed is appended as
/// new features. A placeholder slot only stays empty once every detection has
/// been claimed by an earlier slot.
///
/// The result is never shorter than `previous`; each detection is used once.
pub fn align_keypoints(
    previous: &[Keypoint],
    current: &[Keypoint],
    proximity: f32,
) -> KeypointFrame {
    let mut pool: Vec<Keypoint> = current.to_vec();
    let mut aligned = KeypointFrame::with_capacity(previous.len().max(current.len()));

    for last in previous {
        let nearest = pool
            .iter()
            .enumerate()
            .map(|(index, candidate)| (index, squared_distance(candidate, last)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b));

        match nearest {
            Some((index, distance)) if distance < proximity || last.is_placeholder() => {
                aligned.push(pool.remove(index));
            }
            // lost this frame, but remember where it was for re-acquisition
            _ => aligned.push(Keypoint::placeholder(last.location)),
        }
    }

    aligned.append(&mut pool);
    aligned
}
