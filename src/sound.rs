use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::algorithms::scoring::INCOMPARABLE;

/// Mouth shapes the tracker can tell apart.
///
/// Declaration order doubles as the tie-break order of [`classify`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SoundClass {
    None,
    Ff,
    Oo,
    Jj,
    Mm,
    Th,
}

impl SoundClass {
    pub const ALL: [SoundClass; 6] = [
        SoundClass::None,
        SoundClass::Ff,
        SoundClass::Oo,
        SoundClass::Jj,
        SoundClass::Mm,
        SoundClass::Th,
    ];

    /// Persistence threshold used when trimming this sound's reference clip.
    /// Short, fast sounds keep every column.
    pub fn reference_persistence(self) -> f32 {
        match self {
            SoundClass::None => 0.75,
            SoundClass::Ff => 0.5,
            SoundClass::Oo => 0.4,
            SoundClass::Jj | SoundClass::Mm | SoundClass::Th => 0.0,
        }
    }
}

impl fmt::Display for SoundClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SoundClass::None => "NONE",
            SoundClass::Ff => "FF",
            SoundClass::Oo => "OO",
            SoundClass::Jj => "JJ",
            SoundClass::Mm => "MM",
            SoundClass::Th => "TH",
        };
        f.write_str(label)
    }
}

/// Which matcher produced a score, and so which direction is "more similar".
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// Mean per-keypoint performance, higher is better.
    #[default]
    Performance,
    /// Raw dissimilarity sum, lower is better.
    Dissimilarity,
}

pub type ScoreVector = BTreeMap<SoundClass, f64>;

/// Picks the sound whose score is the most similar for `mode`.
///
/// Ties go to the first declared [`SoundClass`]. In dissimilarity mode the
/// "incomparable" sentinel never wins; `None` means no score was usable.
pub fn classify(scores: &ScoreVector, mode: ScoreMode) -> Option<SoundClass> {
    let mut best: Option<(SoundClass, f64)> = None;

    // BTreeMap iterates in declaration order, so strict comparisons keep the first of equals
    for (&sound, &score) in scores {
        if score.is_nan() || (mode == ScoreMode::Dissimilarity && score >= INCOMPARABLE) {
            continue;
        }

        let better = match (best, mode) {
            (None, _) => true,
            (Some((_, current)), ScoreMode::Performance) => score > current,
            (Some((_, current)), ScoreMode::Dissimilarity) => score < current,
        };
        if better {
            best = Some((sound, score));
        }
    }

    best.map(|(sound, _)| sound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: [f64; 6]) -> ScoreVector {
        SoundClass::ALL.into_iter().zip(values).collect()
    }

    #[test]
    fn performance_picks_highest() {
        let s = scores([0.2, 0.9, 0.4, 0.1, 0.0, 0.3]);
        assert_eq!(classify(&s, ScoreMode::Performance), Some(SoundClass::Ff));
    }

    #[test]
    fn dissimilarity_picks_lowest() {
        let s = scores([40.0, 90.0, 12.0, 300.0, 13.0, 50.0]);
        assert_eq!(classify(&s, ScoreMode::Dissimilarity), Some(SoundClass::Oo));
    }

    #[test]
    fn ties_go_to_first_declared() {
        let s = scores([0.1, 0.5, 0.5, 0.5, 0.2, 0.5]);
        assert_eq!(classify(&s, ScoreMode::Performance), Some(SoundClass::Ff));

        let s = scores([7.0, 7.0, 9.0, 9.0, 9.0, 7.0]);
        assert_eq!(classify(&s, ScoreMode::Dissimilarity), Some(SoundClass::None));
    }

    #[test]
    fn incomparable_never_wins() {
        let mut s = scores([INCOMPARABLE; 6]);
        assert_eq!(classify(&s, ScoreMode::Dissimilarity), None);

        s.insert(SoundClass::Th, 1e6);
        assert_eq!(classify(&s, ScoreMode::Dissimilarity), Some(SoundClass::Th));
    }

    #[test]
    fn empty_scores_have_no_winner() {
        assert_eq!(classify(&ScoreVector::new(), ScoreMode::Performance), None);
    }

    #[test]
    fn labels_match_sound_names() {
        assert_eq!(SoundClass::Th.to_string(), "TH");
        assert_eq!(SoundClass::None.to_string(), "NONE");
    }
}
