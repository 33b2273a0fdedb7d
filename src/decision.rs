use serde::{Deserialize, Serialize};

use crate::types::Decision;

/// Starting maximum for the arg-max scan.
///
/// `Zero` is the reference behaviour: a class scoring exactly 0.0 can never
/// win, so an all-zero vector falls back to class 0 with probability 0.0.
/// `NegativeInfinity` lets any finite score win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionFloor {
    #[default]
    Zero,
    NegativeInfinity,
}

impl DecisionFloor {
    fn initial(self) -> f32 {
        match self {
            DecisionFloor::Zero => 0.0,
            DecisionFloor::NegativeInfinity => f32::NEG_INFINITY,
        }
    }
}

/// Highest-probability class; ties keep the lower index.
///
/// Returns `None` only for an empty slice.
pub fn pick(probabilities: &[f32]) -> Option<Decision> {
    pick_with_floor(probabilities, DecisionFloor::Zero)
}

pub fn pick_with_floor(probabilities: &[f32], floor: DecisionFloor) -> Option<Decision> {
    if probabilities.is_empty() {
        return None;
    }

    let mut best_class = 0;
    let mut highest_prob = floor.initial();

    for (i, &p) in probabilities.iter().enumerate() {
        if p > highest_prob {
            highest_prob = p;
            best_class = i;
        }
    }

    // Nothing beat -inf (all NaN): report class 0 with its own score.
    if highest_prob == f32::NEG_INFINITY {
        highest_prob = probabilities[0];
    }

    Some(Decision {
        class_index: best_class,
        probability: highest_prob,
    })
}
