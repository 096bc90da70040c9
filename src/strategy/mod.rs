//! Signal scoring
//!
//! - [`calibration`]: penalty-based confidence adjustment
//! - [`contradiction`]: conflicting calls on the same instrument
//! - [`learner`]: outcome-driven penalty weights

pub mod calibration;
pub mod contradiction;
pub mod learner;


pub use calibration::{calibrate, WeightsHandle, MAX_CONFIDENCE, MIN_CONFIDENCE};
pub use contradiction::ContradictionDetector;
pub use learner::{learn_weights, penalty_for_win_rate, LearnStats, WeightLearner};
