//! Local completion-risk heuristic.
//!
//! This is an approximation of the remote model's output shape, not a
//! statistically calibrated model. The jitter and the confidence value are
//! random presentation noise and carry no statistical meaning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{DropoutRisk, LearnerMetrics, RiskPrediction};

pub const JITTER_SPAN: f64 = 0.05;
pub const CONFIDENCE_RANGE: (f64, f64) = (0.85, 0.95);

const LOW_RISK_ABOVE: f64 = 0.7;
const MEDIUM_RISK_ABOVE: f64 = 0.4;
const WILL_COMPLETE_ABOVE: f64 = 0.5;

/// Source of the heuristic's random perturbations.
pub trait NoiseSource: Send {
    /// Uniform sample in `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

impl NoiseSource for StdRng {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.random_range(low..=high)
    }
}

/// Always returns the midpoint of the requested range: zero jitter and a
/// confidence of 0.90.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MidpointNoise;

#[cfg(test)]
impl NoiseSource for MidpointNoise {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        (low + high) / 2.0
    }
}

pub fn entropy_noise() -> Box<dyn NoiseSource> {
    Box::new(StdRng::from_os_rng())
}

pub fn seeded_noise(seed: u64) -> Box<dyn NoiseSource> {
    Box::new(StdRng::seed_from_u64(seed))
}

/// Weighted engagement score before jitter and clamping.
pub fn base_probability(metrics: &LearnerMetrics) -> f64 {
    let time = (metrics.time_spent_minutes / 100.0).min(1.0);
    let videos = (metrics.videos_watched as f64 / 50.0).min(1.0);
    let quizzes = (metrics.quizzes_taken as f64 / 20.0).min(1.0);
    let score = metrics.average_quiz_score / 100.0;
    let completion = metrics.completion_rate / 100.0;

    0.20 * time + 0.15 * videos + 0.15 * quizzes + 0.30 * score + 0.20 * completion
}

/// Strict thresholds: exactly 0.7 is Medium and exactly 0.4 is High.
pub fn dropout_risk(probability: f64) -> DropoutRisk {
    if probability > LOW_RISK_ABOVE {
        DropoutRisk::Low
    } else if probability > MEDIUM_RISK_ABOVE {
        DropoutRisk::Medium
    } else {
        DropoutRisk::High
    }
}

pub fn will_complete(probability: f64) -> bool {
    probability > WILL_COMPLETE_ABOVE
}

/// Scores already-validated metrics.
///
/// The probability is rounded to four decimals before the bucket and the
/// completion flag are derived, so both always agree with the reported value.
pub fn heuristic_prediction(metrics: &LearnerMetrics, noise: &mut dyn NoiseSource) -> RiskPrediction {
    let jitter = noise.uniform(-JITTER_SPAN, JITTER_SPAN);
    let probability = round4((base_probability(metrics) + jitter).clamp(0.0, 1.0));
    let confidence = round4(noise.uniform(CONFIDENCE_RANGE.0, CONFIDENCE_RANGE.1));

    RiskPrediction {
        will_complete: will_complete(probability),
        completion_probability: probability,
        dropout_risk: dropout_risk(probability),
        confidence,
        input_data: metrics.clone(),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
