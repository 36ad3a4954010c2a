use crate::error::ValidationError;
use crate::models::LearnerMetrics;

/// Checks that every field is present and inside its declared bounds.
///
/// Checks run in a fixed order (selection, duration, then the remaining
/// numeric bounds) and the first failure is returned.
pub fn validate(metrics: &LearnerMetrics) -> Option<ValidationError> {
    if metrics.course_category.is_none() || metrics.device_type.is_none() {
        return Some(ValidationError::MissingSelection);
    }

    if metrics.time_spent_minutes.is_nan() || metrics.time_spent_minutes <= 0.0 {
        return Some(ValidationError::NonPositiveDuration);
    }
    if !metrics.time_spent_minutes.is_finite() {
        return Some(ValidationError::OutOfRange {
            field: "time spent on course",
            expected: "a finite number of minutes",
            value: metrics.time_spent_minutes,
        });
    }

    if metrics.videos_watched < 0 {
        return Some(ValidationError::OutOfRange {
            field: "videos watched",
            expected: ">= 0",
            value: metrics.videos_watched as f64,
        });
    }

    if metrics.quizzes_taken < 0 {
        return Some(ValidationError::OutOfRange {
            field: "quizzes taken",
            expected: ">= 0",
            value: metrics.quizzes_taken as f64,
        });
    }

    if !is_percentage(metrics.average_quiz_score) {
        return Some(ValidationError::OutOfRange {
            field: "average quiz score",
            expected: "0-100",
            value: metrics.average_quiz_score,
        });
    }

    if !is_percentage(metrics.completion_rate) {
        return Some(ValidationError::OutOfRange {
            field: "completion rate",
            expected: "0-100",
            value: metrics.completion_rate,
        });
    }

    None
}

fn is_percentage(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}
