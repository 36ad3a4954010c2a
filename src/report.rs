use std::collections::HashMap;
use std::fmt::Write;

use chrono::Utc;

use crate::batch::BatchOutcome;
use crate::models::{DropoutRisk, LearnerMetrics, RiskPrediction, RiskSummary};

const APPROXIMATION_NOTICE: &str =
    "Scored by the local heuristic: an approximation, not a calibrated model.";

pub fn render_prediction(prediction: &RiskPrediction, approximate: bool) -> String {
    let mut output = String::new();
    let verdict = if prediction.will_complete {
        "likely to complete"
    } else {
        "unlikely to complete"
    };

    let _ = writeln!(output, "Learner is {verdict}");
    let _ = writeln!(
        output,
        "- Completion probability: {:.1}%",
        prediction.completion_probability * 100.0
    );
    let _ = writeln!(output, "- Dropout risk: {}", prediction.dropout_risk);
    let _ = writeln!(output, "- Confidence: {:.1}%", prediction.confidence * 100.0);
    let _ = writeln!(output, "- Input: {}", describe_metrics(&prediction.input_data));

    if approximate {
        let _ = writeln!(output);
        let _ = writeln!(output, "{APPROXIMATION_NOTICE}");
    }

    output
}

fn describe_metrics(metrics: &LearnerMetrics) -> String {
    let category = metrics
        .course_category
        .map(|category| category.to_string())
        .unwrap_or_else(|| "no category".to_string());
    let device = metrics
        .device_type
        .map(|device| device.to_string())
        .unwrap_or_else(|| "no device".to_string());

    format!(
        "{category} on {device}, {:.1} min, {} videos, {} quizzes, quiz avg {:.1}, {:.1}% complete",
        metrics.time_spent_minutes,
        metrics.videos_watched,
        metrics.quizzes_taken,
        metrics.average_quiz_score,
        metrics.completion_rate
    )
}

pub fn summarize_by_risk(predictions: &[&RiskPrediction]) -> Vec<RiskSummary> {
    let mut map: HashMap<DropoutRisk, (usize, f64)> = HashMap::new();

    for prediction in predictions {
        let entry = map.entry(prediction.dropout_risk).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += prediction.completion_probability;
    }

    let mut summaries: Vec<RiskSummary> = map
        .into_iter()
        .map(|(risk, (count, total_probability))| RiskSummary {
            risk,
            count,
            avg_probability: if count == 0 {
                0.0
            } else {
                total_probability / count as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.risk.cmp(&a.risk));
    summaries
}

pub fn build_batch_report(
    source: &str,
    strategy: &str,
    approximate: bool,
    outcomes: &[BatchOutcome],
) -> String {
    let mut scored: Vec<(usize, &RiskPrediction)> = outcomes
        .iter()
        .filter_map(|outcome| outcome.result.as_ref().ok().map(|p| (outcome.row, p)))
        .collect();
    let predictions: Vec<&RiskPrediction> = scored.iter().map(|(_, p)| *p).collect();
    let summaries = summarize_by_risk(&predictions);

    let mut output = String::new();
    let _ = writeln!(output, "# Completion Risk Report");
    let _ = writeln!(
        output,
        "Generated {} for {} ({} rows, scored by {})",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        source,
        outcomes.len(),
        strategy
    );
    if approximate {
        let _ = writeln!(output);
        let _ = writeln!(output, "> {APPROXIMATION_NOTICE}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");
    if summaries.is_empty() {
        let _ = writeln!(output, "No learners could be scored.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} learners (avg completion probability {:.1}%)",
                summary.risk,
                summary.count,
                summary.avg_probability * 100.0
            );
        }
    }

    scored.sort_by(|a, b| {
        a.1.completion_probability
            .partial_cmp(&b.1.completion_probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Learners");
    if scored.is_empty() {
        let _ = writeln!(output, "No learners could be scored.");
    } else {
        for (row, prediction) in scored.iter().take(10) {
            let _ = writeln!(
                output,
                "- Row {}: {} risk, {:.1}% completion probability ({})",
                row,
                prediction.dropout_risk,
                prediction.completion_probability * 100.0,
                describe_metrics(&prediction.input_data)
            );
        }
    }

    let failures: Vec<&BatchOutcome> = outcomes
        .iter()
        .filter(|outcome| outcome.result.is_err())
        .collect();
    if !failures.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rows Not Scored");
        for outcome in failures {
            if let Err(err) = &outcome.result {
                match &outcome.metrics {
                    Some(metrics) => {
                        let _ = writeln!(
                            output,
                            "- Row {}: {} ({})",
                            outcome.row,
                            err,
                            describe_metrics(metrics)
                        );
                    }
                    None => {
                        let _ = writeln!(output, "- Row {}: {}", outcome.row, err);
                    }
                }
            }
        }
    }

    output
}
