use std::io::Read;

use anyhow::Context;
use tracing::{info, warn};

use crate::error::RowError;
use crate::models::{LearnerMetrics, RiskPrediction};
use crate::scoring::RiskScoringClient;

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// 1-based data row, header excluded.
    pub row: usize,
    /// `None` when the row could not be read.
    pub metrics: Option<LearnerMetrics>,
    pub result: Result<RiskPrediction, RowError>,
}

/// Reads learner rows from CSV with the scoring service's column names.
/// Blank or unrecognized category and device cells read as "not selected".
/// Rows that do not parse are kept as `RowError::Unreadable`; only a missing
/// header fails the whole file.
pub fn read_metrics_csv<R: Read>(
    reader: R,
) -> anyhow::Result<Vec<Result<LearnerMetrics, RowError>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    reader.headers().context("failed to read CSV header row")?;

    let rows = reader
        .deserialize::<LearnerMetrics>()
        .enumerate()
        .map(|(index, result)| {
            result.map_err(|err| {
                warn!(row = index + 1, error = %err, "unreadable learner row");
                RowError::Unreadable(err.to_string())
            })
        })
        .collect();

    Ok(rows)
}

/// Scores rows one at a time. A failing row is recorded and does not stop
/// the rest of the batch.
pub async fn score_all(
    client: &RiskScoringClient,
    rows: Vec<Result<LearnerMetrics, RowError>>,
) -> Vec<BatchOutcome> {
    let mut outcomes = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        let outcome = match row {
            Ok(metrics) => {
                let result = client.score(&metrics).await.map_err(RowError::from);
                if let Err(err) = &result {
                    warn!(row = index + 1, error = %err, "row could not be scored");
                }
                BatchOutcome {
                    row: index + 1,
                    metrics: Some(metrics),
                    result,
                }
            }
            Err(err) => BatchOutcome {
                row: index + 1,
                metrics: None,
                result: Err(err),
            },
        };
        outcomes.push(outcome);
    }

    let scored = outcomes.iter().filter(|outcome| outcome.result.is_ok()).count();
    info!(scored, total = outcomes.len(), "batch scoring finished");
    outcomes
}
