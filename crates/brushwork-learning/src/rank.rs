//! Ordering workflows by their best cross-validated RMSE.

use crate::error::{LearningError, Result};
use crate::tuning::{TuningResult, TuningStatus};
use brushwork_processing::{Assignment, ProcessingError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One ranked workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub rank: usize,
    pub workflow_id: String,
    pub mean_rmse: f64,
    pub std_err: Option<f64>,
    /// Successful folds behind `mean_rmse`.
    pub n_folds: usize,
    pub assignment: Assignment,
}

/// A workflow that produced no usable result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedWorkflow {
    pub workflow_id: String,
    pub reason: String,
}

/// Workflows ascending by best mean RMSE; ties by workflow id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingTable {
    pub entries: Vec<RankEntry>,
    pub failed: Vec<FailedWorkflow>,
}

impl RankingTable {
    pub fn best(&self) -> Option<&RankEntry> {
        self.entries.first()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The ranking as a polars frame, for display.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let rank: Vec<u32> = self.entries.iter().map(|e| e.rank as u32).collect();
        let ids: Vec<&str> = self.entries.iter().map(|e| e.workflow_id.as_str()).collect();
        let means: Vec<f64> = self.entries.iter().map(|e| e.mean_rmse).collect();
        let std_errs: Vec<Option<f64>> = self.entries.iter().map(|e| e.std_err).collect();
        let n_folds: Vec<u32> = self.entries.iter().map(|e| e.n_folds as u32).collect();
        let params: Vec<String> = self.entries.iter().map(|e| e.assignment.to_string()).collect();

        df!(
            "rank" => rank,
            "wflow_id" => ids,
            "mean_rmse" => means,
            "std_err" => std_errs,
            "n" => n_folds,
            "parameters" => params,
        )
        .map_err(|e| LearningError::from(ProcessingError::from(e)))
    }
}

/// Rank tuning results. Failed workflows are listed separately.
pub fn rank(results: &[TuningResult]) -> RankingTable {
    let mut entries = Vec::with_capacity(results.len());
    let mut failed = Vec::new();

    for result in results {
        let best = result
            .best_candidate()
            .and_then(|c| c.mean().map(|mean| (c, mean)));
        match (&result.status, best) {
            (TuningStatus::Completed, Some((candidate, mean))) => entries.push(RankEntry {
                rank: 0,
                workflow_id: result.workflow_id.clone(),
                mean_rmse: mean,
                std_err: candidate.std_err(),
                n_folds: candidate.n_scored(),
                assignment: candidate.assignment.clone(),
            }),
            (TuningStatus::Failed { reason }, _) => failed.push(FailedWorkflow {
                workflow_id: result.workflow_id.clone(),
                reason: reason.clone(),
            }),
            (TuningStatus::Completed, None) => failed.push(FailedWorkflow {
                workflow_id: result.workflow_id.clone(),
                reason: "no successful evaluation".to_string(),
            }),
        }
    }

    entries.sort_by(|a, b| {
        a.mean_rmse
            .partial_cmp(&b.mean_rmse)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.workflow_id.cmp(&b.workflow_id))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    failed.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));

    RankingTable { entries, failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{CandidateResult, Evaluation};
    use pretty_assertions::assert_eq;

    fn result(id: &str, scores: &[f64]) -> TuningResult {
        TuningResult {
            workflow_id: id.to_string(),
            fold_ids: (1..=scores.len()).map(|i| format!("Fold{i:02}")).collect(),
            candidates: vec![CandidateResult {
                index: 0,
                assignment: Assignment::new(),
                evaluations: scores.iter().map(|s| Evaluation::Scored(*s)).collect(),
                eliminated_after: None,
            }],
            best: Some(0),
            status: TuningStatus::Completed,
            folds_evaluated: scores.len(),
        }
    }

    #[test]
    fn test_rank_orders_by_mean_then_id() {
        let results = vec![
            result("pca_kknn", &[0.5, 0.7]),
            result("basic_glmnet", &[0.4, 0.4]),
            result("corr_glmnet", &[0.6, 0.6]),
            result("basic_cubist", &[0.6, 0.6]),
        ];
        let table = rank(&results);
        let ids: Vec<&str> = table.entries.iter().map(|e| e.workflow_id.as_str()).collect();
        assert_eq!(ids, vec!["basic_glmnet", "basic_cubist", "corr_glmnet", "pca_kknn"]);
        let ranks: Vec<usize> = table.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert_eq!(table.best().unwrap().workflow_id, "basic_glmnet");
    }

    #[test]
    fn test_failed_workflows_listed_separately() {
        let mut failed = result("pca_ranger", &[]);
        failed.status = TuningStatus::Failed {
            reason: "empty domain".to_string(),
        };
        failed.best = None;
        let table = rank(&[result("basic_glmnet", &[1.0]), failed]);
        assert_eq!(table.entries.len(), 1);
        assert_eq!(
            table.failed,
            vec![FailedWorkflow {
                workflow_id: "pca_ranger".to_string(),
                reason: "empty domain".to_string(),
            }]
        );
    }

    #[test]
    fn test_ranking_dataframe() {
        let table = rank(&[result("basic_glmnet", &[1.0, 2.0]), result("basic_kknn", &[3.0])]);
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 6);
        let means = df.column("mean_rmse").unwrap().f64().unwrap();
        assert_eq!(means.get(0), Some(1.5));
    }
}
