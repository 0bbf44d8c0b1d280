//! Experiment reports for the console and for JSON output.
//!
//! [`ExperimentReport`] is what `--json` prints to stdout and what
//! `--emit-report` writes to disk. [`ExperimentReport::render_text`] produces
//! the console view: the ranking table, the best parameters of every
//! workflow and the two-row final metric table.

use crate::config::ExperimentConfig;
use crate::error::{LearningError, Result};
use crate::evaluate::FinalReport;
use crate::experiment::ExperimentResult;
use crate::rank::{FailedWorkflow, RankEntry, RankingTable};
use crate::tuning::{TuningResult, TuningStatus};
use brushwork_processing::{Assignment, ProcessingError};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const REPORT_FILE: &str = "brushwork_report.json";

/// Shape of the data the experiment ran on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub features: usize,
    pub train: usize,
    pub test: usize,
    pub folds: usize,
}

/// Racing summary of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub status: TuningStatus,
    pub candidates: usize,
    pub eliminated: usize,
    pub folds_evaluated: usize,
    pub failed_evaluations: usize,
    pub best_mean_rmse: Option<f64>,
    pub best_parameters: Option<Assignment>,
}

impl From<&TuningResult> for WorkflowSummary {
    fn from(result: &TuningResult) -> Self {
        let best = result.best_candidate();
        Self {
            workflow_id: result.workflow_id.clone(),
            status: result.status.clone(),
            candidates: result.candidates.len(),
            eliminated: result.candidates.iter().filter(|c| c.is_eliminated()).count(),
            folds_evaluated: result.folds_evaluated,
            failed_evaluations: result.candidates.iter().map(|c| c.n_failed()).sum(),
            best_mean_rmse: result.best_mean(),
            best_parameters: best.map(|c| c.assignment.clone()),
        }
    }
}

/// Full record of an experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub elements_file: Option<String>,
    pub ratings_file: Option<String>,
    pub config: ExperimentConfig,
    pub dataset: DatasetSummary,
    pub ranking: Vec<RankEntry>,
    pub failed_workflows: Vec<FailedWorkflow>,
    pub workflows: Vec<WorkflowSummary>,
    pub final_fit: FinalReport,
}

impl ExperimentReport {
    pub fn new(config: &ExperimentConfig, result: &ExperimentResult) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            elements_file: None,
            ratings_file: None,
            config: config.clone(),
            dataset: DatasetSummary {
                records: result.n_records,
                features: result.n_features,
                train: result.n_train,
                test: result.n_test,
                folds: result.fold_ids.len(),
            },
            ranking: result.ranking.entries.clone(),
            failed_workflows: result.ranking.failed.clone(),
            workflows: result.tuning.iter().map(WorkflowSummary::from).collect(),
            final_fit: result.final_fit.clone(),
        }
    }

    #[must_use]
    pub fn with_inputs(mut self, elements: impl Into<String>, ratings: impl Into<String>) -> Self {
        self.elements_file = Some(elements.into());
        self.ratings_file = Some(ratings.into());
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as `brushwork_report.json` into `dir`, creating the
    /// directory if needed.
    pub fn write_report_to_file(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        let mut file = File::create(&path)?;
        file.write_all(self.to_json()?.as_bytes())?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }

    /// Ranked workflows as a polars frame.
    pub fn ranking_frame(&self) -> Result<DataFrame> {
        let table = RankingTable {
            entries: self.ranking.clone(),
            failed: Vec::new(),
        };
        table.to_dataframe()
    }

    /// `rmse` and `rsq` of the final fit in the usual
    /// `.metric / .estimator / .estimate` layout.
    pub fn final_metrics_frame(&self) -> Result<DataFrame> {
        let metrics = &self.final_fit.metrics;
        df!(
            ".metric" => &["rmse", "rsq"],
            ".estimator" => &["standard", "standard"],
            ".estimate" => &[metrics.rmse, metrics.rsq],
        )
        .map_err(|e| LearningError::from(ProcessingError::from(e)))
    }

    /// Console rendering of the report.
    pub fn render_text(&self) -> Result<String> {
        let rule = "=".repeat(80);
        let mut out = String::new();

        // writing into a String cannot fail
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "WORKFLOW RANKING ({} records, {} train / {} test, {} folds)",
            self.dataset.records, self.dataset.train, self.dataset.test, self.dataset.folds
        );
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", self.ranking_frame()?);
        for failed in &self.failed_workflows {
            let _ = writeln!(out, "  failed: {} ({})", failed.workflow_id, failed.reason);
        }

        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "BEST PARAMETERS PER WORKFLOW");
        let _ = writeln!(out, "{rule}");
        let width = self
            .workflows
            .iter()
            .map(|w| w.workflow_id.len())
            .max()
            .unwrap_or(0);
        for summary in &self.workflows {
            let detail = match (&summary.status, &summary.best_parameters) {
                (TuningStatus::Failed { reason }, _) => format!("failed: {reason}"),
                (_, Some(params)) => params.to_string(),
                (_, None) => "no surviving candidate".to_string(),
            };
            let _ = writeln!(out, "  {:<width$}  {detail}", summary.workflow_id);
        }

        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(
            out,
            "FINAL FIT: {} ({})",
            self.final_fit.workflow_id, self.final_fit.assignment
        );
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", self.final_metrics_frame()?);
        let _ = writeln!(
            out,
            "  baseline rmse (training mean): {:.4}",
            self.final_fit.baseline_rmse
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RegressionMetrics;
    use crate::rank::RankingTable;
    use crate::tuning::{CandidateResult, Evaluation};
    use pretty_assertions::assert_eq;

    fn result() -> ExperimentResult {
        let assignment = Assignment::new().with("penalty", 0.01).with("mixture", 0.5);
        let tuned = TuningResult {
            workflow_id: "basic_glmnet".to_string(),
            fold_ids: vec!["Fold1".to_string(), "Fold2".to_string()],
            candidates: vec![
                CandidateResult {
                    index: 0,
                    assignment: assignment.clone(),
                    evaluations: vec![Evaluation::Scored(0.4), Evaluation::Scored(0.6)],
                    eliminated_after: None,
                },
                CandidateResult {
                    index: 1,
                    assignment: Assignment::new().with("penalty", 1.0).with("mixture", 1.0),
                    evaluations: vec![
                        Evaluation::Failed("diverged".to_string()),
                        Evaluation::NotEvaluated,
                    ],
                    eliminated_after: Some(1),
                },
            ],
            best: Some(0),
            status: TuningStatus::Completed,
            folds_evaluated: 2,
        };
        let failed = TuningResult {
            workflow_id: "pca_ranger".to_string(),
            fold_ids: tuned.fold_ids.clone(),
            candidates: Vec::new(),
            best: None,
            status: TuningStatus::Failed {
                reason: "empty domain".to_string(),
            },
            folds_evaluated: 0,
        };
        let ranking = crate::rank::rank(&[tuned.clone(), failed.clone()]);
        ExperimentResult {
            n_records: 40,
            n_features: 3,
            n_train: 30,
            n_test: 10,
            fold_ids: tuned.fold_ids.clone(),
            tuning: vec![tuned, failed],
            ranking,
            final_fit: FinalReport {
                workflow_id: "basic_glmnet".to_string(),
                assignment,
                n_train: 30,
                n_test: 10,
                n_model_features: 3,
                metrics: RegressionMetrics {
                    rmse: 0.5,
                    mae: 0.4,
                    rsq: 0.8,
                    rsq_trad: 0.75,
                },
                baseline_rmse: 1.2,
                predictions: vec![1.0; 10],
            },
        }
    }

    #[test]
    fn test_report_summaries() {
        let report = ExperimentReport::new(&ExperimentConfig::default(), &result());
        assert_eq!(report.dataset.folds, 2);
        assert_eq!(report.ranking.len(), 1);
        assert_eq!(report.failed_workflows.len(), 1);
        let glmnet = &report.workflows[0];
        assert_eq!(glmnet.candidates, 2);
        assert_eq!(glmnet.eliminated, 1);
        assert_eq!(glmnet.failed_evaluations, 1);
        assert_eq!(glmnet.best_mean_rmse, Some(0.5));
    }

    #[test]
    fn test_json_round_trip() {
        let report = ExperimentReport::new(&ExperimentConfig::default(), &result())
            .with_inputs("elements.csv", "ratings.csv");
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["final_fit"]["workflow_id"], "basic_glmnet");
        assert_eq!(value["ratings_file"], "ratings.csv");
        let back: ExperimentReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = ExperimentReport::new(&ExperimentConfig::default(), &result());
        let path = report.write_report_to_file(&dir.path().join("out")).unwrap();
        assert!(path.ends_with(REPORT_FILE));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"generated_at\""));
    }

    #[test]
    fn test_render_text_sections() {
        let report = ExperimentReport::new(&ExperimentConfig::default(), &result());
        let text = report.render_text().unwrap();
        assert!(text.contains("WORKFLOW RANKING"));
        assert!(text.contains("failed: pca_ranger (empty domain)"));
        assert!(text.contains("BEST PARAMETERS PER WORKFLOW"));
        assert!(text.contains("FINAL FIT: basic_glmnet"));
        assert!(text.contains("baseline rmse (training mean): 1.2000"));

        let metrics = report.final_metrics_frame().unwrap();
        assert_eq!(metrics.height(), 2);
    }

    #[test]
    fn test_empty_ranking_still_renders() {
        let mut result = result();
        result.ranking = RankingTable {
            entries: Vec::new(),
            failed: Vec::new(),
        };
        let report = ExperimentReport::new(&ExperimentConfig::default(), &result);
        assert_eq!(report.ranking_frame().unwrap().height(), 0);
    }
}
