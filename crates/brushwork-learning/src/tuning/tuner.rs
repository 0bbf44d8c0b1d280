use super::racing::{Contender, eliminate};
use super::seeds;
use crate::config::TuningConfig;
use crate::error::{LearningError, Result};
use crate::grid::{finalize, latin_hypercube};
use crate::metrics::rmse;
use crate::workflow::Workflow;
use brushwork_processing::{Assignment, CancellationToken, Dataset, Fold};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Outcome of one (candidate, fold) evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Evaluation {
    /// Assessment RMSE.
    Scored(f64),
    /// Preprocessing or fitting failed; the reason is kept for the report.
    Failed(String),
    /// Not reached: the candidate was eliminated or racing stopped early.
    NotEvaluated,
}

impl Evaluation {
    pub fn score(&self) -> Option<f64> {
        match self {
            Evaluation::Scored(v) => Some(*v),
            _ => None,
        }
    }
}

/// Search history of one grid candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub index: usize,
    pub assignment: Assignment,
    /// One entry per fold, in fold order.
    pub evaluations: Vec<Evaluation>,
    /// Number of folds evaluated when the candidate was eliminated.
    pub eliminated_after: Option<usize>,
}

impl CandidateResult {
    fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.evaluations.iter().filter_map(Evaluation::score)
    }

    /// Mean RMSE over the successful folds.
    pub fn mean(&self) -> Option<f64> {
        let n = self.n_scored();
        (n > 0).then(|| self.scores().sum::<f64>() / n as f64)
    }

    /// Standard error of the mean; `None` below two successful folds.
    pub fn std_err(&self) -> Option<f64> {
        let n = self.n_scored();
        let mean = self.mean()?;
        if n < 2 {
            return None;
        }
        let var = self.scores().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some((var / n as f64).sqrt())
    }

    pub fn n_scored(&self) -> usize {
        self.scores().count()
    }

    pub fn n_failed(&self) -> usize {
        self.evaluations
            .iter()
            .filter(|e| matches!(e, Evaluation::Failed(_)))
            .count()
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated_after.is_some()
    }
}

/// Whether a workflow produced a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TuningStatus {
    Completed,
    Failed { reason: String },
}

/// Racing outcome of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub workflow_id: String,
    pub fold_ids: Vec<String>,
    pub candidates: Vec<CandidateResult>,
    /// Grid index of the best surviving candidate.
    pub best: Option<usize>,
    pub status: TuningStatus,
    pub folds_evaluated: usize,
}

impl TuningResult {
    fn failed(workflow_id: String, fold_ids: Vec<String>, reason: String) -> Self {
        warn!(workflow = %workflow_id, %reason, "workflow failed");
        Self {
            workflow_id,
            fold_ids,
            candidates: Vec::new(),
            best: None,
            status: TuningStatus::Failed { reason },
            folds_evaluated: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TuningStatus::Failed { .. })
    }

    pub fn best_candidate(&self) -> Option<&CandidateResult> {
        self.best.and_then(|i| self.candidates.get(i))
    }

    pub fn best_mean(&self) -> Option<f64> {
        self.best_candidate().and_then(CandidateResult::mean)
    }

    pub fn n_alive(&self) -> usize {
        self.candidates.iter().filter(|c| !c.is_eliminated()).count()
    }
}

/// Preprocessed model inputs of one fold for one recipe configuration.
type Baked = std::result::Result<(Array2<f64>, Array2<f64>), String>;

/// Race the workflow's candidate grid over `folds` of `training`.
///
/// Only cancellation is returned as an error. Problems that concern the
/// workflow as a whole (an empty finalized domain, a recipe that cannot be
/// applied to the training data) produce a [`TuningStatus::Failed`] result,
/// and failures of single evaluations are recorded in the history.
pub fn tune_workflow(
    workflow: &Workflow,
    training: &Dataset,
    folds: &[Fold],
    config: &TuningConfig,
    cancel: &CancellationToken,
) -> Result<TuningResult> {
    let workflow_id = workflow.id();
    let fold_ids: Vec<String> = folds.iter().map(|f| f.id.clone()).collect();
    let workflow_seed = seeds::mix(config.seed, seeds::of_str(&workflow_id));

    let grid = match prepare_grid(workflow, training, config, workflow_seed) {
        Ok(grid) => grid,
        Err(e) => return Ok(TuningResult::failed(workflow_id, fold_ids, e.to_string())),
    };
    debug!(workflow = %workflow_id, candidates = grid.len(), "candidate grid ready");

    let recipe_ids: HashSet<String> = workflow.recipe.tunables().into_iter().map(|t| t.id).collect();
    let k = folds.len();
    let mut candidates: Vec<CandidateResult> = grid
        .into_iter()
        .enumerate()
        .map(|(index, assignment)| CandidateResult {
            index,
            assignment,
            evaluations: vec![Evaluation::NotEvaluated; k],
            eliminated_after: None,
        })
        .collect();
    let racing = candidates.len() > 1;
    let mut quiet_folds = 0usize;
    let mut folds_evaluated = 0usize;

    for (fold_idx, fold) in folds.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(LearningError::Cancelled);
        }
        let alive: Vec<usize> = candidates
            .iter()
            .filter(|c| !c.is_eliminated())
            .map(|c| c.index)
            .collect();

        let analysis = training.subset(&fold.analysis);
        let assessment = training.subset(&fold.assessment);

        // candidates sharing recipe values share one preprocessing fit
        let mut recipe_inputs: BTreeMap<String, Assignment> = BTreeMap::new();
        for &c in &alive {
            let restricted = restrict(&candidates[c].assignment, &recipe_ids);
            recipe_inputs.entry(restricted.key()).or_insert(restricted);
        }
        let baked: BTreeMap<String, Baked> = recipe_inputs
            .into_par_iter()
            .map(|(key, assignment)| {
                let result = bake(workflow, &analysis, &assessment, &assignment);
                (key, result)
            })
            .collect();

        let outcomes: Vec<Evaluation> = alive
            .par_iter()
            .map(|&c| {
                let key = restrict(&candidates[c].assignment, &recipe_ids).key();
                let seed = seeds::mix(seeds::mix(workflow_seed, c as u64), fold_idx as u64);
                match baked.get(&key) {
                    Some(Ok((x_analysis, x_assessment))) => evaluate(
                        workflow,
                        x_analysis,
                        analysis.target(),
                        x_assessment,
                        assessment.target(),
                        &candidates[c].assignment,
                        seed,
                    ),
                    Some(Err(reason)) => Evaluation::Failed(reason.clone()),
                    None => Evaluation::Failed("preprocessing was not prepared".to_string()),
                }
            })
            .collect();
        for (&c, outcome) in alive.iter().zip(outcomes) {
            candidates[c].evaluations[fold_idx] = outcome;
        }
        folds_evaluated = fold_idx + 1;

        if folds_evaluated < config.burn_in || !racing {
            continue;
        }

        let mut dropped: Vec<usize> = alive
            .iter()
            .copied()
            .filter(|&c| candidates[c].evaluations[..folds_evaluated].iter().all(|e| e.score().is_none()))
            .collect();
        let histories: Vec<(usize, Vec<Option<f64>>)> = alive
            .iter()
            .copied()
            .filter(|c| !dropped.contains(c))
            .map(|c| {
                let scores = candidates[c].evaluations[..folds_evaluated]
                    .iter()
                    .map(Evaluation::score)
                    .collect();
                (c, scores)
            })
            .collect();
        let contenders: Vec<Contender<'_>> = histories
            .iter()
            .map(|(index, scores)| Contender {
                index: *index,
                scores,
            })
            .collect();
        let significant = eliminate(&contenders, config);

        if significant.is_empty() {
            quiet_folds += 1;
        } else {
            quiet_folds = 0;
        }
        dropped.extend(significant);

        if dropped.is_empty() && contenders.len() == 2 && quiet_folds >= config.num_ties {
            let (a, b) = (contenders[0].index, contenders[1].index);
            let mean_a = candidates[a].mean().unwrap_or(f64::INFINITY);
            let mean_b = candidates[b].mean().unwrap_or(f64::INFINITY);
            dropped.push(if mean_b < mean_a { a } else { b });
            quiet_folds = 0;
        }

        for &c in &dropped {
            candidates[c].eliminated_after = Some(folds_evaluated);
        }
        let remaining = alive.len() - dropped.len();
        debug!(
            workflow = %workflow_id,
            fold = %fold.id,
            eliminated = dropped.len(),
            remaining,
            "racing round"
        );
        if remaining <= 1 {
            break;
        }
    }

    let best = candidates
        .iter()
        .filter(|c| !c.is_eliminated())
        .filter_map(|c| c.mean().map(|m| (c.index, m)))
        .fold(None::<(usize, f64)>, |acc, (i, m)| match acc {
            Some((_, best)) if best <= m => acc,
            _ => Some((i, m)),
        })
        .map(|(i, _)| i);

    let status = match best {
        Some(_) => TuningStatus::Completed,
        None => {
            let reason = candidates
                .iter()
                .flat_map(|c| c.evaluations.iter())
                .find_map(|e| match e {
                    Evaluation::Failed(reason) => Some(reason.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "no candidate was evaluated".to_string());
            warn!(workflow = %workflow_id, %reason, "every evaluation failed");
            TuningStatus::Failed {
                reason: format!("every evaluation failed: {reason}"),
            }
        }
    };

    Ok(TuningResult {
        workflow_id,
        fold_ids,
        candidates,
        best,
        status,
        folds_evaluated,
    })
}

fn prepare_grid(
    workflow: &Workflow,
    training: &Dataset,
    config: &TuningConfig,
    seed: u64,
) -> Result<Vec<Assignment>> {
    let tunables = workflow.tunables()?;
    let width = workflow.recipe.max_output_width(&training.frame())?;
    let finalized = finalize(&tunables, width)?;
    latin_hypercube(&finalized, config.grid_size, seed)
}

fn restrict(assignment: &Assignment, ids: &HashSet<String>) -> Assignment {
    let mut restricted = Assignment::new();
    for (id, value) in assignment.iter() {
        if ids.contains(id) {
            restricted.insert(id.clone(), value.clone());
        }
    }
    restricted
}

fn bake(workflow: &Workflow, analysis: &Dataset, assessment: &Dataset, assignment: &Assignment) -> Baked {
    let fitted = workflow
        .recipe
        .fit(&analysis.frame(), assignment)
        .map_err(|e| e.to_string())?;
    let x_analysis = fitted.transform(&analysis.frame()).map_err(|e| e.to_string())?;
    let x_assessment = fitted.transform(&assessment.frame()).map_err(|e| e.to_string())?;
    Ok((x_analysis.into_values(), x_assessment.into_values()))
}

fn evaluate(
    workflow: &Workflow,
    x_analysis: &Array2<f64>,
    y_analysis: &Array1<f64>,
    x_assessment: &Array2<f64>,
    y_assessment: &Array1<f64>,
    assignment: &Assignment,
    seed: u64,
) -> Evaluation {
    let predictions = workflow
        .model
        .fit(x_analysis, y_analysis, assignment, seed)
        .and_then(|model| model.predict(x_assessment));
    match predictions {
        Ok(p) => {
            let score = rmse(y_assessment.view(), p.view());
            if score.is_finite() {
                Evaluation::Scored(score)
            } else {
                Evaluation::Failed("non-finite assessment RMSE".to_string())
            }
        }
        Err(e) => Evaluation::Failed(e.to_string()),
    }
}
