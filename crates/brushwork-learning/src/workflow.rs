//! Workflows (recipe + model) and the workflow grid.

use crate::error::{LearningError, Result};
use crate::models::{FittedModel, ModelKind, ModelSpec};
use brushwork_processing::{Assignment, Dataset, FittedRecipe, Frame, Recipe, Tunable};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A preprocessing recipe paired with a model specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub recipe: Recipe,
    pub model: ModelSpec,
}

impl Workflow {
    pub fn new(recipe: Recipe, model: ModelSpec) -> Self {
        Self { recipe, model }
    }

    /// `"<recipe>_<model>"`, e.g. `pca_kknn`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.recipe.name, self.model.name())
    }

    /// Recipe tunables followed by model tunables.
    ///
    /// Two slots sharing an id would receive the same value, which is never
    /// intended, so it is rejected.
    pub fn tunables(&self) -> Result<Vec<Tunable>> {
        let mut seen = HashSet::new();
        let all: Vec<Tunable> = self
            .recipe
            .tunables()
            .into_iter()
            .chain(self.model.tunables())
            .collect();
        for t in &all {
            if !seen.insert(t.id.clone()) {
                return Err(LearningError::InvalidConfig(format!(
                    "workflow '{}' declares tunable '{}' twice",
                    self.id(),
                    t.id
                )));
            }
        }
        Ok(all)
    }

    /// Fit the recipe on `frame`, then the model on the baked frame.
    pub fn fit_frame(
        &self,
        frame: &Frame,
        target: &Array1<f64>,
        assignment: &Assignment,
        seed: u64,
    ) -> Result<FittedWorkflow> {
        let recipe = self.recipe.fit(frame, assignment)?;
        let baked = recipe.transform(frame)?;
        let model = self.model.fit(&baked.values, target, assignment, seed)?;
        Ok(FittedWorkflow { recipe, model })
    }

    pub fn fit(&self, data: &Dataset, assignment: &Assignment, seed: u64) -> Result<FittedWorkflow> {
        self.fit_frame(&data.frame(), data.target(), assignment, seed)
    }
}

/// A workflow whose recipe and model are both fitted.
#[derive(Debug)]
pub struct FittedWorkflow {
    recipe: FittedRecipe,
    model: FittedModel,
}

impl FittedWorkflow {
    pub fn recipe(&self) -> &FittedRecipe {
        &self.recipe
    }

    pub fn model_kind(&self) -> ModelKind {
        self.model.kind()
    }

    pub fn predict_frame(&self, frame: &Frame) -> Result<Array1<f64>> {
        let baked = self.recipe.transform(frame)?;
        self.model.predict(&baked.values)
    }

    pub fn predict(&self, data: &Dataset) -> Result<Array1<f64>> {
        self.predict_frame(&data.frame())
    }

    /// Model input after preprocessing, for inspection.
    pub fn bake(&self, data: &Dataset) -> Result<Array2<f64>> {
        Ok(self.recipe.transform(&data.frame())?.into_values())
    }
}

/// The ordered set of workflows to tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSet {
    workflows: Vec<Workflow>,
}

impl WorkflowSet {
    /// Every recipe with every model, recipe-major.
    pub fn cross(recipes: &[Recipe], models: &[ModelSpec]) -> Result<Self> {
        let workflows = recipes
            .iter()
            .flat_map(|r| models.iter().map(move |m| Workflow::new(r.clone(), m.clone())))
            .collect();
        Self::from_workflows(workflows)
    }

    /// Recipes and models paired by position.
    pub fn zip(recipes: &[Recipe], models: &[ModelSpec]) -> Result<Self> {
        if recipes.len() != models.len() {
            return Err(LearningError::InvalidConfig(format!(
                "cannot pair {} recipes with {} models",
                recipes.len(),
                models.len()
            )));
        }
        let workflows = recipes
            .iter()
            .zip(models)
            .map(|(r, m)| Workflow::new(r.clone(), m.clone()))
            .collect();
        Self::from_workflows(workflows)
    }

    fn from_workflows(workflows: Vec<Workflow>) -> Result<Self> {
        if workflows.is_empty() {
            return Err(LearningError::InvalidConfig(
                "workflow grid is empty".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        for wf in &workflows {
            wf.tunables()?;
            if !ids.insert(wf.id()) {
                return Err(LearningError::InvalidConfig(format!(
                    "workflow id '{}' appears twice",
                    wf.id()
                )));
            }
        }
        Ok(Self { workflows })
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Workflow> {
        self.workflows.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.workflows.iter().map(Workflow::id).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id() == id)
    }
}

impl<'a> IntoIterator for &'a WorkflowSet {
    type Item = &'a Workflow;
    type IntoIter = std::slice::Iter<'a, Workflow>;

    fn into_iter(self) -> Self::IntoIter {
        self.workflows.iter()
    }
}
