//! Dependency graph construction and deterministic topological ordering.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::{error::GraphError, step::DeploymentStep};

/// The ordered steps selected for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    pub network_id: String,
    pub steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    /// Step names in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeploymentStep> {
        self.steps.iter()
    }
}

/// Build the plan variant of `steps` for `network_id`.
///
/// Steps whose condition excludes the network are dropped first. Every `$ref`
/// argument adds an edge from the referencing step to the referenced one, and the
/// surviving steps are sorted so that each step follows everything it references.
/// Among steps that are ready at the same time the earliest declared runs first.
pub fn build(steps: &[DeploymentStep], network_id: &str) -> Result<DeploymentPlan, GraphError> {
    let included: Vec<&DeploymentStep> = steps
        .iter()
        .filter(|step| step.condition.matches(network_id))
        .collect();

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(included.len());
    for (i, step) in included.iter().enumerate() {
        if index.insert(step.name.as_str(), i).is_some() {
            return Err(GraphError::DuplicateStep(step.name.clone()));
        }
    }

    // deps[i]: steps that i references. dependents[j]: steps referencing j.
    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); included.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); included.len()];
    for (i, step) in included.iter().enumerate() {
        for reference in step.references() {
            let j = *index
                .get(reference)
                .ok_or_else(|| GraphError::UnknownReference {
                    step: step.name.clone(),
                    reference: reference.to_string(),
                })?;
            if !deps[i].contains(&j) {
                deps[i].push(j);
                dependents[j].push(i);
            }
        }
    }

    let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = (0..included.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(included.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < included.len() {
        let cycle = find_cycle(&deps, &pending);
        let steps = cycle.into_iter().map(|i| included[i].name.clone()).collect();
        return Err(GraphError::CyclicDependency { steps });
    }

    let plan = DeploymentPlan {
        network_id: network_id.to_string(),
        steps: order.into_iter().map(|i| included[i].clone()).collect(),
    };

    tracing::debug!(
        network = %plan.network_id,
        declared = steps.len(),
        included = plan.len(),
        "Deployment plan built"
    );

    Ok(plan)
}

/// Walk unresolved dependencies from the earliest blocked step until a step
/// repeats. Every blocked step has at least one blocked dependency, so the walk
/// always closes a cycle.
fn find_cycle(deps: &[Vec<usize>], pending: &[usize]) -> Vec<usize> {
    let Some(start) = (0..pending.len()).find(|&i| pending[i] > 0) else {
        return Vec::new();
    };

    let mut position: Vec<Option<usize>> = vec![None; pending.len()];
    let mut path = Vec::new();
    let mut current = start;

    loop {
        if let Some(pos) = position[current] {
            return path.split_off(pos);
        }
        position[current] = Some(path.len());
        path.push(current);

        match deps[current].iter().copied().find(|&d| pending[d] > 0) {
            Some(next) => current = next,
            None => return path,
        }
    }
}
