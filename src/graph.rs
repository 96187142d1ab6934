//! Dependency ordering of the models in one generation batch.
//!
//! A required (non-null) foreign key or one-to-one to another model of the batch is a hard
//! edge: the target must be emitted first. A nullable one is soft and never blocks. Many-to-many
//! relationships, self references and references outside the batch add no edges.

use crate::definition::model::RelationKind;
use crate::error::CycleError;
use crate::resolve::ResolvedDefinition;
use serde::Serialize;
use std::collections::BTreeSet;

/// A soft reference whose target is emitted after the referencing model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SoftEdge {
    pub from: String,
    pub relation: String,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmissionOrder {
    /// Model names, dependencies first.
    pub models: Vec<String>,
    pub deferred_soft_edges: Vec<SoftEdge>,
}

impl EmissionOrder {
    pub fn position(&self, model: &str) -> Option<usize> {
        self.models.iter().position(|m| m == model)
    }
}

/// Same-batch edges by declaration index. `hard[i]` holds the models `i` must follow.
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    names: Vec<String>,
    hard: Vec<BTreeSet<usize>>,
    soft: Vec<Vec<(String, usize)>>,
}

impl DependencyGraph {
    pub fn build(resolved: &ResolvedDefinition) -> Self {
        let models = &resolved.definition.models;
        let n = models.len();
        let mut graph = DependencyGraph {
            names: models.iter().map(|m| m.name.clone()).collect(),
            hard: vec![BTreeSet::new(); n],
            soft: vec![Vec::new(); n],
        };
        for (i, m) in models.iter().enumerate() {
            for (rel, reference) in m.relationships.iter().zip(resolved.references_of(i)) {
                if rel.kind == RelationKind::ManyToMany || !reference.is_in(resolved.application()) {
                    continue;
                }
                let Some(j) = resolved.model_index(&rel.target.model) else {
                    continue;
                };
                if i == j {
                    continue;
                }
                if rel.is_hard() {
                    graph.hard[i].insert(j);
                } else {
                    graph.soft[i].push((rel.name.clone(), j));
                }
            }
        }
        graph
    }

    pub fn hard_dependencies(&self, model: usize) -> impl Iterator<Item = &str> {
        self.hard[model].iter().map(|&j| self.names[j].as_str())
    }

    /// Stable topological order over hard edges; ties go to the earliest-declared model,
    /// preferring one whose soft targets are already emitted.
    pub fn order(&self) -> Result<EmissionOrder, CycleError> {
        let n = self.names.len();
        let mut emitted = vec![false; n];
        let mut sequence: Vec<usize> = Vec::with_capacity(n);
        while sequence.len() < n {
            let ready: Vec<usize> = (0..n)
                .filter(|&i| !emitted[i] && self.hard[i].iter().all(|&j| emitted[j]))
                .collect();
            let Some(&first) = ready.first() else {
                let remaining: Vec<usize> = (0..n).filter(|&i| !emitted[i]).collect();
                return Err(self.cycle_in(&remaining));
            };
            let pick = ready
                .iter()
                .copied()
                .find(|&i| self.soft[i].iter().all(|(_, j)| emitted[*j]))
                .unwrap_or(first);
            emitted[pick] = true;
            sequence.push(pick);
        }

        let mut position = vec![0usize; n];
        for (pos, &i) in sequence.iter().enumerate() {
            position[i] = pos;
        }
        let mut deferred_soft_edges = Vec::new();
        for &i in &sequence {
            for (relation, j) in &self.soft[i] {
                if position[*j] > position[i] {
                    deferred_soft_edges.push(SoftEdge {
                        from: self.names[i].clone(),
                        relation: relation.clone(),
                        to: self.names[*j].clone(),
                    });
                }
            }
        }
        Ok(EmissionOrder {
            models: sequence.into_iter().map(|i| self.names[i].clone()).collect(),
            deferred_soft_edges,
        })
    }

    /// The first strongly connected component (at least two models) of the hard subgraph
    /// induced by `remaining`, members in declaration order.
    fn cycle_in(&self, remaining: &[usize]) -> CycleError {
        let inside: BTreeSet<usize> = remaining.iter().copied().collect();
        let mut tarjan = Tarjan::new(self.names.len());
        for &v in remaining {
            if tarjan.index[v].is_none() {
                tarjan.visit(v, &self.hard, &inside);
            }
        }
        let mut cycle = tarjan
            .components
            .into_iter()
            .filter(|c| c.len() >= 2)
            .min_by_key(|c| c.iter().copied().min().unwrap_or(usize::MAX))
            .unwrap_or_else(|| remaining.to_vec());
        cycle.sort_unstable();
        CycleError {
            models_in_cycle: cycle.into_iter().map(|i| self.names[i].clone()).collect(),
        }
    }
}

struct Tarjan {
    next: usize,
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan {
    fn new(n: usize) -> Self {
        Tarjan {
            next: 0,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn visit(&mut self, v: usize, edges: &[BTreeSet<usize>], inside: &BTreeSet<usize>) {
        self.index[v] = Some(self.next);
        self.low[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
        for &w in edges[v].iter().filter(|w| inside.contains(w)) {
            match self.index[w] {
                None => {
                    self.visit(w, edges, inside);
                    self.low[v] = self.low[v].min(self.low[w]);
                }
                Some(iw) if self.on_stack[w] => self.low[v] = self.low[v].min(iw),
                Some(_) => {}
            }
        }
        if Some(self.low[v]) == self.index[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Order the models of a resolved definition for emission.
pub fn order(resolved: &ResolvedDefinition) -> Result<EmissionOrder, CycleError> {
    let graph = DependencyGraph::build(resolved);
    let result = graph.order();
    match &result {
        Ok(order) => tracing::debug!(
            application = %resolved.application(),
            order = ?order.models,
            deferred = order.deferred_soft_edges.len(),
            "emission order"
        ),
        Err(cycle) => tracing::debug!(
            application = %resolved.application(),
            cycle = ?cycle.models_in_cycle,
            "dependency cycle"
        ),
    }
    result
}
