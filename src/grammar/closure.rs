//! Transitive closure of unary rules, keeping the best chain between every pair of labels.
use ahash::HashMap;
use itertools::Itertools;
use logprob::LogProb;
use petgraph::algo::bellman_ford;
use petgraph::graph::{DiGraph, NodeIndex};
use thin_vec::{ThinVec, thin_vec};

use super::{Grammar, GrammarError, MAX_RULE_ID, log_prob};
use crate::labels::LabelId;

///Position of a rule in a [`UnaryClosure`]'s rule arena.
pub type ClosedUnaryRuleId = u32;

///The best chain of unary rules rewriting `parent` into `child`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedUnaryRule {
    pub parent: LabelId,
    pub child: LabelId,
    pub score: LogProb<f64>,
    path: ThinVec<LabelId>,
}

impl ClosedUnaryRule {
    ///Labels visited by the chain, from `parent` to `child` inclusive.
    pub fn path(&self) -> &[LabelId] {
        &self.path
    }

    pub fn is_reflexive(&self) -> bool {
        self.parent == self.child
    }
}

///Every unary chain of a grammar collapsed into a single scored step.
///
///Chains are found with Bellman-Ford over the graph of unary rules weighted by negated
///scores, so the retained chain between two labels is the most probable one and never
///repeats a label. A label does not rewrite into itself unless
///[`UnaryClosure::with_reflexive_rules`] is used.
#[derive(Debug, Clone)]
pub struct UnaryClosure {
    rules: Vec<ClosedUnaryRule>,
    by_parent: Vec<Vec<ClosedUnaryRuleId>>,
    by_child: Vec<Vec<ClosedUnaryRuleId>>,
}

impl UnaryClosure {
    pub fn new(grammar: &Grammar) -> Result<Self, GrammarError> {
        let n_labels = grammar.num_labels();
        let mut graph = DiGraph::<LabelId, f64>::new();
        let mut nodes: HashMap<LabelId, NodeIndex> = HashMap::default();
        for rule in grammar.unary_rules() {
            if rule.parent == rule.child {
                continue;
            }
            let parent = *nodes
                .entry(rule.parent)
                .or_insert_with(|| graph.add_node(rule.parent));
            let child = *nodes
                .entry(rule.child)
                .or_insert_with(|| graph.add_node(rule.child));
            graph.add_edge(parent, child, -rule.score.into_inner());
        }

        let mut closure = UnaryClosure {
            rules: vec![],
            by_parent: vec![vec![]; n_labels],
            by_child: vec![vec![]; n_labels],
        };

        let endpoints = nodes.into_iter().sorted().collect_vec();
        for &(parent, source) in endpoints.iter() {
            let paths = bellman_ford(&graph, source).map_err(|_| GrammarError::PositiveCycle)?;
            for &(child, target) in endpoints.iter() {
                let cost = paths.distances[target.index()];
                if target == source || !cost.is_finite() {
                    continue;
                }

                let mut path = thin_vec![child];
                let mut at = target;
                while at != source {
                    at = paths.predecessors[at.index()]
                        .ok_or(GrammarError::PositiveCycle)?;
                    path.push(graph[at]);
                    if path.len() > graph.node_count() {
                        return Err(GrammarError::PositiveCycle);
                    }
                }
                path.reverse();

                let score = log_prob(-cost).ok_or(GrammarError::PositiveCycle)?;
                closure.push(ClosedUnaryRule {
                    parent,
                    child,
                    score,
                    path,
                })?;
            }
        }
        Ok(closure)
    }

    ///Adds a zero-cost `x -> x` rule for every label lacking one, which makes the
    ///"no unary step" alternative an explicit rule.
    pub fn with_reflexive_rules(mut self) -> Result<Self, GrammarError> {
        for label in 0..self.by_parent.len() {
            let has_loop = self.by_parent[label]
                .iter()
                .any(|id| self.rules[*id as usize].is_reflexive());
            if !has_loop {
                self.push(ClosedUnaryRule {
                    parent: label,
                    child: label,
                    score: LogProb::prob_of_one(),
                    path: thin_vec![label],
                })?;
            }
        }
        Ok(self)
    }

    fn push(&mut self, rule: ClosedUnaryRule) -> Result<(), GrammarError> {
        let id = rule_id(self.rules.len())?;
        self.by_parent[rule.parent].push(id);
        self.by_child[rule.child].push(id);
        self.rules.push(rule);
        Ok(())
    }

    pub fn rule(&self, id: ClosedUnaryRuleId) -> &ClosedUnaryRule {
        &self.rules[id as usize]
    }

    ///Closed rules rewriting `parent`, ordered by child.
    pub fn by_parent(
        &self,
        parent: LabelId,
    ) -> impl Iterator<Item = (ClosedUnaryRuleId, &ClosedUnaryRule)> + '_ {
        self.by_parent[parent]
            .iter()
            .map(|id| (*id, &self.rules[*id as usize]))
    }

    ///Closed rules ending in `child`, ordered by parent.
    pub fn by_child(
        &self,
        child: LabelId,
    ) -> impl Iterator<Item = (ClosedUnaryRuleId, &ClosedUnaryRule)> + '_ {
        self.by_child[child]
            .iter()
            .map(|id| (*id, &self.rules[*id as usize]))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn rule_id(position: usize) -> Result<ClosedUnaryRuleId, GrammarError> {
    ClosedUnaryRuleId::try_from(position)
        .ok()
        .filter(|id| *id < MAX_RULE_ID)
        .ok_or(GrammarError::TooManyRules(position))
}
