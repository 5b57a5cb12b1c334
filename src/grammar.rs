//! Binarized PCFG rule stores.
use ahash::HashMap;
use logprob::LogProb;
use thiserror::Error;

use crate::labels::{LabelId, LabelIndexer, ROOT_ID};

mod closure;
pub use closure::{ClosedUnaryRule, ClosedUnaryRuleId, UnaryClosure};

///Errors raised while assembling grammars, lexicons and parsers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GrammarError {
    #[error("{rule} has score {score}; rule scores must be finite log-probabilities")]
    InvalidScore { rule: String, score: f64 },
    #[error("{word}/{tag} has score {score}; tagging scores must be finite log-probabilities")]
    InvalidTaggingScore {
        word: String,
        tag: String,
        score: f64,
    },
    #[error("fine label {0} has no counterpart in the coarse grammar")]
    UnmappedLabel(String),
    #[error("fine root {fine} does not map onto coarse root {coarse}")]
    RootMismatch { fine: String, coarse: String },
    #[error("the unary rules contain a cycle with a positive score")]
    PositiveCycle,
    #[error("{0} rules cannot be addressed by a chart backpointer")]
    TooManyRules(usize),
}

///Rule ordinals and closed unary rule ids stay below this value; the ones above it mark
///empty or rule-less chart cells.
pub(crate) const MAX_RULE_ID: u32 = u32::MAX - 1;

///A rule `parent -> left right`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryRule {
    pub parent: LabelId,
    pub left: LabelId,
    pub right: LabelId,
    pub score: LogProb<f64>,
}

///A rule `parent -> child`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryRule {
    pub parent: LabelId,
    pub child: LabelId,
    pub score: LogProb<f64>,
}

///An immutable grammar whose rules can be looked up by parent, left child or right child.
///
///The lists returned by [`Grammar::binary_rules_by_parent`] keep insertion order, so a
///position in one of them (an "ordinal") identifies a rule for as long as the grammar lives.
#[derive(Debug, Clone)]
pub struct Grammar {
    labels: LabelIndexer,
    binary_rules: Vec<BinaryRule>,
    unary_rules: Vec<UnaryRule>,
    by_parent: Vec<Vec<BinaryRule>>,
    by_left: Vec<Vec<BinaryRule>>,
    by_right: Vec<Vec<BinaryRule>>,
    binary_scores: HashMap<(LabelId, LabelId, LabelId), f64>,
    unary_scores: HashMap<(LabelId, LabelId), f64>,
}

impl Grammar {
    pub fn builder(root: &str) -> GrammarBuilder {
        GrammarBuilder::new(root)
    }

    pub fn labels(&self) -> &LabelIndexer {
        &self.labels
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn root(&self) -> LabelId {
        ROOT_ID
    }

    pub fn binary_rules(&self) -> &[BinaryRule] {
        &self.binary_rules
    }

    pub fn unary_rules(&self) -> &[UnaryRule] {
        &self.unary_rules
    }

    pub fn binary_rules_by_parent(&self, parent: LabelId) -> &[BinaryRule] {
        &self.by_parent[parent]
    }

    pub fn binary_rules_by_left_child(&self, left: LabelId) -> &[BinaryRule] {
        &self.by_left[left]
    }

    pub fn binary_rules_by_right_child(&self, right: LabelId) -> &[BinaryRule] {
        &self.by_right[right]
    }

    pub fn binary_score(&self, parent: LabelId, left: LabelId, right: LabelId) -> Option<f64> {
        self.binary_scores.get(&(parent, left, right)).copied()
    }

    pub fn unary_score(&self, parent: LabelId, child: LabelId) -> Option<f64> {
        self.unary_scores.get(&(parent, child)).copied()
    }

    ///Builds the grammar obtained by renaming every label through `project`.
    ///
    ///Rules that collapse onto the same projected rule keep the best of their scores, so
    ///any derivation in `self` scores at most as well as its projection.
    pub fn project(&self, project: impl Fn(&str) -> &str) -> Result<Grammar, GrammarError> {
        let name = |id: LabelId| project(self.labels.label(id));
        let mut builder = GrammarBuilder::new(name(ROOT_ID));
        for (id, _) in self.labels.iter() {
            builder = builder.label(name(id));
        }
        for rule in self.binary_rules.iter() {
            builder = builder.binary(
                name(rule.parent),
                name(rule.left),
                name(rule.right),
                rule.score.into_inner(),
            );
        }
        for rule in self.unary_rules.iter() {
            builder = builder.unary(
                name(rule.parent),
                name(rule.child),
                rule.score.into_inner(),
            );
        }
        builder.build()
    }
}

///Collects scored rules by label name and validates them into a [`Grammar`].
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    labels: LabelIndexer,
    binary: Vec<(LabelId, LabelId, LabelId, f64)>,
    unary: Vec<(LabelId, LabelId, f64)>,
}

impl GrammarBuilder {
    pub fn new(root: &str) -> Self {
        let mut labels = LabelIndexer::new();
        labels.intern(root);
        GrammarBuilder {
            labels,
            binary: vec![],
            unary: vec![],
        }
    }

    ///Declares a label that may only appear as a preterminal.
    pub fn label(mut self, label: &str) -> Self {
        self.labels.intern(label);
        self
    }

    pub fn binary(mut self, parent: &str, left: &str, right: &str, score: f64) -> Self {
        let parent = self.labels.intern(parent);
        let left = self.labels.intern(left);
        let right = self.labels.intern(right);
        self.binary.push((parent, left, right, score));
        self
    }

    pub fn unary(mut self, parent: &str, child: &str, score: f64) -> Self {
        let parent = self.labels.intern(parent);
        let child = self.labels.intern(child);
        self.unary.push((parent, child, score));
        self
    }

    ///Validates every score and indexes the rules. Repeated rules are merged, keeping their
    ///first position and their best score.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        let GrammarBuilder {
            labels,
            binary,
            unary,
        } = self;
        let n_labels = labels.len();

        let mut binary_rules: Vec<BinaryRule> = vec![];
        let mut binary_positions: HashMap<(LabelId, LabelId, LabelId), usize> = HashMap::default();
        for (parent, left, right, score) in binary {
            let score = log_prob(score).ok_or_else(|| GrammarError::InvalidScore {
                rule: format!(
                    "{} -> {} {}",
                    labels.label(parent),
                    labels.label(left),
                    labels.label(right)
                ),
                score,
            })?;
            match binary_positions.get(&(parent, left, right)) {
                Some(&position) => {
                    let existing = &mut binary_rules[position];
                    if score > existing.score {
                        existing.score = score;
                    }
                }
                None => {
                    binary_positions.insert((parent, left, right), binary_rules.len());
                    binary_rules.push(BinaryRule {
                        parent,
                        left,
                        right,
                        score,
                    });
                }
            }
        }

        let mut unary_rules: Vec<UnaryRule> = vec![];
        let mut unary_positions: HashMap<(LabelId, LabelId), usize> = HashMap::default();
        for (parent, child, score) in unary {
            let score = log_prob(score).ok_or_else(|| GrammarError::InvalidScore {
                rule: format!("{} -> {}", labels.label(parent), labels.label(child)),
                score,
            })?;
            match unary_positions.get(&(parent, child)) {
                Some(&position) => {
                    let existing = &mut unary_rules[position];
                    if score > existing.score {
                        existing.score = score;
                    }
                }
                None => {
                    unary_positions.insert((parent, child), unary_rules.len());
                    unary_rules.push(UnaryRule {
                        parent,
                        child,
                        score,
                    });
                }
            }
        }

        if binary_rules.len() > MAX_RULE_ID as usize {
            return Err(GrammarError::TooManyRules(binary_rules.len()));
        }

        let mut by_parent = vec![vec![]; n_labels];
        let mut by_left = vec![vec![]; n_labels];
        let mut by_right = vec![vec![]; n_labels];
        for rule in binary_rules.iter() {
            by_parent[rule.parent].push(*rule);
            by_left[rule.left].push(*rule);
            by_right[rule.right].push(*rule);
        }

        let binary_scores = binary_rules
            .iter()
            .map(|r| ((r.parent, r.left, r.right), r.score.into_inner()))
            .collect();
        let unary_scores = unary_rules
            .iter()
            .map(|r| ((r.parent, r.child), r.score.into_inner()))
            .collect();

        Ok(Grammar {
            labels,
            binary_rules,
            unary_rules,
            by_parent,
            by_left,
            by_right,
            binary_scores,
            unary_scores,
        })
    }
}

///Accepts finite, non-positive log-probabilities.
pub(crate) fn log_prob(score: f64) -> Option<LogProb<f64>> {
    if score.is_finite() {
        LogProb::new(score).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn toy() -> Result<Grammar> {
        Ok(Grammar::builder("ROOT")
            .unary("ROOT", "S", 0.0)
            .binary("S", "NP", "VP", -0.1)
            .binary("VP", "V", "NP", -0.5)
            .binary("VP", "VP", "PP", -1.0)
            .binary("NP", "NP", "PP", -2.0)
            .unary("NP", "N", -0.3)
            .label("P")
            .build()?)
    }

    #[test]
    fn indexes_rules() -> Result<()> {
        let g = toy()?;
        let id = |l: &str| g.labels().index_of(l).unwrap();
        assert_eq!(g.root(), id("ROOT"));
        assert_eq!(g.num_labels(), 8);
        assert_eq!(g.binary_rules().len(), 4);
        assert_eq!(g.unary_rules().len(), 2);

        let vp: Vec<_> = g
            .binary_rules_by_parent(id("VP"))
            .iter()
            .map(|r| (r.left, r.right))
            .collect();
        assert_eq!(vp, vec![(id("V"), id("NP")), (id("VP"), id("PP"))]);

        let right_np: Vec<_> = g
            .binary_rules_by_right_child(id("NP"))
            .iter()
            .map(|r| r.parent)
            .collect();
        assert_eq!(right_np, vec![id("VP")]);

        let left_np: Vec<_> = g
            .binary_rules_by_left_child(id("NP"))
            .iter()
            .map(|r| r.parent)
            .collect();
        assert_eq!(left_np, vec![id("S"), id("NP")]);
        assert!(g.binary_rules_by_parent(id("P")).is_empty());

        assert_eq!(g.binary_score(id("S"), id("NP"), id("VP")), Some(-0.1));
        assert_eq!(g.binary_score(id("S"), id("VP"), id("NP")), None);
        assert_eq!(g.unary_score(id("NP"), id("N")), Some(-0.3));
        Ok(())
    }

    #[test]
    fn repeated_rules_keep_best_score() -> Result<()> {
        let g = Grammar::builder("ROOT")
            .binary("ROOT", "A", "B", -3.0)
            .binary("ROOT", "A", "A", -1.0)
            .binary("ROOT", "A", "B", -0.5)
            .unary("A", "B", -2.0)
            .unary("A", "B", -4.0)
            .build()?;
        let scores: Vec<_> = g
            .binary_rules_by_parent(0)
            .iter()
            .map(|r| r.score.into_inner())
            .collect();
        assert_eq!(scores, vec![-0.5, -1.0]);
        assert_eq!(g.unary_rules().len(), 1);
        assert_eq!(g.unary_rules()[0].score.into_inner(), -2.0);
        Ok(())
    }

    #[test]
    fn rejects_bad_scores() {
        let err = Grammar::builder("ROOT")
            .binary("ROOT", "A", "B", 0.5)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            GrammarError::InvalidScore {
                rule: "ROOT -> A B".to_string(),
                score: 0.5
            }
        );
        assert!(
            Grammar::builder("ROOT")
                .unary("ROOT", "A", f64::NAN)
                .build()
                .is_err()
        );
        assert!(
            Grammar::builder("ROOT")
                .unary("ROOT", "A", f64::NEG_INFINITY)
                .build()
                .is_err()
        );
    }

    #[test]
    fn projection_keeps_best_scores() -> Result<()> {
        let fine = Grammar::builder("ROOT")
            .unary("ROOT", "S^ROOT", 0.0)
            .binary("S^ROOT", "NP^S", "VP^S", -0.2)
            .binary("S^ROOT", "NP^VP", "VP^S", -0.7)
            .unary("NP^S", "NN^NP", -1.5)
            .unary("NP^VP", "NN^NP", -0.5)
            .build()?;
        let coarse = fine.project(|l| l.split('^').next().unwrap_or(l))?;
        let id = |l: &str| coarse.labels().index_of(l).unwrap();
        assert_eq!(coarse.num_labels(), 5);
        assert_eq!(coarse.root(), id("ROOT"));
        assert_eq!(coarse.binary_rules().len(), 1);
        assert_eq!(coarse.binary_score(id("S"), id("NP"), id("VP")), Some(-0.2));
        assert_eq!(coarse.unary_score(id("NP"), id("NN")), Some(-0.5));
        assert_eq!(coarse.unary_score(id("ROOT"), id("S")), Some(0.0));
        Ok(())
    }
}
