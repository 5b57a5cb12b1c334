//! Coarse-to-fine Viterbi parsing.
//!
//! A sentence is first parsed with a small coarse grammar. Inside and outside scores of the
//! coarse chart give the posterior of every coarse constituent, and fine constituents whose
//! coarse counterpart is too unlikely are never built. The fine pass then runs CYK over what
//! is left and keeps backpointers so that the best derivation can be read back.
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::annotation::{self, coarse_label, unannotate};
use crate::grammar::{Grammar, GrammarError, UnaryClosure};
use crate::labels::LabelId;
use crate::lexicon::Lexicon;
use crate::trees::Tree;
use crate::{ParserConfig, Pruning};

pub(crate) mod chart;
mod inside;
mod outside;
mod pruning;
mod trees;

pub use chart::ChartLayout;
use inside::inside;
use outside::outside;
use pruning::Pruner;
use trees::Extractor;

///Errors that abort the parse of a single sentence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("word {position} ({word}) scored {score} as {label}; it must not be positive")]
    PositiveTaggingScore {
        word: String,
        label: String,
        position: usize,
        score: f64,
    },
    #[error("sentence has {length} words but at most {max} are allowed")]
    SentenceTooLong { length: usize, max: usize },
    #[error("gave up after examining more than {0} edges")]
    BudgetExhausted(u64),
    #[error("{label} has a finite score over ({i}, {j}) but no backpointer")]
    MissingBackpointer { label: String, i: usize, j: usize },
    #[error("{0} does not fit in a chart backpointer")]
    BackpointerOverflow(usize),
}

impl ParseError {
    ///Errors that can only come from a broken lexicon or a bug in the parser, as opposed to
    ///limits set in [`ParserConfig`].
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            ParseError::PositiveTaggingScore { .. } | ParseError::MissingBackpointer { .. }
        )
    }
}

///A grammar, its unary closure and its lexicon.
#[derive(Debug, Clone)]
pub struct ParserModel<L> {
    grammar: Grammar,
    closure: UnaryClosure,
    lexicon: L,
}

impl<L: Lexicon> ParserModel<L> {
    pub fn new(grammar: Grammar, lexicon: L) -> Result<Self, GrammarError> {
        let closure = UnaryClosure::new(&grammar)?;
        Ok(ParserModel {
            grammar,
            closure,
            lexicon,
        })
    }

    ///Uses a precomputed closure, which must have been built from `grammar`.
    pub fn with_closure(grammar: Grammar, closure: UnaryClosure, lexicon: L) -> Self {
        ParserModel {
            grammar,
            closure,
            lexicon,
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn closure(&self) -> &UnaryClosure {
        &self.closure
    }

    pub fn lexicon(&self) -> &L {
        &self.lexicon
    }

    ///Log-probability of a derivation given with this model's labels, recomputed from the
    ///base rules and the lexicon. Returns [`None`] if the tree uses an unknown label or a
    ///rule the grammar lacks.
    pub fn score_derivation(&self, tree: &Tree) -> Option<f64> {
        let labels = self.grammar.labels();
        let parent = labels.index_of(tree.label())?;
        match tree.children() {
            [word] if word.is_leaf() => {
                let score = self.lexicon.score_tagging(word.label(), tree.label());
                Some(if score.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    score
                })
            }
            [child] => {
                let child_id = labels.index_of(child.label())?;
                Some(self.grammar.unary_score(parent, child_id)? + self.score_derivation(child)?)
            }
            [left, right] => {
                let left_id = labels.index_of(left.label())?;
                let right_id = labels.index_of(right.label())?;
                Some(
                    self.grammar.binary_score(parent, left_id, right_id)?
                        + self.score_derivation(left)?
                        + self.score_derivation(right)?,
                )
            }
            _ => None,
        }
    }
}

///Per-call state: the sentence and the work done on it so far.
#[derive(Debug)]
pub(crate) struct ParseContext<'a, S> {
    words: &'a [S],
    edges: u64,
    max_edges: Option<u64>,
}

impl<'a, S: AsRef<str>> ParseContext<'a, S> {
    fn new(words: &'a [S], max_edges: Option<u64>) -> Self {
        ParseContext {
            words,
            edges: 0,
            max_edges,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.words.len()
    }

    pub(crate) fn word(&self, position: usize) -> &str {
        self.words[position].as_ref()
    }

    ///Records that `edges` more rule applications are about to be examined.
    pub(crate) fn charge(&mut self, edges: u64) -> Result<(), ParseError> {
        self.edges += edges;
        match self.max_edges {
            Some(max) if self.edges > max => Err(ParseError::BudgetExhausted(max)),
            _ => Ok(()),
        }
    }
}

///The best parse of a sentence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredParse {
    ///The parse with annotations and intermediate nodes removed.
    pub tree: Tree,
    ///The parse as derived by the fine grammar.
    pub derivation: Tree,
    ///Log-probability of `derivation` under the fine grammar.
    pub score: f64,
    ///Whether pruning lost every parse, so that the sentence was parsed again without it.
    pub used_fallback: bool,
}

///A parser using a coarse grammar to prune the chart of a fine one.
///
///The parser holds no per-sentence state, so a single instance can be shared between
///threads.
#[derive(Debug, Clone)]
pub struct CoarseToFineParser<L> {
    coarse: ParserModel<L>,
    fine: ParserModel<L>,
    fine_to_coarse: Vec<LabelId>,
    config: ParserConfig,
}

impl<L: Lexicon> CoarseToFineParser<L> {
    ///Pairs the two models, mapping each fine label onto a coarse one with
    ///[`coarse_label`].
    pub fn new(
        coarse: ParserModel<L>,
        fine: ParserModel<L>,
        config: ParserConfig,
    ) -> Result<Self, GrammarError> {
        Self::with_label_map(coarse, fine, coarse_label, config)
    }

    ///Like [`CoarseToFineParser::new`] with a custom fine to coarse label function.
    pub fn with_label_map(
        coarse: ParserModel<L>,
        fine: ParserModel<L>,
        label_map: impl Fn(&str) -> &str,
        config: ParserConfig,
    ) -> Result<Self, GrammarError> {
        let coarse_labels = coarse.grammar.labels();
        let fine_to_coarse = fine
            .grammar
            .labels()
            .iter()
            .map(|(_, label)| {
                coarse_labels
                    .index_of(label_map(label))
                    .ok_or_else(|| GrammarError::UnmappedLabel(label.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fine_root = fine.grammar.root();
        let coarse_root = coarse.grammar.root();
        if fine_to_coarse[fine_root] != coarse_root {
            return Err(GrammarError::RootMismatch {
                fine: fine.grammar.labels().label(fine_root).to_string(),
                coarse: coarse_labels.label(coarse_root).to_string(),
            });
        }

        Ok(CoarseToFineParser {
            coarse,
            fine,
            fine_to_coarse,
            config,
        })
    }

    pub fn coarse(&self) -> &ParserModel<L> {
        &self.coarse
    }

    pub fn fine(&self) -> &ParserModel<L> {
        &self.fine
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    ///`(ROOT JUNK)`, labelled with the fine root.
    pub fn failure_tree(&self) -> Tree {
        let root = self.fine.grammar.root();
        annotation::failure_tree(self.fine.grammar.labels().label(root))
    }

    ///The best parse of `sentence`, or [`None`] if it has none even without pruning.
    pub fn try_best_parse<S: AsRef<str>>(
        &self,
        sentence: &[S],
    ) -> Result<Option<ScoredParse>, ParseError> {
        self.parse_with(sentence, self.config.pruning)
    }

    ///The de-annotated best parse of `sentence`, or [`CoarseToFineParser::failure_tree`].
    ///
    ///# Panics
    ///In debug builds, if the parse hits an invariant violation such as a positive tagging
    ///score. Release builds log it and return the failure tree.
    pub fn best_parse<S: AsRef<str>>(&self, sentence: &[S]) -> Tree {
        match self.try_best_parse(sentence) {
            Ok(Some(parse)) => parse.tree,
            Ok(None) => {
                debug!(length = sentence.len(), "no parse, returning the failure tree");
                self.failure_tree()
            }
            Err(e) => {
                if cfg!(debug_assertions) && e.is_invariant_violation() {
                    panic!("{e}");
                }
                warn!(error = %e, "parse failed, returning the failure tree");
                self.failure_tree()
            }
        }
    }

    fn parse_with<S: AsRef<str>>(
        &self,
        sentence: &[S],
        pruning: Pruning,
    ) -> Result<Option<ScoredParse>, ParseError> {
        let n = sentence.len();
        if n == 0 {
            return Ok(None);
        }
        match self.config.max_length {
            Some(max) if n > max => return Err(ParseError::SentenceTooLong { length: n, max }),
            _ => (),
        }
        let layout = self.config.layout;
        let mut context = ParseContext::new(sentence, self.config.max_edges);

        let coarse_charts = match pruning {
            Pruning::Threshold(threshold) => {
                let coarse_inside = inside(&self.coarse, &mut context, layout, None, false)?;
                let total = coarse_inside.unary.get(self.coarse.grammar.root(), 0, 0);
                debug!(total, "coarse inside pass");
                if total == f64::NEG_INFINITY {
                    debug!("coarse grammar has no parse, the fine pass will not be pruned");
                    None
                } else {
                    let coarse_outside =
                        outside(&self.coarse, &mut context, layout, &coarse_inside)?;
                    Some((coarse_inside, coarse_outside, total, threshold))
                }
            }
            Pruning::Disabled => None,
        };
        let pruner = coarse_charts
            .as_ref()
            .map(|(coarse_inside, coarse_outside, total, threshold)| Pruner {
                coarse: coarse_inside,
                binary_outside: &coarse_outside.binary,
                total: *total,
                threshold: *threshold,
                fine_to_coarse: &self.fine_to_coarse,
            });

        let chart = inside(&self.fine, &mut context, layout, pruner.as_ref(), true)?;
        let root = self.fine.grammar.root();
        let score = chart.unary.get(root, 0, 0);
        debug!(score, edges = context.edges, "fine inside pass");

        if score == f64::NEG_INFINITY {
            if pruner.is_some() {
                debug!("pruning removed every parse, retrying without it");
                return Ok(self
                    .parse_with(sentence, Pruning::Disabled)?
                    .map(|parse| ScoredParse {
                        used_fallback: true,
                        ..parse
                    }));
            }
            return Ok(None);
        }

        let derivation = Extractor {
            model: &self.fine,
            chart: &chart,
            words: sentence,
        }
        .unary_tree(root, 0, 0)?;
        Ok(Some(ScoredParse {
            tree: unannotate(&derivation),
            derivation,
            score,
            used_fallback: false,
        }))
    }
}
