//! Viterbi CYK over one grammar, optionally pruned and optionally keeping backpointers.
use tracing::trace;

use super::chart::{ChartLayout, ChartShape, Table, spans_with_sum};
use super::pruning::{Cell, Pruner};
use super::{ParseContext, ParseError, ParserModel};
use crate::grammar::MAX_RULE_ID;
use crate::lexicon::Lexicon;

///Backpointer value of a cell that was never filled.
pub(crate) const UNSET: u32 = u32::MAX;

///Unary backpointer of a cell whose best analysis takes no unary step.
pub(crate) const NO_UNARY: u32 = MAX_RULE_ID;

///Best inside scores: `binary` holds constituents built by a binary rule (or a word),
///`unary` the same constituents after at most one closed unary step.
#[derive(Debug, Clone)]
pub(crate) struct Inside {
    pub(crate) binary: Table<f64>,
    pub(crate) unary: Table<f64>,
    pub(crate) backpointers: Option<Backpointers>,
}

///Winning choices of the fine pass: rule ordinals within the parent's rule list, split
///points and closed unary rule ids.
#[derive(Debug, Clone)]
pub(crate) struct Backpointers {
    pub(crate) rule: Table<u32>,
    pub(crate) split: Table<u32>,
    pub(crate) unary: Table<u32>,
}

impl Backpointers {
    fn new(shape: ChartShape) -> Self {
        Backpointers {
            rule: Table::filled(shape, UNSET),
            split: Table::filled(shape, UNSET),
            unary: Table::filled(shape, UNSET),
        }
    }
}

pub(crate) fn inside<L: Lexicon, S: AsRef<str>>(
    model: &ParserModel<L>,
    context: &mut ParseContext<'_, S>,
    layout: ChartLayout,
    pruner: Option<&Pruner<'_>>,
    keep_backpointers: bool,
) -> Result<Inside, ParseError> {
    let n = context.len();
    let n_labels = model.grammar.num_labels();
    let shape = ChartShape::new(layout, n_labels, n);
    let mut chart = Inside {
        binary: Table::filled(shape, f64::NEG_INFINITY),
        unary: Table::filled(shape, f64::NEG_INFINITY),
        backpointers: keep_backpointers.then(|| Backpointers::new(shape)),
    };
    let pruned = |label, i, j, cell| pruner.is_some_and(|p| p.prunes(label, i, j, cell));

    for sum in (0..n).rev() {
        for (i, j) in spans_with_sum(sum) {
            for x in 0..n_labels {
                if pruned(x, i, j, Cell::Binary) {
                    continue;
                }
                if sum == n - 1 {
                    let score = tagging_score(model, context, x, i)?;
                    chart.binary.set(x, i, j, score);
                    continue;
                }

                let mut best = f64::NEG_INFINITY;
                let mut best_choice = None;
                let rules = model.grammar.binary_rules_by_parent(x);
                for (ordinal, rule) in rules.iter().enumerate() {
                    context.charge((n - j - i - 1) as u64)?;
                    let rule_score = rule.score.into_inner();
                    for k in i + 1..n - j {
                        let partial = rule_score + chart.unary.get(rule.left, i, n - k);
                        if partial <= best {
                            continue;
                        }
                        let score = partial + chart.unary.get(rule.right, k, j);
                        if score > best {
                            best = score;
                            best_choice = Some((ordinal, k));
                        }
                    }
                }
                chart.binary.set(x, i, j, best);
                if let (Some(backpointers), Some((ordinal, k))) =
                    (chart.backpointers.as_mut(), best_choice)
                {
                    backpointers.rule.set(x, i, j, backpointer(ordinal)?);
                    backpointers.split.set(x, i, j, backpointer(k)?);
                }
            }

            for x in 0..n_labels {
                if pruned(x, i, j, Cell::Unary) {
                    continue;
                }
                let mut best = f64::NEG_INFINITY;
                let mut best_rule = UNSET;
                let mut self_looped = false;
                for (id, rule) in model.closure.by_parent(x) {
                    self_looped |= rule.is_reflexive();
                    let score = rule.score.into_inner() + chart.binary.get(rule.child, i, j);
                    if score > best {
                        best = score;
                        best_rule = id;
                    }
                }
                if !self_looped {
                    let score = chart.binary.get(x, i, j);
                    if score > best {
                        best = score;
                        best_rule = NO_UNARY;
                    }
                }
                chart.unary.set(x, i, j, best);
                if let Some(backpointers) = chart.backpointers.as_mut() {
                    backpointers.unary.set(x, i, j, best_rule);
                }
            }
        }
        trace!(sum, "inside row done");
    }
    Ok(chart)
}

///Narrows a rule ordinal or split point to a backpointer, keeping it clear of the
///sentinels.
pub(super) fn backpointer(value: usize) -> Result<u32, ParseError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v < MAX_RULE_ID)
        .ok_or(ParseError::BackpointerOverflow(value))
}

fn tagging_score<L: Lexicon, S: AsRef<str>>(
    model: &ParserModel<L>,
    context: &ParseContext<'_, S>,
    label: usize,
    position: usize,
) -> Result<f64, ParseError> {
    let word = context.word(position);
    let tag = model.grammar.labels().label(label);
    let score = model.lexicon.score_tagging(word, tag);
    if score.is_nan() {
        Ok(f64::NEG_INFINITY)
    } else if score > 0.0 {
        Err(ParseError::PositiveTaggingScore {
            word: word.to_string(),
            label: tag.to_string(),
            position,
            score,
        })
    } else {
        Ok(score)
    }
}
