//! Viterbi outside scores over the coarse chart.
use tracing::trace;

use super::chart::{ChartLayout, ChartShape, Table, spans_with_sum};
use super::inside::Inside;
use super::{ParseContext, ParseError, ParserModel};
use crate::lexicon::Lexicon;

///Best outside scores, split like [`Inside`]: `unary` is the context of a constituent once
///unary rules have applied above it, `binary` the context of the constituent before them.
#[derive(Debug, Clone)]
pub(crate) struct Outside {
    pub(crate) unary: Table<f64>,
    pub(crate) binary: Table<f64>,
}

pub(crate) fn outside<L: Lexicon, S: AsRef<str>>(
    model: &ParserModel<L>,
    context: &mut ParseContext<'_, S>,
    layout: ChartLayout,
    inside: &Inside,
) -> Result<Outside, ParseError> {
    let n = context.len();
    let n_labels = model.grammar.num_labels();
    let shape = ChartShape::new(layout, n_labels, n);
    let mut chart = Outside {
        unary: Table::filled(shape, f64::NEG_INFINITY),
        binary: Table::filled(shape, f64::NEG_INFINITY),
    };
    chart.unary.set(model.grammar.root(), 0, 0, 0.0);

    for sum in 0..n {
        for (i, j) in spans_with_sum(sum) {
            if sum > 0 {
                for x in 0..n_labels {
                    let mut best = f64::NEG_INFINITY;
                    for rule in model.grammar.binary_rules_by_right_child(x) {
                        context.charge(i as u64)?;
                        for k in 0..i {
                            let score = rule.score.into_inner()
                                + chart.binary.get(rule.parent, k, j)
                                + inside.unary.get(rule.left, k, n - i);
                            best = best.max(score);
                        }
                    }
                    for rule in model.grammar.binary_rules_by_left_child(x) {
                        context.charge(j as u64)?;
                        for k in 0..j {
                            let score = rule.score.into_inner()
                                + chart.binary.get(rule.parent, i, k)
                                + inside.unary.get(rule.right, n - j, k);
                            best = best.max(score);
                        }
                    }
                    chart.unary.set(x, i, j, best);
                }
            }

            for x in 0..n_labels {
                let mut best = f64::NEG_INFINITY;
                let mut self_looped = false;
                for (_, rule) in model.closure.by_child(x) {
                    self_looped |= rule.is_reflexive();
                    best = best.max(rule.score.into_inner() + chart.unary.get(rule.parent, i, j));
                }
                if !self_looped {
                    best = best.max(chart.unary.get(x, i, j));
                }
                chart.binary.set(x, i, j, best);
            }
        }
        trace!(sum, "outside row done");
    }
    Ok(chart)
}
