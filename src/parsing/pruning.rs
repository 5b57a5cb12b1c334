use super::chart::Table;
use super::inside::Inside;
use crate::labels::LabelId;

///Which of the two cells of a span is being filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cell {
    Binary,
    Unary,
}

///Decides which fine cells are skipped, from the posterior of their coarse label.
#[derive(Debug)]
pub(crate) struct Pruner<'a> {
    pub(crate) coarse: &'a Inside,
    pub(crate) binary_outside: &'a Table<f64>,
    pub(crate) total: f64,
    pub(crate) threshold: f64,
    pub(crate) fine_to_coarse: &'a [LabelId],
}

impl Pruner<'_> {
    ///Log-posterior of the coarse counterpart of `label` over `(i, j)`.
    pub(crate) fn marginal(&self, label: LabelId, i: usize, j: usize, cell: Cell) -> f64 {
        let coarse = self.fine_to_coarse[label];
        let inside = match cell {
            Cell::Binary => self.coarse.binary.get(coarse, i, j),
            Cell::Unary => self.coarse.unary.get(coarse, i, j),
        };
        -self.total + self.binary_outside.get(coarse, i, j) + inside
    }

    #[inline]
    pub(crate) fn prunes(&self, label: LabelId, i: usize, j: usize, cell: Cell) -> bool {
        self.marginal(label, i, j, cell) < self.threshold
    }
}
