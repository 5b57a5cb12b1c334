//! Flat chart tables addressed by `(label, i, j)`.
//!
//! A span `(i, j)` starts at word `i` and leaves `j` words to its right, so it covers
//! `[i, n - j)` and is only valid when `i + j < n`.

///How chart cells are laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartLayout {
    ///Cells grouped by `i + j` then by `i`, labels innermost. No slot is wasted.
    #[default]
    Triangular,
    ///A full `labels × n × n` cube, half of which is never touched.
    Rectangular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChartShape {
    layout: ChartLayout,
    n_labels: usize,
    length: usize,
}

impl ChartShape {
    pub(crate) fn new(layout: ChartLayout, n_labels: usize, length: usize) -> Self {
        ChartShape {
            layout,
            n_labels,
            length,
        }
    }

    pub(crate) fn slots(&self) -> usize {
        let n = self.length;
        match self.layout {
            ChartLayout::Triangular => self.n_labels * n * (n + 1) / 2,
            ChartLayout::Rectangular => self.n_labels * n * n,
        }
    }

    #[inline]
    pub(crate) fn index(&self, label: usize, i: usize, j: usize) -> usize {
        debug_assert!(label < self.n_labels && i + j < self.length);
        match self.layout {
            ChartLayout::Triangular => {
                let sum = i + j;
                (sum * (sum + 1) / 2 + i) * self.n_labels + label
            }
            ChartLayout::Rectangular => (label * self.length + i) * self.length + j,
        }
    }
}

///One value per `(label, span)`.
#[derive(Debug, Clone)]
pub(crate) struct Table<T> {
    shape: ChartShape,
    cells: Vec<T>,
}

impl<T: Copy> Table<T> {
    pub(crate) fn filled(shape: ChartShape, value: T) -> Self {
        Table {
            shape,
            cells: vec![value; shape.slots()],
        }
    }

    #[inline]
    pub(crate) fn get(&self, label: usize, i: usize, j: usize) -> T {
        self.cells[self.shape.index(label, i, j)]
    }

    #[inline]
    pub(crate) fn set(&mut self, label: usize, i: usize, j: usize, value: T) {
        let index = self.shape.index(label, i, j);
        self.cells[index] = value;
    }
}

///Iterates the spans whose `i + j` equals `sum`, left to right.
pub(crate) fn spans_with_sum(sum: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..=sum).map(move |i| (i, sum - i))
}
