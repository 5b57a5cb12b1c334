//! Rebuilding the best derivation from the fine chart's backpointers.
use super::inside::{Inside, NO_UNARY, UNSET};
use super::{ParseError, ParserModel};
use crate::labels::LabelId;
use crate::trees::Tree;

pub(crate) struct Extractor<'a, L, S> {
    pub(crate) model: &'a ParserModel<L>,
    pub(crate) chart: &'a Inside,
    pub(crate) words: &'a [S],
}

impl<L, S: AsRef<str>> Extractor<'_, L, S> {
    fn name(&self, label: LabelId) -> String {
        self.model.grammar.labels().label(label).to_string()
    }

    fn missing(&self, label: LabelId, i: usize, j: usize) -> ParseError {
        ParseError::MissingBackpointer {
            label: self.name(label),
            i,
            j,
        }
    }

    ///The best constituent `label` over `(i, j)`, unary chain included.
    pub(crate) fn unary_tree(
        &self,
        label: LabelId,
        i: usize,
        j: usize,
    ) -> Result<Tree, ParseError> {
        let backpointers = self
            .chart
            .backpointers
            .as_ref()
            .ok_or_else(|| self.missing(label, i, j))?;
        match backpointers.unary.get(label, i, j) {
            NO_UNARY => self.binary_tree(label, i, j),
            UNSET => Err(self.missing(label, i, j)),
            id => {
                let rule = self.model.closure.rule(id);
                let mut tree = self.binary_tree(rule.child, i, j)?;
                let (_, above) = rule
                    .path()
                    .split_last()
                    .ok_or_else(|| self.missing(label, i, j))?;
                for ancestor in above.iter().rev() {
                    tree = Tree::new(self.name(*ancestor), vec![tree]);
                }
                Ok(tree)
            }
        }
    }

    ///The best constituent `label` over `(i, j)` built by a binary rule, or the word itself
    ///when the span is a single word.
    pub(crate) fn binary_tree(
        &self,
        label: LabelId,
        i: usize,
        j: usize,
    ) -> Result<Tree, ParseError> {
        let n = self.words.len();
        if i + j == n - 1 {
            let word = Tree::leaf(self.words[i].as_ref().to_string());
            return Ok(Tree::new(self.name(label), vec![word]));
        }

        let backpointers = self
            .chart
            .backpointers
            .as_ref()
            .ok_or_else(|| self.missing(label, i, j))?;
        let ordinal = backpointers.rule.get(label, i, j);
        let k = backpointers.split.get(label, i, j);
        if ordinal == UNSET || k == UNSET {
            return Err(self.missing(label, i, j));
        }
        let rule = self
            .model
            .grammar
            .binary_rules_by_parent(label)
            .get(ordinal as usize)
            .ok_or_else(|| self.missing(label, i, j))?;
        let k = k as usize;
        let left = self.unary_tree(rule.left, i, n - k)?;
        let right = self.unary_tree(rule.right, k, j)?;
        Ok(Tree::new(self.name(label), vec![left, right]))
    }
}
