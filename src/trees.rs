//! Labelled n-ary trees, as read from treebanks and produced by the parser.
use std::fmt::Display;
use std::str::FromStr;

use chumsky::prelude::*;
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

///A labelled tree. Words are leaves: nodes without children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tree<L = String> {
    label: L,
    children: Vec<Tree<L>>,
}

impl<L> Tree<L> {
    pub fn new(label: L, children: Vec<Tree<L>>) -> Self {
        Tree { label, children }
    }

    pub fn leaf(label: L) -> Self {
        Tree {
            label,
            children: vec![],
        }
    }

    pub fn label(&self) -> &L {
        &self.label
    }

    pub fn children(&self) -> &[Tree<L>] {
        &self.children
    }

    pub fn into_parts(self) -> (L, Vec<Tree<L>>) {
        (self.label, self.children)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    ///A node whose only child is a word.
    pub fn is_preterminal(&self) -> bool {
        matches!(self.children.as_slice(), [child] if child.is_leaf())
    }

    ///The words of the tree, left to right.
    pub fn leaves(&self) -> Vec<&L> {
        let mut leaves = vec![];
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a L>) {
        if self.is_leaf() {
            leaves.push(&self.label);
        }
        for child in self.children.iter() {
            child.collect_leaves(leaves);
        }
    }

    ///Labels of the non-leaf nodes in pre-order.
    pub fn node_labels(&self) -> Vec<&L> {
        let mut labels = vec![];
        self.collect_node_labels(&mut labels);
        labels
    }

    fn collect_node_labels<'a>(&'a self, labels: &mut Vec<&'a L>) {
        if !self.is_leaf() {
            labels.push(&self.label);
        }
        for child in self.children.iter() {
            child.collect_node_labels(labels);
        }
    }

    pub fn map_labels<M>(&self, f: &impl Fn(&L) -> M) -> Tree<M> {
        Tree {
            label: f(&self.label),
            children: self.children.iter().map(|c| c.map_labels(f)).collect(),
        }
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Tree::depth).max().unwrap_or(0)
    }
}

impl<L: Display> Display for Tree<L> {
    ///Penn treebank bracketing, e.g. `(ROOT (NP Vice) (VP President))`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_leaf() {
            write!(f, "{}", self.label)
        } else {
            write!(f, "({} {})", self.label, self.children.iter().join(" "))
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Could not read tree: {0}")]
pub struct TreeParseError(String);

fn tree_parser<'src>()
-> impl Parser<'src, &'src str, Tree<&'src str>, extra::Err<Rich<'src, char>>> {
    let token = any()
        .and_is(none_of(['(', ')', ' ', '\t', '\n', '\r']))
        .repeated()
        .at_least(1)
        .to_slice()
        .labelled("token");

    recursive(|tree| {
        let child = choice((tree, token.map(Tree::leaf)));
        just('(')
            .ignore_then(token.padded().labelled("label"))
            .then(
                child
                    .padded()
                    .repeated()
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .labelled("children"),
            )
            .then_ignore(just(')'))
            .map(|(label, children)| Tree::new(label, children))
    })
}

impl<'src> Tree<&'src str> {
    ///Reads a single bracketed tree, borrowing labels from `s`.
    pub fn parse(s: &'src str) -> Result<Self, TreeParseError> {
        tree_parser()
            .padded()
            .then_ignore(end())
            .parse(s)
            .into_result()
            .map_err(|errors| {
                TreeParseError(errors.into_iter().map(|e| e.to_string()).join("\n"))
            })
    }
}

impl FromStr for Tree<String> {
    type Err = TreeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Tree::<&str>::parse(s)?.map_labels(&|l: &&str| l.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn reading_and_printing() -> Result<()> {
        let s = "(ROOT (S (NP (DT the) (NN dog)) (VP (VBZ barks))))";
        let tree: Tree = s.parse()?;
        assert_eq!(tree.to_string(), s);
        assert_eq!(tree.label(), "ROOT");
        assert_eq!(tree.leaves(), vec!["the", "dog", "barks"]);
        assert_eq!(
            tree.node_labels(),
            vec!["ROOT", "S", "NP", "DT", "NN", "VP", "VBZ"]
        );
        assert_eq!(tree.depth(), 5);
        assert!(!tree.is_preterminal());
        let verb = &tree.children()[0].children()[1];
        assert!(verb.children()[0].is_preterminal());

        let spaced: Tree = "  ( ROOT\n\t(NN  Odds) )\n".parse()?;
        assert_eq!(spaced.to_string(), "(ROOT (NN Odds))");
        Ok(())
    }

    #[test]
    fn borrowed_labels() -> Result<()> {
        let tree = Tree::<&str>::parse("(NP (NNP Vice) (NNP President))")?;
        assert_eq!(*tree.label(), "NP");
        assert_eq!(tree.children().len(), 2);
        Ok(())
    }

    #[test]
    fn malformed_trees() {
        assert!("(ROOT (NP Vice)".parse::<Tree>().is_err());
        assert!("(ROOT)".parse::<Tree>().is_err());
        assert!("ROOT".parse::<Tree>().is_err());
        assert!("(ROOT a) (ROOT b)".parse::<Tree>().is_err());
    }

    #[test]
    fn building_by_hand() {
        let tree = Tree::new(
            "ROOT",
            vec![
                Tree::new("NP", vec![Tree::leaf("Vice")]),
                Tree::new("VP", vec![Tree::leaf("President")]),
            ],
        );
        assert_eq!(tree.to_string(), "(ROOT (NP Vice) (VP President))");
        let owned = tree.map_labels(&|l: &&str| l.to_lowercase());
        assert_eq!(owned.leaves(), vec!["vice", "president"]);
        let (label, children) = owned.into_parts();
        assert_eq!(label, "root");
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn json_export() -> Result<()> {
        let tree: Tree = "(ROOT (NN Odds))".parse()?;
        let json = serde_json::to_value(&tree)?;
        assert_eq!(
            json,
            serde_json::json!({
                "label": "ROOT",
                "children": [{"label": "NN", "children": [{"label": "Odds", "children": []}]}]
            })
        );
        Ok(())
    }
}
