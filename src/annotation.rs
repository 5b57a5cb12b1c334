//! Binarization and label annotation of treebank trees, and its inverse.
//!
//! Both annotators binarize n-ary constituents into right-branching chains of intermediate
//! nodes labelled `@X->...`. The coarse annotator stops there; the fine annotator also marks
//! every label with its parent and grandparent, unary nodes with `-U`, and keeps the last two
//! siblings in the intermediate labels. [`coarse_label`] maps fine labels onto coarse ones,
//! and [`unannotate`] undoes either annotation.
use ahash::HashMap;

use crate::trees::Tree;

///Prefix of labels introduced by binarization.
pub const INTERMEDIATE_PREFIX: char = '@';

///Label of the tree returned when a sentence has no parse.
pub const FAILURE_LABEL: &str = "JUNK";

///`(ROOT JUNK)`, the placeholder returned for sentences without a parse.
pub fn failure_tree(root: &str) -> Tree<String> {
    Tree::new(
        root.to_string(),
        vec![Tree::leaf(FAILURE_LABEL.to_string())],
    )
}

///Binarizes without annotating: intermediate nodes are all labelled `@X->`.
pub fn annotate_coarse(tree: &Tree<String>) -> Tree<String> {
    if tree.is_leaf() {
        return tree.clone();
    }
    let label = tree.label();
    match tree.children() {
        [child] => Tree::new(label.clone(), vec![annotate_coarse(child)]),
        children => {
            let header = format!("{INTERMEDIATE_PREFIX}{label}->");
            let children = coarse_chain(children, &header).into_parts().1;
            Tree::new(label.clone(), children)
        }
    }
}

fn coarse_chain(children: &[Tree<String>], header: &str) -> Tree<String> {
    let mut binarized = vec![annotate_coarse(&children[0])];
    if children.len() > 1 {
        binarized.push(coarse_chain(&children[1..], header));
    }
    Tree::new(header.to_string(), binarized)
}

///Binarizes with second-order vertical and horizontal markovization.
pub fn annotate_fine(tree: &Tree<String>) -> Tree<String> {
    fine_node(tree, "", "")
}

fn fine_node(tree: &Tree<String>, parent: &str, grandparent: &str) -> Tree<String> {
    let label = tree.label();
    if tree.is_leaf() {
        return tree.clone();
    }

    let mut annotated = label.clone();
    for ancestor in [parent, grandparent] {
        if !ancestor.is_empty() {
            annotated.push('^');
            annotated.push_str(ancestor);
        }
    }

    match tree.children() {
        [child] => {
            if !tree.is_preterminal() && label != "ROOT" {
                annotated.push_str("-U");
            }
            let mut parent = parent.to_string();
            if child.label() == "RB" || child.label() == "DT" {
                parent.push_str("^U");
            }
            Tree::new(annotated, vec![fine_node(child, label, &parent)])
        }
        children => {
            let header = format!("{INTERMEDIATE_PREFIX}{label}->");
            let chain = fine_chain(children, &header, "", "", label, parent);
            Tree::new(annotated, chain.into_parts().1)
        }
    }
}

fn fine_chain(
    children: &[Tree<String>],
    header: &str,
    previous: &str,
    before_previous: &str,
    parent: &str,
    grandparent: &str,
) -> Tree<String> {
    let first = &children[0];
    let mut binarized = vec![fine_node(first, parent, grandparent)];
    if children.len() > 1 {
        binarized.push(fine_chain(
            &children[1..],
            header,
            first.label(),
            previous,
            parent,
            grandparent,
        ));
    }
    let mut label = header.to_string();
    for sibling in [before_previous, previous] {
        if !sibling.is_empty() {
            label.push('_');
            label.push_str(sibling);
        }
    }
    Tree::new(label, binarized)
}

///Drops the oldest sibling from the history of every intermediate label seen fewer than
///`min_occurrences` times across `trees`.
pub fn collapse_rare_labels(trees: &mut [Tree<String>], min_occurrences: usize) {
    let mut counts: HashMap<String, usize> = HashMap::default();
    for tree in trees.iter() {
        tally(tree, &mut counts);
    }
    for tree in trees.iter_mut() {
        *tree = collapse(tree, &counts, min_occurrences);
    }
}

fn tally(tree: &Tree<String>, counts: &mut HashMap<String, usize>) {
    if tree.is_leaf() || tree.is_preterminal() {
        return;
    }
    *counts.entry(tree.label().clone()).or_default() += 1;
    for child in tree.children() {
        tally(child, counts);
    }
}

fn collapse(
    tree: &Tree<String>,
    counts: &HashMap<String, usize>,
    min_occurrences: usize,
) -> Tree<String> {
    if tree.is_leaf() || tree.is_preterminal() {
        return tree.clone();
    }
    let label = tree.label();
    let rare = counts.get(label).copied().unwrap_or(0) < min_occurrences;
    let label = match label.find('_') {
        Some(first) if rare => match label[first + 1..].find('_') {
            Some(second) => format!("{}{}", &label[..first], &label[first + 1 + second..]),
            None => label[..first].to_string(),
        },
        _ => label.clone(),
    };
    Tree::new(
        label,
        tree.children()
            .iter()
            .map(|c| collapse(c, counts, min_occurrences))
            .collect(),
    )
}

///The coarse label a fine label refines: intermediate labels keep their `@X->` header and
///other labels lose their `^` ancestor marks.
pub fn coarse_label(fine: &str) -> &str {
    if let Some(arrow) = fine.find('>') {
        &fine[..=arrow]
    } else if let Some(caret) = fine.find('^') {
        &fine[..caret]
    } else {
        fine
    }
}

///Splices out intermediate nodes and strips annotations from the remaining labels.
pub fn unannotate(tree: &Tree<String>) -> Tree<String> {
    if tree.is_leaf() {
        return tree.clone();
    }
    let mut children = vec![];
    splice_children(tree, &mut children);
    Tree::new(base_label(tree.label()).to_string(), children)
}

fn splice_children(tree: &Tree<String>, children: &mut Vec<Tree<String>>) {
    for child in tree.children() {
        if !child.is_leaf() && child.label().starts_with(INTERMEDIATE_PREFIX) {
            splice_children(child, children);
        } else {
            children.push(unannotate(child));
        }
    }
}

///Cuts a label at the earliest `^`, `-` or `=` that is not its first character, so that
///`NP-SBJ=2` becomes `NP` while `-NONE-` is left alone.
fn base_label(label: &str) -> &str {
    ['^', '-', '=']
        .into_iter()
        .filter_map(|c| label.find(c))
        .filter(|&cut| cut > 0)
        .min()
        .map_or(label, |cut| &label[..cut])
}
