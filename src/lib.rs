//! A coarse-to-fine chart parser for binarized probabilistic context-free grammars.
//!
//! ```
//! use coarse_to_fine_parser::{
//!     CoarseToFineParser, Grammar, ParserConfig, ParserModel, TableLexicon,
//! };
//!
//! let grammar = Grammar::builder("ROOT").binary("ROOT", "NP", "VP", 0.0).build()?;
//! let lexicon = TableLexicon::new([("Vice", "NP", 0.0), ("President", "VP", 0.0)])?;
//! let coarse = ParserModel::new(grammar.clone(), lexicon.clone())?;
//! let fine = ParserModel::new(grammar, lexicon)?;
//! let parser = CoarseToFineParser::new(coarse, fine, ParserConfig::default())?;
//! let tree = parser.best_parse(&["Vice", "President"]);
//! assert_eq!(tree.to_string(), "(ROOT (NP Vice) (VP President))");
//! # Ok::<(), coarse_to_fine_parser::GrammarError>(())
//! ```

///Pruning threshold used unless configured otherwise: fine constituents whose coarse
///counterpart has a log-posterior below this are not built.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = -2.0;

///Whether, and how aggressively, the coarse pass prunes the fine chart.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Pruning {
    ///Skip fine cells whose coarse log-posterior is below the threshold.
    Threshold(f64),
    ///Run the fine grammar over the whole chart. The coarse grammar is not used.
    Disabled,
}

impl Default for Pruning {
    fn default() -> Self {
        Pruning::Threshold(DEFAULT_PRUNE_THRESHOLD)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ParserConfig {
    pub pruning: Pruning,
    pub layout: ChartLayout,
    ///Longer sentences are refused with [`ParseError::SentenceTooLong`].
    pub max_length: Option<usize>,
    ///Upper bound on the rule applications examined for one sentence, across every pass.
    pub max_edges: Option<u64>,
}

impl ParserConfig {
    pub fn with_pruning(mut self, pruning: Pruning) -> Self {
        self.pruning = pruning;
        self
    }

    pub fn with_threshold(self, threshold: f64) -> Self {
        self.with_pruning(Pruning::Threshold(threshold))
    }

    pub fn without_pruning(self) -> Self {
        self.with_pruning(Pruning::Disabled)
    }

    pub fn with_layout(mut self, layout: ChartLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_max_edges(mut self, max_edges: u64) -> Self {
        self.max_edges = Some(max_edges);
        self
    }
}

pub mod annotation;
pub mod grammar;
pub mod grammars;
pub mod labels;
pub mod lexicon;
mod parsing;
pub mod trees;

pub use grammar::{Grammar, GrammarBuilder, GrammarError, UnaryClosure};
pub use labels::{LabelId, LabelIndexer};
pub use lexicon::{Lexicon, TableLexicon};
pub use parsing::{ChartLayout, CoarseToFineParser, ParseError, ParserModel, ScoredParse};
pub use trees::Tree;

#[cfg(test)]
mod tests;
