//! This module defines a small example treebank and grammar that can be useful in testing or
//! otherwise.
use crate::ParserConfig;
use crate::annotation::coarse_label;
use crate::grammar::{Grammar, GrammarError};
use crate::lexicon::TableLexicon;
use crate::parsing::{CoarseToFineParser, ParserModel};

///A few hand-written trees in Penn treebank format, one per line.
pub const TOY_TREEBANK: &str = "(ROOT (S (NP (DT the) (NN dog)) (VP (VBZ barks)) (. .)))
(ROOT (S (NP (DT the) (JJ big) (NN dog)) (VP (VBD chased) (NP (DT a) (NN cat)))))
(ROOT (S (NP (NNP Vice) (NNP President)) (VP (VBD resigned) (ADVP (RB yesterday)))))
(ROOT (NP (NN Odds)))
(ROOT (S (NP (PRP it)) (VP (VBD saw) (NP (DT the) (NN man)) (PP (IN with) (NP (DT a) (NN telescope))))))
(ROOT (S (ADVP (RB now)) (NP (PRP we)) (VP (VBP go))))";

///Binary rules of [`toy_grammar`], over labels produced by
///[`annotate_fine`](crate::annotation::annotate_fine).
pub const TOY_BINARY_RULES: &[(&str, &str, &str, f64)] = &[
    ("S^ROOT", "NP^S^ROOT", "@S->_NP", -0.4),
    ("S^ROOT", "NP^S^ROOT-U", "@S->_NP", -1.1),
    ("NP^S^ROOT", "DT^NP^S", "@NP->_DT", 0.0),
    ("@NP->_DT", "JJ^NP^S", "@NP->_DT_JJ", -1.4),
    ("VP^S^ROOT", "VBD^VP^S", "@VP->_VBD", 0.0),
    ("@VP->_VBD", "NP^VP^S", "@VP->_VBD_NP", -0.9),
    ("NP^VP^S", "DT^NP^VP", "@NP->_DT", -0.2),
    ("NP^VP^S", "NP^NP^VP", "@NP->_NP", -1.7),
    ("NP^NP^VP", "DT^NP^NP", "@NP->_DT", 0.0),
    ("PP^VP^S", "IN^PP^VP", "@PP->_IN", 0.0),
    ("PP^NP^VP", "IN^PP^NP", "@PP->_IN", 0.0),
    ("NP^PP^VP", "DT^NP^PP", "@NP->_DT", 0.0),
    ("NP^PP^NP", "DT^NP^PP", "@NP->_DT", 0.0),
];

///Unary rules of [`toy_grammar`].
pub const TOY_UNARY_RULES: &[(&str, &str, f64)] = &[
    ("ROOT", "S^ROOT", 0.0),
    ("NP^S^ROOT-U", "PRP^NP^S", 0.0),
    ("@NP->_DT", "NN^NP^S", -0.3),
    ("@NP->_DT", "NN^NP^VP", -0.3),
    ("@NP->_DT", "NN^NP^PP", -1.5),
    ("@NP->_DT", "NN^NP^NP", -1.5),
    ("@NP->_DT_JJ", "NN^NP^S", 0.0),
    ("@S->_NP", "VP^S^ROOT-U", -0.7),
    ("@S->_NP", "VP^S^ROOT", -0.7),
    ("VP^S^ROOT-U", "VBZ^VP^S", 0.0),
    ("@VP->_VBD", "NP^VP^S", -0.5),
    ("@VP->_VBD_NP", "PP^VP^S", 0.0),
    ("@NP->_NP", "PP^NP^VP", 0.0),
    ("@PP->_IN", "NP^PP^VP", -0.7),
    ("@PP->_IN", "NP^PP^NP", -0.7),
];

///Tagging scores of [`toy_lexicon`].
pub const TOY_LEXICON: &[(&str, &str, f64)] = &[
    ("the", "DT^NP^S", -0.5),
    ("the", "DT^NP^VP", -0.6),
    ("the", "DT^NP^PP", -0.7),
    ("the", "DT^NP^NP", -0.8),
    ("a", "DT^NP^S", -1.2),
    ("a", "DT^NP^VP", -0.9),
    ("a", "DT^NP^PP", -0.7),
    ("a", "DT^NP^NP", -1.0),
    ("big", "JJ^NP^S", -2.5),
    ("dog", "NN^NP^S", -2.0),
    ("dog", "NN^NP^VP", -2.6),
    ("cat", "NN^NP^S", -2.7),
    ("cat", "NN^NP^VP", -2.2),
    ("man", "NN^NP^S", -2.4),
    ("man", "NN^NP^VP", -2.1),
    ("man", "NN^NP^NP", -2.3),
    ("telescope", "NN^NP^PP", -3.0),
    ("telescope", "NN^NP^VP", -3.4),
    ("barks", "VBZ^VP^S", -1.0),
    ("chased", "VBD^VP^S", -1.8),
    ("saw", "VBD^VP^S", -1.5),
    ("it", "PRP^NP^S", -1.0),
    ("with", "IN^PP^VP", -0.4),
    ("with", "IN^PP^NP", -0.6),
];

///The fine grammar made of [`TOY_BINARY_RULES`] and [`TOY_UNARY_RULES`].
pub fn toy_grammar() -> Result<Grammar, GrammarError> {
    let mut builder = Grammar::builder("ROOT");
    for &(parent, left, right, score) in TOY_BINARY_RULES {
        builder = builder.binary(parent, left, right, score);
    }
    for &(parent, child, score) in TOY_UNARY_RULES {
        builder = builder.unary(parent, child, score);
    }
    for &(_, tag, _) in TOY_LEXICON {
        builder = builder.label(tag);
    }
    builder.build()
}

pub fn toy_lexicon() -> Result<TableLexicon, GrammarError> {
    TableLexicon::new(TOY_LEXICON.iter().copied())
}

///A parser whose fine model is the toy grammar and whose coarse model is its projection
///through [`coarse_label`].
pub fn toy_parser(config: ParserConfig) -> Result<CoarseToFineParser<TableLexicon>, GrammarError> {
    let grammar = toy_grammar()?;
    let lexicon = toy_lexicon()?;
    let coarse = ParserModel::new(
        grammar.project(coarse_label)?,
        lexicon.project(coarse_label),
    )?;
    let fine = ParserModel::new(grammar, lexicon)?;
    CoarseToFineParser::new(coarse, fine, config)
}
