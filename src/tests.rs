use anyhow::Result;
use approx::assert_relative_eq;
use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::annotation::coarse_label;
use crate::grammars::{TOY_TREEBANK, toy_parser};

use super::*;

const TOY_SENTENCES: [&str; 4] = [
    "the dog barks",
    "the big dog barks",
    "the dog chased a cat",
    "it saw the man with a telescope",
];

fn split(sentence: &str) -> Vec<&str> {
    sentence.split(' ').collect()
}

fn single_model_parser<L: Lexicon + Clone>(
    grammar: Grammar,
    lexicon: L,
    config: ParserConfig,
) -> Result<CoarseToFineParser<L>> {
    let coarse = ParserModel::new(grammar.clone(), lexicon.clone())?;
    let fine = ParserModel::new(grammar, lexicon)?;
    Ok(CoarseToFineParser::new(coarse, fine, config)?)
}

fn vice_president(config: ParserConfig) -> Result<CoarseToFineParser<TableLexicon>> {
    let grammar = Grammar::builder("ROOT")
        .binary("ROOT", "NP", "VP", 0.0)
        .build()?;
    let lexicon = TableLexicon::new([("Vice", "NP", 0.0), ("President", "VP", 0.0)])?;
    single_model_parser(grammar, lexicon, config)
}

#[test]
fn vice_president_parses() -> Result<()> {
    for config in [
        ParserConfig::default(),
        ParserConfig::default().without_pruning(),
        ParserConfig::default().with_layout(ChartLayout::Rectangular),
    ] {
        let parser = vice_president(config)?;
        let parse = parser
            .try_best_parse(&["Vice", "President"])?
            .expect("the sentence has a parse");
        assert_eq!(parse.tree.to_string(), "(ROOT (NP Vice) (VP President))");
        assert_eq!(parse.score, 0.0);
        assert!(!parse.used_fallback);
        assert_eq!(
            parser.best_parse(&["Vice", "President"]).to_string(),
            "(ROOT (NP Vice) (VP President))"
        );
    }
    Ok(())
}

#[test]
fn single_word_through_a_unary_rule() -> Result<()> {
    let grammar = Grammar::builder("ROOT").unary("ROOT", "NN", 0.0).build()?;
    let lexicon = TableLexicon::new([("Odds", "NN", 0.0)])?;
    let parser = single_model_parser(grammar, lexicon, ParserConfig::default())?;
    assert_eq!(parser.best_parse(&["Odds"]).to_string(), "(ROOT (NN Odds))");
    Ok(())
}

#[test]
fn failure_tree() -> Result<()> {
    let parser = vice_president(ParserConfig::default())?;
    assert_eq!(parser.try_best_parse(&["Vice", "Chancellor"])?, None);
    assert_eq!(
        parser.best_parse(&["Vice", "Chancellor"]).to_string(),
        "(ROOT JUNK)"
    );
    assert_eq!(
        parser.best_parse(&["President", "Vice"]).to_string(),
        "(ROOT JUNK)"
    );
    let empty: [&str; 0] = [];
    assert_eq!(parser.best_parse(&empty), parser.failure_tree());
    Ok(())
}

#[test]
fn failure_tree_after_fallback() -> Result<()> {
    let coarse_grammar = Grammar::builder("ROOT")
        .binary("ROOT", "NP", "VP", 0.0)
        .build()?;
    let coarse_lexicon = TableLexicon::new([("Vice", "NP", 0.0), ("President", "VP", 0.0)])?;
    let coarse_only = single_model_parser(
        coarse_grammar.clone(),
        coarse_lexicon.clone(),
        ParserConfig::default(),
    )?;
    assert!(coarse_only.try_best_parse(&["Vice", "President"])?.is_some());

    let fine = ParserModel::new(
        Grammar::builder("ROOT")
            .binary("ROOT", "NP^ROOT", "VP^ROOT", 0.0)
            .build()?,
        TableLexicon::new([("Vice", "NP^ROOT", 0.0)])?,
    )?;
    let coarse = ParserModel::new(coarse_grammar, coarse_lexicon)?;
    let parser = CoarseToFineParser::new(coarse, fine, ParserConfig::default())?;
    assert_eq!(parser.try_best_parse(&["Vice", "President"])?, None);
    assert_eq!(
        parser.best_parse(&["Vice", "President"]).to_string(),
        "(ROOT JUNK)"
    );
    Ok(())
}

#[test]
fn toy_sentences() -> Result<()> {
    let parser = toy_parser(ParserConfig::default())?;
    let exhaustive = toy_parser(ParserConfig::default().without_pruning())?;

    let parse = parser
        .try_best_parse(&split("the dog barks"))?
        .expect("the sentence has a parse");
    assert_eq!(
        parse.tree.to_string(),
        "(ROOT (S (NP (DT the) (NN dog)) (VP (VBZ barks))))"
    );
    assert_relative_eq!(parse.score, -4.9, epsilon = 1e-9);

    let telescope = exhaustive.best_parse(&split("it saw the man with a telescope"));
    assert_eq!(
        telescope.to_string(),
        TOY_TREEBANK.lines().nth(4).unwrap_or_default()
    );

    for sentence in TOY_SENTENCES {
        let words = split(sentence);
        let pruned = parser.try_best_parse(&words)?.expect("toy sentences parse");
        let best = exhaustive
            .try_best_parse(&words)?
            .expect("toy sentences parse");
        assert_eq!(pruned.tree, best.tree);
        assert_relative_eq!(pruned.score, best.score);
        assert!(!pruned.used_fallback);
        assert_eq!(pruned.tree.leaves(), words);
        let rescored = parser
            .fine()
            .score_derivation(&pruned.derivation)
            .expect("derivations only use grammar rules");
        assert_relative_eq!(rescored, pruned.score, epsilon = 1e-9);
    }
    Ok(())
}

fn misled_parser(threshold: f64) -> Result<CoarseToFineParser<TableLexicon>> {
    let coarse = ParserModel::new(
        Grammar::builder("ROOT")
            .binary("ROOT", "P", "Q", 0.0)
            .binary("ROOT", "R", "S", -5.0)
            .build()?,
        TableLexicon::new([
            ("w1", "P", 0.0),
            ("w1", "R", 0.0),
            ("w2", "Q", 0.0),
            ("w2", "S", 0.0),
        ])?,
    )?;
    let fine = ParserModel::new(
        Grammar::builder("ROOT")
            .binary("ROOT", "R'", "S'", -5.0)
            .build()?,
        TableLexicon::new([("w1", "R'", 0.0), ("w2", "S'", 0.0)])?,
    )?;
    Ok(CoarseToFineParser::with_label_map(
        coarse,
        fine,
        |l| l.trim_end_matches('\''),
        ParserConfig::default().with_threshold(threshold),
    )?)
}

#[test]
fn fallback_without_pruning() -> Result<()> {
    let parse = misled_parser(DEFAULT_PRUNE_THRESHOLD)?
        .try_best_parse(&["w1", "w2"])?
        .expect("the fine grammar has a parse");
    assert!(parse.used_fallback);
    assert_eq!(parse.tree.to_string(), "(ROOT (R' w1) (S' w2))");
    assert_eq!(parse.score, -5.0);

    let parse = misled_parser(-10.0)?
        .try_best_parse(&["w1", "w2"])?
        .expect("the fine grammar has a parse");
    assert!(!parse.used_fallback);
    assert_eq!(parse.tree.to_string(), "(ROOT (R' w1) (S' w2))");
    Ok(())
}

#[test]
fn coarse_grammar_without_parse() -> Result<()> {
    let coarse = ParserModel::new(
        Grammar::builder("ROOT")
            .binary("ROOT", "NP", "VP", 0.0)
            .build()?,
        TableLexicon::new([("Vice", "NP", 0.0)])?,
    )?;
    let fine = ParserModel::new(
        Grammar::builder("ROOT")
            .binary("ROOT", "NP^ROOT", "VP^ROOT", -1.0)
            .build()?,
        TableLexicon::new([("Vice", "NP^ROOT", 0.0), ("President", "VP^ROOT", -1.0)])?,
    )?;
    let parser = CoarseToFineParser::new(coarse, fine, ParserConfig::default())?;
    let parse = parser
        .try_best_parse(&["Vice", "President"])?
        .expect("the fine grammar has a parse");
    assert!(!parse.used_fallback);
    assert_eq!(parse.tree.to_string(), "(ROOT (NP Vice) (VP President))");
    assert_eq!(
        parse.derivation.to_string(),
        "(ROOT (NP^ROOT Vice) (VP^ROOT President))"
    );
    assert_relative_eq!(parse.score, -2.0);
    Ok(())
}

#[test]
fn construction_errors() -> Result<()> {
    let coarse = || -> Result<ParserModel<TableLexicon>> {
        Ok(ParserModel::new(
            Grammar::builder("ROOT")
                .binary("ROOT", "NP", "TOP", 0.0)
                .build()?,
            TableLexicon::default(),
        )?)
    };

    let fine = ParserModel::new(
        Grammar::builder("ROOT")
            .unary("ROOT", "VP^ROOT", 0.0)
            .build()?,
        TableLexicon::default(),
    )?;
    assert_eq!(
        CoarseToFineParser::new(coarse()?, fine, ParserConfig::default())
            .unwrap_err(),
        GrammarError::UnmappedLabel("VP^ROOT".to_string())
    );

    let fine = ParserModel::new(
        Grammar::builder("TOP").unary("TOP", "NP", 0.0).build()?,
        TableLexicon::default(),
    )?;
    assert_eq!(
        CoarseToFineParser::new(coarse()?, fine, ParserConfig::default())
            .unwrap_err(),
        GrammarError::RootMismatch {
            fine: "TOP".to_string(),
            coarse: "ROOT".to_string()
        }
    );
    Ok(())
}

const RANDOM_LABELS: [&str; 3] = ["A", "B", "C"];
const RANDOM_WORDS: [&str; 4] = ["w0", "w1", "w2", "w3"];

///A fine grammar with two refinements of every coarse label, and its projection.
fn random_parser(seed: u64, config: ParserConfig) -> Result<CoarseToFineParser<TableLexicon>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let fine_labels = RANDOM_LABELS
        .iter()
        .flat_map(|l| (0..2).map(move |k| format!("{l}^{k}")))
        .collect_vec();

    let mut builder = Grammar::builder("ROOT");
    for label in fine_labels.iter() {
        builder = builder.label(label);
    }
    let parents = std::iter::once("ROOT".to_string())
        .chain(fine_labels.iter().cloned())
        .collect_vec();
    for parent in parents.iter() {
        for (left, right) in fine_labels.iter().cartesian_product(fine_labels.iter()) {
            if rng.random_bool(0.25) {
                builder = builder.binary(parent, left, right, rng.random_range(-3.0..-0.05));
            }
        }
        for child in fine_labels.iter() {
            if child != parent && rng.random_bool(0.15) {
                builder = builder.unary(parent, child, rng.random_range(-3.0..-0.05));
            }
        }
    }
    let grammar = builder.build()?;

    let mut entries = vec![];
    for word in RANDOM_WORDS {
        for tag in fine_labels.iter() {
            if rng.random_bool(0.5) {
                entries.push((word, tag.as_str(), rng.random_range(-4.0..-0.05)));
            }
        }
    }
    let lexicon = TableLexicon::new(entries)?;

    let coarse = ParserModel::new(
        grammar.project(coarse_label)?,
        lexicon.project(coarse_label),
    )?;
    let fine = ParserModel::new(grammar, lexicon)?;
    Ok(CoarseToFineParser::new(coarse, fine, config)?)
}

fn random_sentence(seed: u64) -> Vec<&'static str> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let length = rng.random_range(1..=6);
    (0..length)
        .map(|_| RANDOM_WORDS[rng.random_range(0..RANDOM_WORDS.len())])
        .collect()
}

#[test]
fn pruning_never_beats_exhaustive_search() -> Result<()> {
    let mut parsed = 0;
    for seed in 0..40 {
        let pruned = random_parser(seed, ParserConfig::default())?;
        let exhaustive = random_parser(seed, ParserConfig::default().without_pruning())?;
        for k in 0..5 {
            let sentence = random_sentence(1000 * seed + k);
            match (
                exhaustive.try_best_parse(&sentence)?,
                pruned.try_best_parse(&sentence)?,
            ) {
                (None, None) => {}
                (Some(best), Some(approximate)) => {
                    parsed += 1;
                    assert!(approximate.score <= best.score + 1e-9);
                    for parse in [best, approximate] {
                        assert_eq!(parse.tree.leaves(), sentence);
                        let rescored = exhaustive
                            .fine()
                            .score_derivation(&parse.derivation)
                            .expect("derivations only use grammar rules");
                        assert_relative_eq!(rescored, parse.score, epsilon = 1e-9);
                    }
                }
                (best, approximate) => panic!("{best:?} but {approximate:?}"),
            }
        }
    }
    assert!(parsed > 0);
    Ok(())
}

fn with_reflexive_closures(
    parser: &CoarseToFineParser<TableLexicon>,
) -> Result<CoarseToFineParser<TableLexicon>> {
    let reflexive = |model: &ParserModel<TableLexicon>| -> Result<_, GrammarError> {
        Ok(ParserModel::with_closure(
            model.grammar().clone(),
            model.closure().clone().with_reflexive_rules()?,
            model.lexicon().clone(),
        ))
    };
    Ok(CoarseToFineParser::new(
        reflexive(parser.coarse())?,
        reflexive(parser.fine())?,
        *parser.config(),
    )?)
}

#[test]
fn reflexive_closures_change_nothing() -> Result<()> {
    let toy = toy_parser(ParserConfig::default())?;
    let reflexive = with_reflexive_closures(&toy)?;
    for sentence in TOY_SENTENCES {
        let words = split(sentence);
        assert_eq!(
            toy.try_best_parse(&words)?,
            reflexive.try_best_parse(&words)?
        );
    }

    for seed in 0..10 {
        let parser = random_parser(seed, ParserConfig::default())?;
        let reflexive = with_reflexive_closures(&parser)?;
        for k in 0..5 {
            let sentence = random_sentence(1000 * seed + k);
            assert_eq!(
                parser.try_best_parse(&sentence)?,
                reflexive.try_best_parse(&sentence)?
            );
        }
    }
    Ok(())
}

#[test]
fn layouts_agree() -> Result<()> {
    let triangular = toy_parser(ParserConfig::default())?;
    let rectangular =
        toy_parser(ParserConfig::default().with_layout(ChartLayout::Rectangular))?;
    for sentence in TOY_SENTENCES {
        let words = split(sentence);
        assert_eq!(
            triangular.try_best_parse(&words)?,
            rectangular.try_best_parse(&words)?
        );
    }

    for seed in 0..10 {
        let triangular = random_parser(seed, ParserConfig::default())?;
        let rectangular = random_parser(
            seed,
            ParserConfig::default().with_layout(ChartLayout::Rectangular),
        )?;
        let sentence = random_sentence(seed);
        assert_eq!(
            triangular.try_best_parse(&sentence)?,
            rectangular.try_best_parse(&sentence)?
        );
    }
    Ok(())
}

#[test]
fn shared_between_threads() -> Result<()> {
    let parser = toy_parser(ParserConfig::default())?;
    let expected = TOY_SENTENCES
        .iter()
        .map(|s| parser.best_parse(&split(s)))
        .collect_vec();
    let parser = &parser;
    std::thread::scope(|scope| {
        let handles = (0..4)
            .map(|_| {
                scope.spawn(move || {
                    TOY_SENTENCES
                        .iter()
                        .map(|s| parser.best_parse(&split(s)))
                        .collect_vec()
                })
            })
            .collect_vec();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
    Ok(())
}

struct NanLexicon;

impl Lexicon for NanLexicon {
    fn score_tagging(&self, word: &str, tag: &str) -> f64 {
        match (word, tag) {
            ("Vice", "NP") | ("President", "VP") => -0.5,
            _ => f64::NAN,
        }
    }
}

#[test]
fn nan_tagging_scores_are_impossible() -> Result<()> {
    let grammar = Grammar::builder("ROOT")
        .binary("ROOT", "NP", "VP", 0.0)
        .binary("ROOT", "VP", "NP", 0.0)
        .build()?;
    let parser = CoarseToFineParser::new(
        ParserModel::new(grammar.clone(), NanLexicon)?,
        ParserModel::new(grammar, NanLexicon)?,
        ParserConfig::default(),
    )?;
    let parse = parser
        .try_best_parse(&["Vice", "President"])?
        .expect("the sentence has a parse");
    assert_eq!(parse.tree.to_string(), "(ROOT (NP Vice) (VP President))");
    assert_eq!(parse.score, -1.0);
    assert_eq!(parser.try_best_parse(&["Vice", "Vice"])?, None);
    Ok(())
}

#[test]
fn borrowed_lexicons() -> Result<()> {
    let grammar = Grammar::builder("ROOT")
        .binary("ROOT", "NP", "VP", 0.0)
        .build()?;
    let lexicon = TableLexicon::new([("Vice", "NP", 0.0), ("President", "VP", 0.0)])?;
    let parser = single_model_parser(grammar, &lexicon, ParserConfig::default())?;
    assert_eq!(
        parser.best_parse(&["Vice", "President"]).to_string(),
        "(ROOT (NP Vice) (VP President))"
    );
    Ok(())
}

struct GenerousLexicon;

impl Lexicon for GenerousLexicon {
    fn score_tagging(&self, _word: &str, _tag: &str) -> f64 {
        0.5
    }
}

#[test]
fn positive_tagging_scores_are_errors() -> Result<()> {
    let grammar = Grammar::builder("ROOT")
        .binary("ROOT", "NP", "VP", 0.0)
        .build()?;
    let parser = CoarseToFineParser::new(
        ParserModel::new(grammar.clone(), GenerousLexicon)?,
        ParserModel::new(grammar, GenerousLexicon)?,
        ParserConfig::default(),
    )?;
    let error = parser
        .try_best_parse(&["Vice", "President"])
        .unwrap_err();
    assert_eq!(
        error,
        ParseError::PositiveTaggingScore {
            word: "Vice".to_string(),
            label: "ROOT".to_string(),
            position: 0,
            score: 0.5
        }
    );
    assert!(error.is_invariant_violation());
    Ok(())
}

#[test]
fn work_limits() -> Result<()> {
    let words = split("the dog barks");

    let parser = toy_parser(ParserConfig::default().with_max_edges(1))?;
    let error = parser.try_best_parse(&words).unwrap_err();
    assert_eq!(error, ParseError::BudgetExhausted(1));
    assert!(!error.is_invariant_violation());
    assert_eq!(parser.best_parse(&words), parser.failure_tree());

    let parser = toy_parser(ParserConfig::default().with_max_edges(1_000_000))?;
    assert!(parser.try_best_parse(&words)?.is_some());

    let parser = toy_parser(ParserConfig::default().with_max_length(2))?;
    assert_eq!(
        parser.try_best_parse(&words).unwrap_err(),
        ParseError::SentenceTooLong { length: 3, max: 2 }
    );
    assert_eq!(parser.best_parse(&words).to_string(), "(ROOT JUNK)");
    Ok(())
}

#[test]
fn json_export() -> Result<()> {
    let parser = vice_president(ParserConfig::default())?;
    let parse = parser
        .try_best_parse(&["Vice", "President"])?
        .expect("the sentence has a parse");
    let json = serde_json::to_value(&parse)?;
    assert_eq!(json["tree"]["label"], "ROOT");
    assert_eq!(json["derivation"]["children"][0]["label"], "NP");
    assert_eq!(json["score"], 0.0);
    assert_eq!(json["used_fallback"], false);
    Ok(())
}
