//! Scoring of words under preterminal labels.
use ahash::HashMap;

use crate::grammar::{GrammarError, log_prob};

///Anything able to score a word under a preterminal label.
pub trait Lexicon {
    ///Log-probability of `tag` emitting `word`. Impossible taggings may be reported as either
    ///`-inf` or `NaN`; the parser treats both alike.
    fn score_tagging(&self, word: &str, tag: &str) -> f64;
}

impl<L: Lexicon + ?Sized> Lexicon for &L {
    fn score_tagging(&self, word: &str, tag: &str) -> f64 {
        (**self).score_tagging(word, tag)
    }
}

///A lexicon backed by a table of scored `(word, tag)` entries.
#[derive(Debug, Clone, Default)]
pub struct TableLexicon {
    entries: HashMap<String, HashMap<String, f64>>,
    unknown: HashMap<String, f64>,
}

impl TableLexicon {
    ///Builds a lexicon from `(word, tag, log-probability)` entries. Repeated entries keep
    ///their best score.
    pub fn new<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str, f64)>,
    ) -> Result<Self, GrammarError> {
        let mut lexicon = TableLexicon::default();
        for (word, tag, score) in entries {
            checked(word, tag, score)?;
            let tags = lexicon.entries.entry(word.to_string()).or_default();
            let entry = tags.entry(tag.to_string()).or_insert(score);
            *entry = entry.max(score);
        }
        Ok(lexicon)
    }

    ///Scores used for words absent from the table, per tag.
    pub fn with_unknown_words<'a>(
        mut self,
        scores: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, GrammarError> {
        for (tag, score) in scores {
            checked("<unknown>", tag, score)?;
            self.unknown.insert(tag.to_string(), score);
        }
        Ok(self)
    }

    pub fn knows(&self, word: &str) -> bool {
        self.entries.contains_key(word)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.entries.iter().flat_map(|(word, tags)| {
            tags.iter()
                .map(move |(tag, score)| (word.as_str(), tag.as_str(), *score))
        })
    }

    ///Renames every tag through `project`, keeping the best score among entries that
    ///collapse together.
    pub fn project(&self, project: impl Fn(&str) -> &str) -> TableLexicon {
        let mut lexicon = TableLexicon::default();
        for (word, tags) in self.entries.iter() {
            let projected = lexicon.entries.entry(word.clone()).or_default();
            for (tag, score) in tags.iter() {
                let entry = projected
                    .entry(project(tag.as_str()).to_string())
                    .or_insert(*score);
                *entry = entry.max(*score);
            }
        }
        for (tag, score) in self.unknown.iter() {
            let entry = lexicon
                .unknown
                .entry(project(tag.as_str()).to_string())
                .or_insert(*score);
            *entry = entry.max(*score);
        }
        lexicon
    }
}

fn checked(word: &str, tag: &str, score: f64) -> Result<(), GrammarError> {
    match log_prob(score) {
        Some(_) => Ok(()),
        None => Err(GrammarError::InvalidTaggingScore {
            word: word.to_string(),
            tag: tag.to_string(),
            score,
        }),
    }
}

impl Lexicon for TableLexicon {
    fn score_tagging(&self, word: &str, tag: &str) -> f64 {
        let scores = match self.entries.get(word) {
            Some(tags) => tags,
            None => &self.unknown,
        };
        scores.get(tag).copied().unwrap_or(f64::NEG_INFINITY)
    }
}
