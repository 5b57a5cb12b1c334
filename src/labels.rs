//! Interning of grammar symbols as small integers.
use ahash::HashMap;

///Identifier of a grammar symbol inside one [`LabelIndexer`].
pub type LabelId = usize;

///The root symbol is always interned first, so it always has this id.
pub const ROOT_ID: LabelId = 0;

///A bidirectional map between label strings and dense [`LabelId`]s.
#[derive(Debug, Clone, Default)]
pub struct LabelIndexer {
    labels: Vec<String>,
    ids: HashMap<String, LabelId>,
}

impl LabelIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    ///Returns the id of `label`, adding it if it has not been seen before.
    pub fn intern(&mut self, label: &str) -> LabelId {
        if let Some(id) = self.ids.get(label) {
            return *id;
        }
        let id = self.labels.len();
        self.labels.push(label.to_string());
        self.ids.insert(label.to_string(), id);
        id
    }

    pub fn get(&self, id: LabelId) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn index_of(&self, label: &str) -> Option<LabelId> {
        self.ids.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &str)> {
        self.labels.iter().map(String::as_str).enumerate()
    }

    ///Label of an id handed out by this indexer.
    pub(crate) fn label(&self, id: LabelId) -> &str {
        &self.labels[id]
    }
}
