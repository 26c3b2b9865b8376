use std::collections::{BTreeMap, HashMap};
use serde::{Serialize, Deserialize};
use unicode_segmentation::UnicodeSegmentation;
use crate::analysis::token::Token;
use crate::engine::types::RecordId;
use crate::index::posting::{Posting, PostingList};

/// Term representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term(String);

impl Term {
    pub fn new(text: &str) -> Self {
        Term(text.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Positional inverted index over bigram tokens. One index serves every
/// source column of a lexicon; the section number tells the columns apart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub postings: HashMap<Term, PostingList>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex {
            postings: HashMap::new(),
        }
    }

    pub fn add_document(&mut self, record: RecordId, section: u32, tokens: &[Token]) {
        for (term, positions) in group_positions(tokens) {
            self.postings.entry(term)
                .or_insert_with(PostingList::new)
                .add_posting(Posting { record, section, positions });
        }
    }

    pub fn remove_document(&mut self, record: RecordId, section: u32, tokens: &[Token]) {
        for term in group_positions(tokens).into_keys() {
            let emptied = match self.postings.get_mut(&term) {
                Some(list) => {
                    list.remove(record, section);
                    list.is_empty()
                }
                None => false,
            };
            if emptied {
                self.postings.remove(&term);
            }
        }
    }

    pub fn search_term(&self, term: &Term) -> Option<&PostingList> {
        self.postings.get(term)
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Counts phrase occurrences of an already tokenized key per record,
    /// restricted to `sections` when given.
    pub fn search_phrase(&self, key: &[Token], sections: Option<&[u32]>) -> BTreeMap<RecordId, u32> {
        let mut hits = BTreeMap::new();
        let in_sections = |section: u32| sections.map_or(true, |s| s.contains(&section));

        match key {
            [] => {}
            [single] => {
                // One grapheme: every token starting with it is an occurrence.
                for (term, list) in &self.postings {
                    if term.0.graphemes(true).next() != Some(single.text.as_str()) {
                        continue;
                    }
                    for posting in list.postings.iter().filter(|p| in_sections(p.section)) {
                        *hits.entry(posting.record).or_insert(0) += posting.positions.len() as u32;
                    }
                }
            }
            _ => {
                // The trailing unigram is covered by the last bigram.
                let grams = &key[..key.len() - 1];
                let lists: Option<Vec<&PostingList>> = grams.iter()
                    .map(|t| self.postings.get(&Term::new(&t.text)))
                    .collect();
                let Some(lists) = lists else {
                    return hits;
                };

                for first in lists[0].postings.iter().filter(|p| in_sections(p.section)) {
                    let rest: Option<Vec<&Posting>> = lists[1..].iter()
                        .map(|list| list.get(first.record, first.section))
                        .collect();
                    let Some(rest) = rest else {
                        continue;
                    };

                    let count = first.positions.iter()
                        .filter(|&&start| {
                            rest.iter().enumerate().all(|(k, posting)| {
                                posting.positions.binary_search(&(start + k as u32 + 1)).is_ok()
                            })
                        })
                        .count() as u32;

                    if count > 0 {
                        *hits.entry(first.record).or_insert(0) += count;
                    }
                }
            }
        }

        hits
    }
}

fn group_positions(tokens: &[Token]) -> HashMap<Term, Vec<u32>> {
    let mut term_positions: HashMap<Term, Vec<u32>> = HashMap::new();
    for token in tokens {
        term_positions.entry(Term::new(&token.text))
            .or_insert_with(Vec::new)
            .push(token.position);
    }
    for positions in term_positions.values_mut() {
        positions.sort_unstable();
    }
    term_positions
}
