use serde::{Serialize, Deserialize};
use crate::engine::types::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub record: RecordId,
    pub section: u32,         // 1-based position of the source column
    pub positions: Vec<u32>,  // Token positions for phrase matching
}

/// Posting list for a term
/// Note: Sorted by (record, section) for efficient merging
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingList {
    pub postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    pub fn add_posting(&mut self, posting: Posting) {
        match self.find(posting.record, posting.section) {
            Ok(pos) => self.postings[pos] = posting,
            Err(pos) => self.postings.insert(pos, posting),
        }
    }

    pub fn remove(&mut self, record: RecordId, section: u32) -> bool {
        match self.find(record, section) {
            Ok(pos) => {
                self.postings.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, record: RecordId, section: u32) -> Option<&Posting> {
        self.find(record, section).ok().map(|pos| &self.postings[pos])
    }

    fn find(&self, record: RecordId, section: u32) -> std::result::Result<usize, usize> {
        self.postings.binary_search_by_key(&(record, section), |p| (p.record, p.section))
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Postings of `self` whose (record, section) also appears in `other`
    pub fn intersect<'a>(&'a self, other: &'a PostingList) -> Vec<(&'a Posting, &'a Posting)> {
        let mut result = Vec::new();
        let mut i = 0;
        let mut j = 0;

        while i < self.postings.len() && j < other.postings.len() {
            let left = (self.postings[i].record, self.postings[i].section);
            let right = (other.postings[j].record, other.postings[j].section);

            if left == right {
                result.push((&self.postings[i], &other.postings[j]));
                i += 1;
                j += 1;
            } else if left < right {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }
}
