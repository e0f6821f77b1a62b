//! Definition of the cache module.
//!
//! A `LocalscoreCache` memoizes per-node log-likelihoods keyed by
//! `(node, sorted parent set)`, so a search loop that revisits a
//! parent-set never rebuilds its CPD. One cache belongs to exactly one
//! evaluator; nothing here is safe for concurrent use.

use cpd::{CpdKind, LnFactorialCache};
use dataset::Dataset;

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Cache key: a node and its sorted parent list.
type Key = (usize, Vec<usize>);

struct Entry {
    score: f64,
    /// Outstanding occurrences of this key in the access queue.
    refs: usize
}


/// An optionally bounded memo of local scores with LRU eviction.
///
/// Recency is tracked with an access-order queue plus a per-key reference
/// count: every access pushes the key, and eviction pops from the front,
/// discarding an entry only when its last queued occurrence surfaces. The
/// queue is compacted when it grows well past the bound, instead of
/// scanning it on every access.
pub struct LocalscoreCache {
    entries: HashMap<Key, Entry>,
    queue: VecDeque<Key>,

    /// Maximum number of entries; a non-positive bound means unbounded.
    bound: isize,

    hits: usize,
    misses: usize
}

impl LocalscoreCache {

    /// Construct an unbounded cache.
    pub fn new() -> LocalscoreCache {
        LocalscoreCache::with_bound(0)
    }

    /// Construct a cache holding at most `bound` entries. A bound of zero
    /// or below means unbounded.
    pub fn with_bound(bound: isize) -> LocalscoreCache {
        LocalscoreCache {
            entries: HashMap::new(),
            queue: VecDeque::new(),
            bound,
            hits: 0,
            misses: 0
        }
    }

    /// Look up the local score for `node` given `parents`, computing and
    /// storing it on a miss.
    pub fn get_or_compute(
        &mut self,
        data: &Dataset,
        kind: CpdKind,
        lnfact: &Rc<LnFactorialCache>,
        node: usize,
        parents: &[usize],
    ) -> f64 {
        let mut sorted = parents.to_vec();
        sorted.sort();
        let key = (node, sorted);

        let score = match self.entries.get_mut(&key) {
            Some(entry) => {
                self.hits += 1;
                entry.refs += 1;
                entry.score
            },
            None => {
                self.misses += 1;
                let cpd = kind.build(data, node, &key.1, lnfact.clone());
                let score = cpd.loglikelihood();
                self.entries.insert(key.clone(), Entry { score, refs: 1 });
                score
            }
        };

        if self.bound > 0 {
            self.queue.push_back(key);
            self.evict();
        }

        score
    }

    /// Number of lookups answered from the memo.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of lookups that required building a CPD.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop least-recently-used entries until the bound is met. The entry
    /// just accessed always has a fresher occurrence queued behind the
    /// front, so it can never be the one discarded.
    fn evict(&mut self) {
        while self.entries.len() > self.bound as usize {
            let key = match self.queue.pop_front() {
                Some(key) => key,
                None => return
            };

            let gone = {
                let entry = self.entries.get_mut(&key).expect("queued key must be cached");
                entry.refs -= 1;
                entry.refs == 0
            };
            if gone {
                self.entries.remove(&key);
            }
        }

        // TODO: pick the compaction threshold from profiling a long search
        // run; 8x is a placeholder.
        if self.queue.len() > 8 * self.bound as usize {
            self.compact();
        }
    }

    /// Rebuild the queue keeping only each key's most recent occurrence.
    fn compact(&mut self) {
        let mut seen: Vec<Key> = Vec::with_capacity(self.entries.len());
        while let Some(key) = self.queue.pop_back() {
            if self.entries.contains_key(&key) && !seen.contains(&key) {
                seen.push(key);
            }
        }
        for key in seen.into_iter().rev() {
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.refs = 1;
            }
            self.queue.push_back(key);
        }
    }
}
