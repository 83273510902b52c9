//! Crawl frontier and visited set
//!
//! This module handles:
//! - Breadth-first ordering of URLs to crawl (depth, then discovery order)
//! - Depth-bound enforcement at push and at pop
//! - The visited set, claimed atomically with each pop
//!
//! The frontier is the only state shared between workers. It is wrapped in a
//! [`SharedFrontier`] and never locked across an `.await`.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use url::Url;

/// Frontier shared between the coordinator and its workers
pub type SharedFrontier = Arc<Mutex<Frontier>>;

/// A URL waiting to be crawled, with the context that led to it
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    /// Normalized URL; the visited and queued key
    pub url: Url,

    /// Address to request, as it was discovered
    pub fetch_url: Url,

    /// 0 for the seed, parent depth + 1 otherwise
    pub depth: u32,

    pub parent_url: Option<Url>,

    /// Anchor text of the link that led here
    pub anchor_text: String,

    /// Text around that link
    pub surrounding_text: String,
}

impl FrontierEntry {
    /// The depth-0 entry of a session
    pub fn seed(url: Url, fetch_url: Url) -> Self {
        Self {
            url,
            fetch_url,
            depth: 0,
            parent_url: None,
            anchor_text: String::new(),
            surrounding_text: String::new(),
        }
    }

    /// An entry discovered on `parent`
    pub fn child(
        parent: &FrontierEntry,
        url: Url,
        fetch_url: Url,
        anchor_text: impl Into<String>,
        surrounding_text: impl Into<String>,
    ) -> Self {
        Self {
            url,
            fetch_url,
            depth: parent.depth + 1,
            parent_url: Some(parent.url.clone()),
            anchor_text: anchor_text.into(),
            surrounding_text: surrounding_text.into(),
        }
    }
}

/// Heap slot; the sequence number keeps discovery order within a depth
#[derive(Debug)]
struct Queued {
    entry: FrontierEntry,
    seq: u64,
}

// Lower (depth, seq) pairs are popped first from the max-heap
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .entry
            .depth
            .cmp(&self.entry.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Queued {}

/// Breadth-first frontier with a visited set
pub struct Frontier {
    heap: BinaryHeap<Queued>,

    /// URLs currently in the heap
    queued: HashSet<String>,

    /// URLs already handed to a worker
    visited: HashSet<String>,

    max_depth: u32,
    next_seq: u64,

    /// Set when the session starts draining; pushes are refused afterwards
    closed: bool,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            heap: BinaryHeap::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            max_depth,
            next_seq: 0,
            closed: false,
        }
    }

    pub fn shared(max_depth: u32) -> SharedFrontier {
        Arc::new(Mutex::new(Self::new(max_depth)))
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Queues an entry; returns false if it was dropped
    ///
    /// Entries deeper than the bound, visited URLs, URLs already queued and
    /// anything pushed after [`close`](Self::close) are dropped silently.
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if self.closed {
            tracing::trace!("Frontier closed, dropping {}", entry.url);
            return false;
        }
        if entry.depth > self.max_depth {
            tracing::trace!("Depth {} over bound, dropping {}", entry.depth, entry.url);
            return false;
        }
        let key = entry.url.as_str();
        if self.visited.contains(key) || self.queued.contains(key) {
            tracing::trace!("Already known, dropping {}", entry.url);
            return false;
        }

        self.queued.insert(key.to_string());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { entry, seq });
        true
    }

    /// Takes the next entry and marks its URL visited
    ///
    /// Depth and visited status are checked again here, so an entry can never
    /// be dispatched twice or past the bound.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        while let Some(Queued { entry, .. }) = self.heap.pop() {
            let key = entry.url.as_str();
            self.queued.remove(key);

            if entry.depth > self.max_depth || self.visited.contains(key) {
                continue;
            }

            self.visited.insert(key.to_string());
            return Some(entry);
        }
        None
    }

    /// Marks a URL visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Refuses all further pushes
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Removes every queued entry, in the order they would have been popped
    pub fn drain(&mut self) -> Vec<FrontierEntry> {
        let mut abandoned = Vec::with_capacity(self.heap.len());
        while let Some(Queued { entry, .. }) = self.heap.pop() {
            self.queued.remove(entry.url.as_str());
            if !self.visited.contains(entry.url.as_str()) {
                abandoned.push(entry);
            }
        }
        abandoned
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
