//! Directional, wraparound search over item lists with a per-query cache.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::trace;
use regex::{Regex, RegexBuilder};

/// Items that can be matched against a query string.
pub trait Searchable {
    fn matches(&self, query: &str) -> bool;
}

impl Searchable for str {
    fn matches(&self, query: &str) -> bool {
        self.contains(query)
    }
}

impl Searchable for String {
    fn matches(&self, query: &str) -> bool {
        self.contains(query)
    }
}

impl Searchable for Cow<'_, str> {
    fn matches(&self, query: &str) -> bool {
        self.contains(query)
    }
}

impl Searchable for Path {
    fn matches(&self, query: &str) -> bool {
        self.to_string_lossy().contains(query)
    }
}

impl Searchable for PathBuf {
    fn matches(&self, query: &str) -> bool {
        self.to_string_lossy().contains(query)
    }
}

impl<T: Searchable + ?Sized> Searchable for &T {
    fn matches(&self, query: &str) -> bool {
        (**self).matches(query)
    }
}

/// Build a regex for `query` using smartcase: an all-lowercase query
/// matches case-insensitively.
pub fn smartcase_regex(query: &str) -> Result<Regex, regex::Error> {
    let smartcase = query.chars().all(|c| !c.is_uppercase());
    RegexBuilder::new(query).case_insensitive(smartcase).build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Item index the search is relative to (usually the cursor).
    pub start: usize,
    /// Which match to land on: `1` is the next, `-1` the previous.
    pub count: i64,
    pub use_cache: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            start: 0,
            count: 1,
            use_cache: false,
        }
    }
}

/// Identity of an item list: its address and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListKey {
    addr: usize,
    len: usize,
}

impl ListKey {
    fn of<T>(items: &[T]) -> Self {
        Self {
            addr: items.as_ptr().addr(),
            len: items.len(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Searcher {
    cache: HashMap<String, (ListKey, Vec<usize>)>,
}

impl Searcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the `opts.count`-th match of `query` relative to `opts.start`,
    /// wrapping around either end. Returns the item index.
    pub fn search<T: Searchable>(
        &mut self,
        items: &[T],
        query: &str,
        opts: SearchOptions,
    ) -> Option<usize> {
        self.search_by(items, query, opts, |item, q, _| item.matches(q))
    }

    /// Like [`search`](Self::search) with a custom `test(item, query, index)`.
    pub fn search_by<T, F>(
        &mut self,
        items: &[T],
        query: &str,
        opts: SearchOptions,
        mut test: F,
    ) -> Option<usize>
    where
        F: FnMut(&T, &str, usize) -> bool,
    {
        if opts.count == 0 {
            return None;
        }

        let key = ListKey::of(items);
        if opts.use_cache
            && let Some((cached, found)) = self.cache.get(query)
            && *cached == key
        {
            return next_match(found, opts.start, opts.count);
        }

        let found: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|&(i, item)| test(item, query, i))
            .map(|(i, _)| i)
            .collect();
        trace!("search: {query:?} matched {} of {}", found.len(), items.len());

        let result = next_match(&found, opts.start, opts.count);
        if opts.use_cache {
            self.cache.insert(query.to_string(), (key, found));
        }
        result
    }

    /// Drop the cached matches for `query`, or everything when `None`.
    pub fn clear_cache(&mut self, query: Option<&str>) {
        match query {
            Some(q) => {
                self.cache.remove(q);
            }
            None => self.cache.clear(),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Step `count` matches away from `start` in the sorted `found` list.
fn next_match(found: &[usize], start: usize, count: i64) -> Option<usize> {
    if found.is_empty() || count == 0 {
        return None;
    }
    let len = found.len() as i64;
    let base = match found.iter().position(|&i| i >= start) {
        Some(pos) if count > 0 && found[pos] > start => pos as i64 - 1,
        Some(pos) => pos as i64,
        None if count > 0 => len - 1,
        None => 0,
    };
    let idx = (base + count).rem_euclid(len);
    found.get(idx as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Ten items with "x" at 2, 5 and 9.
    fn items() -> Vec<String> {
        (0..10)
            .map(|i| {
                if [2, 5, 9].contains(&i) {
                    format!("x{i}")
                } else {
                    format!("item{i}")
                }
            })
            .collect()
    }

    fn opts(start: usize, count: i64) -> SearchOptions {
        SearchOptions {
            start,
            count,
            use_cache: false,
        }
    }

    #[test]
    fn wraps_forward_past_last_match() {
        let mut s = Searcher::new();
        assert_eq!(s.search(&items(), "x", opts(9, 1)), Some(2));
    }

    #[test]
    fn forward_and_backward_steps() {
        let mut s = Searcher::new();
        let items = items();
        assert_eq!(s.search(&items, "x", opts(3, 1)), Some(5));
        assert_eq!(s.search(&items, "x", opts(0, 2)), Some(5));
        assert_eq!(s.search(&items, "x", opts(5, 1)), Some(9));
        assert_eq!(s.search(&items, "x", opts(5, -1)), Some(2));
        assert_eq!(s.search(&items, "x", opts(6, -1)), Some(5));
        assert_eq!(s.search(&items, "x", opts(2, -1)), Some(9));
        assert_eq!(s.search(&items, "x", opts(2, -4)), Some(9));
        assert_eq!(s.search(&items, "x", opts(40, 1)), Some(2));
        assert_eq!(s.search(&items, "x", opts(40, -1)), Some(9));
    }

    #[test]
    fn no_matches_or_zero_count() {
        let mut s = Searcher::new();
        assert_eq!(s.search(&items(), "zzz", opts(0, 1)), None);
        assert_eq!(s.search(&items(), "x", opts(0, 0)), None);
        let empty: Vec<String> = Vec::new();
        assert_eq!(s.search(&empty, "x", opts(0, 1)), None);
    }

    #[test]
    fn default_test_is_case_sensitive() {
        let mut s = Searcher::new();
        let items = ["Alpha", "beta", "alphabet"];
        assert_eq!(s.search(&items, "alpha", SearchOptions::default()), Some(2));
    }

    #[test]
    fn cached_search_does_not_rescan() {
        let mut s = Searcher::new();
        let items = items();
        let calls = Cell::new(0);
        let test = |item: &String, q: &str, _: usize| {
            calls.set(calls.get() + 1);
            item.contains(q)
        };
        let cached = SearchOptions {
            use_cache: true,
            ..opts(0, 1)
        };

        let first = s.search_by(&items, "x", cached, test);
        assert_eq!(calls.get(), 10);
        let second = s.search_by(&items, "x", cached, test);
        assert_eq!(first, second);
        assert_eq!(calls.get(), 10);
        assert_eq!(s.cache_len(), 1);

        s.search_by(&items, "x", opts(0, 1), test);
        assert_eq!(calls.get(), 20);

        s.clear_cache(Some("x"));
        assert_eq!(s.cache_len(), 0);
        s.search_by(&items, "x", cached, test);
        assert_eq!(calls.get(), 30);
    }

    #[test]
    fn cache_is_keyed_by_list() {
        let mut s = Searcher::new();
        let a = items();
        let mut b = items();
        b.push("x10".into());
        let cached = SearchOptions {
            use_cache: true,
            ..opts(9, 1)
        };
        assert_eq!(s.search(&a, "x", cached), Some(2));
        assert_eq!(s.search(&b, "x", cached), Some(10));
        s.clear_cache(None);
        assert_eq!(s.cache_len(), 0);
    }

    #[test]
    fn searchable_impls() {
        let mut s = Searcher::new();
        let paths = [PathBuf::from("/tmp/a"), PathBuf::from("/usr/bin")];
        assert_eq!(s.search(&paths, "bin", SearchOptions::default()), Some(1));
        let cows: Vec<Cow<str>> = vec![Cow::Borrowed("one"), Cow::Owned("two".into())];
        assert_eq!(s.search(&cows, "tw", SearchOptions::default()), Some(1));
        let refs: Vec<&String> = Vec::new();
        assert_eq!(s.search(&refs, "tw", SearchOptions::default()), None);
    }

    #[test]
    fn smartcase() {
        let re = smartcase_regex("foo").unwrap();
        assert!(re.is_match("FOO bar"));
        let re = smartcase_regex("Foo").unwrap();
        assert!(!re.is_match("foo"));
        assert!(re.is_match("Foo"));
        assert!(smartcase_regex("(").is_err());
    }
}
