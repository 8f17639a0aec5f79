use std::{collections::BTreeMap, hash::Hash};

use chrono::{DateTime, Datelike, Utc};
use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};

/// Values grouped by the calendar year of their timestamp, years ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearlyStats<T> {
    years: BTreeMap<i32, Vec<T>>,
}

impl<T> Default for YearlyStats<T> {
    fn default() -> Self {
        Self {
            years: BTreeMap::new(),
        }
    }
}

impl<T> YearlyStats<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, year: i32, value: T) {
        self.years.entry(year).or_default().push(value);
    }

    pub fn get(&self, year: i32) -> Option<&[T]> {
        self.years.get(&year).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &[T])> {
        self.years
            .iter()
            .map(|(year, values)| (*year, values.as_slice()))
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }

    /// Number of years with at least one value.
    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Groups every value under its year, keeping duplicates and encounter order.
pub fn group_by_year<T, I>(items: I) -> YearlyStats<T>
where
    I: IntoIterator<Item = (DateTime<Utc>, T)>,
{
    let mut stats = YearlyStats::new();
    for (timestamp, value) in items {
        stats.push(timestamp.year(), value);
    }
    stats
}

/// Groups values under their year, keeping only the first occurrence of each
/// value within a year.
pub fn group_distinct_by_year<T, I>(items: I) -> YearlyStats<T>
where
    T: Hash + Eq + Clone,
    I: IntoIterator<Item = (DateTime<Utc>, T)>,
{
    let mut seen: FxHashSet<(i32, T)> = FxHashSet::default();
    let mut stats = YearlyStats::new();
    for (timestamp, value) in items {
        let year = timestamp.year();
        if seen.insert((year, value.clone())) {
            stats.push(year, value);
        }
    }
    stats
}

/// Edit counts per user, remembering the order users were first seen in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStats {
    counts: Vec<(CompactString, usize)>,
    index: FxHashMap<CompactString, usize>,
}

impl UserStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, user: &str) {
        match self.index.get(user) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                let user = CompactString::from(user);
                self.index.insert(user.clone(), self.counts.len());
                self.counts.push((user, 1));
            }
        }
    }

    pub fn count(&self, user: &str) -> Option<usize> {
        self.index.get(user).map(|&i| self.counts[i].1)
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    /// Number of distinct users.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Users in the order they were first recorded.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.counts.iter().map(|(user, _)| user.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts
            .iter()
            .map(|(user, count)| (user.as_str(), *count))
    }

    /// Counts in non-increasing order; equal counts keep encounter order.
    pub fn sorted_by_count(&self) -> Vec<(&str, usize)> {
        let mut sorted: Vec<_> = self.iter().collect();
        // `sort_by` is stable
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
    }
}

impl<'a> FromIterator<&'a str> for UserStats {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut stats = UserStats::new();
        for user in iter {
            stats.record(user);
        }
        stats
    }
}
