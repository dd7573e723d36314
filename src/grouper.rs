//! Partition of TOC records by physical page.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::toc::ArticleRecord;

/// Records of one issue keyed by page number, iterated in ascending order.
///
/// Every record handed to [`group_by_page`] lands in exactly one group, and
/// records keep their listing order inside a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageGroups(BTreeMap<u32, Vec<ArticleRecord>>);

/// Groups records by their page number.
#[must_use]
pub fn group_by_page(records: Vec<ArticleRecord>) -> PageGroups {
    let mut groups: BTreeMap<u32, Vec<ArticleRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.page).or_default().push(record);
    }
    PageGroups(groups)
}

impl PageGroups {
    /// Number of distinct pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no page has any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records listed on `page`.
    #[must_use]
    pub fn get(&self, page: u32) -> Option<&[ArticleRecord]> {
        self.0.get(&page).map(Vec::as_slice)
    }

    /// Pages in ascending order with their records.
    pub fn iter(&self) -> btree_map::Iter<'_, u32, Vec<ArticleRecord>> {
        self.0.iter()
    }

    /// Drops pages numbered below `min_page`; returns how many were dropped.
    pub fn retain_from(&mut self, min_page: u32) -> usize {
        let before = self.0.len();
        self.0.retain(|page, _| *page >= min_page);
        before - self.0.len()
    }

    /// Total number of records over all pages.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl<'a> IntoIterator for &'a PageGroups {
    type Item = (&'a u32, &'a Vec<ArticleRecord>);
    type IntoIter = btree_map::Iter<'a, u32, Vec<ArticleRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
