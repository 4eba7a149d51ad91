//! Table primitives: columns, sorting and the two pagination modes.
//!
//! A list is either held entirely client-side ([`ClientPaged`]) or paged by
//! the server ([`ServerPaged`]). They are separate types so one view can
//! never mix the two.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use moogship_core::PageMeta;
use serde::Serialize;

/// Column definition for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    /// Key passed to [`Sortable::sort_value`].
    pub key: &'static str,
    /// Header label.
    pub label: &'static str,
    pub sortable: bool,
}

impl TableColumn {
    #[must_use]
    pub const fn sortable(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            sortable: true,
        }
    }

    #[must_use]
    pub const fn new(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            sortable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Current sort column and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

impl SortState {
    #[must_use]
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Header click: the same column flips direction, a new column starts
    /// ascending.
    pub fn toggle(&mut self, column: &str) {
        if self.column == column {
            self.direction = self.direction.reversed();
        } else {
            self.column = column.to_string();
            self.direction = SortDirection::Asc;
        }
    }
}

/// A comparable cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortValue {
    /// Compared case-insensitively.
    Text(String),
    Number(i64),
    /// Missing dates sort last in either direction.
    Date(Option<DateTime<Utc>>),
}

impl SortValue {
    fn compare(&self, other: &Self, direction: SortDirection) -> Ordering {
        let ordered = |ord: Ordering| match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => ordered(a.to_lowercase().cmp(&b.to_lowercase())),
            (Self::Number(a), Self::Number(b)) => ordered(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => match (a, b) {
                (Some(a), Some(b)) => ordered(a.cmp(b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            // Mixed kinds only happen for unknown columns; keep input order
            _ => Ordering::Equal,
        }
    }
}

/// A row that can be sorted by column key.
pub trait Sortable {
    /// Value of `column`, or `None` if the column is not sortable.
    fn sort_value(&self, column: &str) -> Option<SortValue>;
}

/// Stable sort of `rows` by `sort`. Rows without a value keep their order.
pub fn sort_rows<T: Sortable>(rows: &mut [T], sort: &SortState) {
    rows.sort_by(|a, b| {
        match (a.sort_value(&sort.column), b.sort_value(&sort.column)) {
            (Some(a), Some(b)) => a.compare(&b, sort.direction),
            _ => Ordering::Equal,
        }
    });
}

/// A list held entirely in memory and sliced into pages locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientPaged<T> {
    rows: Vec<T>,
    page: u32,
    page_size: u32,
}

impl<T> ClientPaged<T> {
    /// Pages are 1-based; `page` is clamped into range.
    #[must_use]
    pub fn new(rows: Vec<T>, page: u32, page_size: u32) -> Self {
        let mut paged = Self {
            rows,
            page: 1,
            page_size: page_size.max(1),
        };
        paged.set_page(page);
        paged
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.clamp(1, self.page_count());
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// At least one page, even when empty.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        let pages = self.rows.len().div_ceil(self.page_size as usize).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    /// Rows `(page-1)*size .. page*size` of the full list.
    #[must_use]
    pub fn page_rows(&self) -> &[T] {
        let size = self.page_size as usize;
        let start = ((self.page - 1) as usize * size).min(self.rows.len());
        let end = (start + size).min(self.rows.len());
        self.rows.get(start..end).unwrap_or(&[])
    }

    #[must_use]
    pub fn all_rows(&self) -> &[T] {
        &self.rows
    }
}

/// One page as returned by the server, with the server's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerPaged<T> {
    rows: Vec<T>,
    meta: PageMeta,
}

impl<T> ServerPaged<T> {
    #[must_use]
    pub const fn new(rows: Vec<T>, meta: PageMeta) -> Self {
        Self { rows, meta }
    }

    #[must_use]
    pub fn page_rows(&self) -> &[T] {
        &self.rows
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.meta.page
    }

    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.meta.total_pages.max(1)
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.meta.total
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.meta.page < self.meta.total_pages
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        amount: i64,
        at: Option<DateTime<Utc>>,
    }

    impl Sortable for Row {
        fn sort_value(&self, column: &str) -> Option<SortValue> {
            match column {
                "name" => Some(SortValue::Text(self.name.to_string())),
                "amount" => Some(SortValue::Number(self.amount)),
                "at" => Some(SortValue::Date(self.at)),
                _ => None,
            }
        }
    }

    fn rows() -> Vec<Row> {
        let day = |d| Some(Utc.with_ymd_and_hms(2026, 3, d, 0, 0, 0).unwrap());
        vec![
            Row { name: "bravo", amount: 20, at: day(2) },
            Row { name: "Alpha", amount: 10, at: None },
            Row { name: "charlie", amount: 20, at: day(1) },
            Row { name: "delta", amount: 5, at: day(3) },
        ]
    }

    fn names(rows: &[Row]) -> Vec<&'static str> {
        rows.iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_toggle() {
        let mut sort = SortState::new("name", SortDirection::Asc);
        sort.toggle("name");
        assert_eq!(sort.direction, SortDirection::Desc);
        sort.toggle("amount");
        assert_eq!(sort, SortState::new("amount", SortDirection::Asc));
    }

    #[test]
    fn test_text_is_case_insensitive() {
        let mut list = rows();
        sort_rows(&mut list, &SortState::new("name", SortDirection::Asc));
        assert_eq!(names(&list), ["Alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let mut list = rows();
        let sort = SortState::new("amount", SortDirection::Desc);
        sort_rows(&mut list, &sort);
        // Equal amounts keep input order
        assert_eq!(names(&list), ["bravo", "charlie", "Alpha", "delta"]);

        let once = list.clone();
        sort_rows(&mut list, &sort);
        assert_eq!(list, once);
    }

    #[test]
    fn test_missing_dates_sort_last_both_ways() {
        let mut list = rows();
        sort_rows(&mut list, &SortState::new("at", SortDirection::Asc));
        assert_eq!(names(&list), ["charlie", "bravo", "delta", "Alpha"]);
        sort_rows(&mut list, &SortState::new("at", SortDirection::Desc));
        assert_eq!(names(&list), ["delta", "bravo", "charlie", "Alpha"]);
    }

    #[test]
    fn test_unknown_column_keeps_order() {
        let mut list = rows();
        sort_rows(&mut list, &SortState::new("nope", SortDirection::Asc));
        assert_eq!(list, rows());
    }

    #[test]
    fn test_client_paging_slices_and_clamps() {
        let paged = ClientPaged::new((1..=7).collect::<Vec<_>>(), 2, 3);
        assert_eq!(paged.page_count(), 3);
        assert_eq!(paged.page_rows(), &[4, 5, 6]);

        let last = ClientPaged::new((1..=7).collect::<Vec<_>>(), 9, 3);
        assert_eq!(last.page(), 3);
        assert_eq!(last.page_rows(), &[7]);

        let empty = ClientPaged::new(Vec::<i32>::new(), 0, 25);
        assert_eq!(empty.page(), 1);
        assert!(empty.page_rows().is_empty());
    }

    #[test]
    fn test_server_paging_uses_meta() {
        let paged = ServerPaged::new(
            vec!["a", "b"],
            PageMeta {
                page: 2,
                limit: 2,
                total: 5,
                total_pages: 3,
            },
        );
        assert_eq!(paged.page(), 2);
        assert_eq!(paged.total(), 5);
        assert!(paged.has_next());
    }
}
