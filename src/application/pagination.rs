//! Page-number pagination over ordered listings.

use std::num::IntErrorKind;

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Value of the `page` parameter in a raw query string.
///
/// A repeated parameter resolves to its last occurrence.
pub fn page_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(name, _)| name == "page")
        .last()
        .map(|(_, value)| value.into_owned())
}

/// Resolved position of one page inside a listing of `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub per_page: u64,
    pub total: u64,
}

impl PageWindow {
    /// Resolve the requested page against the listing size.
    ///
    /// Missing, non-numeric and sub-1 requests land on page 1; requests past
    /// the end land on the last page. An empty listing still has one page.
    pub fn resolve(total: u64, per_page: u64, requested: Option<&str>) -> Self {
        let per_page = per_page.max(1);
        let num_pages = total.div_ceil(per_page).max(1);
        let number = match requested.map(|raw| raw.trim().parse::<i64>()) {
            Some(Ok(value)) => value.clamp(1, num_pages as i64) as u64,
            Some(Err(err)) if *err.kind() == IntErrorKind::PosOverflow => num_pages,
            _ => 1,
        };

        Self {
            number,
            num_pages,
            per_page,
            total,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn next_page_number(&self) -> u64 {
        (self.number + 1).min(self.num_pages)
    }

    pub fn previous_page_number(&self) -> u64 {
        self.number.saturating_sub(1).max(1)
    }

    /// Number of items that land on this page.
    pub fn len(&self) -> u64 {
        self.total
            .saturating_sub(self.offset())
            .min(self.per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice an already materialised, ordered listing down to this page.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.offset() as usize).min(items.len());
        let end = (start + self.per_page as usize).min(items.len());
        &items[start..end]
    }
}

/// One page of items with its window metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self { items, window }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            window: self.window,
        }
    }
}
