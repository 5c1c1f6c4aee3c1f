use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Above this many pages the link row collapses to a window around the current page.
pub const FULL_LINK_LIMIT: usize = 10;
/// Pages within this distance of the current page stay visible when collapsed.
pub const LINK_RADIUS: usize = 2;

/// The fixed set of selectable page sizes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::EnumIter,
)]
#[serde(try_from = "usize", into = "usize")]
pub enum PageSize {
    Five,
    #[default]
    Ten,
    Twenty,
    Fifty,
}

impl PageSize {
    pub fn get(self) -> usize {
        match self {
            PageSize::Five => 5,
            PageSize::Ten => 10,
            PageSize::Twenty => 20,
            PageSize::Fifty => 50,
        }
    }

    /// Next size in the set, wrapping around.
    pub fn cycle(self) -> Self {
        let all: Vec<PageSize> = PageSize::iter().collect();
        let pos = all.iter().position(|size| *size == self).unwrap_or(0);
        all[(pos + 1) % all.len()]
    }
}

impl TryFrom<usize> for PageSize {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        PageSize::iter()
            .find(|size| size.get() == value)
            .ok_or_else(|| format!("unsupported page size {value} (expected 5, 10, 20 or 50)"))
    }
}

impl From<PageSize> for usize {
    fn from(size: PageSize) -> Self {
        size.get()
    }
}

/// Position of the current page inside the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn new(total_items: usize, page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let start = page.saturating_sub(1).saturating_mul(page_size).min(total_items);
        let end = start.saturating_add(page_size).min(total_items);
        Self {
            page,
            page_size,
            total_items,
            total_pages: total_pages(total_items, page_size),
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Navigation requests outside `[1, total_pages]` are rejected.
    pub fn can_navigate(&self, page: usize) -> bool {
        page >= 1 && page <= self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// `Showing a-b of n`, or `0 entries` for an empty window.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            "0 entries".to_string()
        } else {
            format!(
                "Showing {}-{} of {}",
                self.start + 1,
                self.end,
                self.total_items
            )
        }
    }
}

#[derive(Debug)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub window: PageWindow,
}

pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let window = PageWindow::new(items.len(), page, page_size);
    Page {
        items: &items[window.start..window.end],
        window,
    }
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(page_size)
}

pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

/// Page numbers to show as links. Every page when there are at most ten,
/// otherwise the first, the last and those within two of `current`.
pub fn page_links(total_pages: usize, current: usize) -> Vec<usize> {
    (1..=total_pages)
        .filter(|&page| {
            total_pages <= FULL_LINK_LIMIT
                || page == 1
                || page == total_pages
                || page.abs_diff(current) <= LINK_RADIUS
        })
        .collect()
}
