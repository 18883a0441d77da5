use serde::{Deserialize, Serialize};

/// One-based page selector used by list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub limit: u32,
}

impl Page {
    /// Creates a page selector. A zero page number is treated as the first page.
    pub fn new(number: u32, limit: u32) -> Self {
        Self {
            number: number.max(1),
            limit,
        }
    }

    /// Number of rows to skip before this page starts.
    pub fn offset(&self) -> usize {
        (self.number.max(1) as usize - 1) * self.limit as usize
    }

    /// Maximum number of rows on this page.
    pub fn size(&self) -> usize {
        self.limit as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            limit: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_zero_offset() {
        assert_eq!(Page::new(1, 25).offset(), 0);
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(Page::new(3, 10).offset(), 20);
    }

    #[test]
    fn zero_page_is_first_page() {
        let page = Page::new(0, 5);
        assert_eq!(page.number, 1);
        assert_eq!(page.offset(), 0);
    }
}
