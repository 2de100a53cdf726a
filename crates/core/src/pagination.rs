//! Pagination window for the instance list.
//!
//! Pages are 1-based. The window remembers the last total reported by the
//! backend so that a page which has become out of range (e.g. after the
//! last instances on it were deleted) is clamped on the next load instead
//! of being requested forever.

use serde::Serialize;

use crate::error::CoreError;

/// Default number of instances per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page the list endpoint serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Current page position plus the backend's last reported total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl PageWindow {
    /// Window on page 1 with nothing loaded yet.
    pub fn new(page_size: u32) -> Result<Self, CoreError> {
        validate_page_size(page_size)?;
        Ok(Self {
            page: 1,
            page_size,
            total: 0,
        })
    }

    /// Number of pages implied by `total`; never less than 1.
    pub fn page_count(&self) -> u32 {
        page_count(self.total, self.page_size)
    }

    /// `true` when `page` lies past the last page of the known total.
    pub fn is_out_of_range(&self) -> bool {
        self.page > self.page_count()
    }

    /// The page the next load should request.
    pub fn clamped_page(&self) -> u32 {
        self.page.min(self.page_count()).max(1)
    }

    /// Move to `page`. Page 0 is treated as page 1; pages past the end are
    /// accepted and clamped by the next load.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Change the page size, returning to page 1.
    pub fn set_page_size(&mut self, page_size: u32) -> Result<(), CoreError> {
        validate_page_size(page_size)?;
        self.page_size = page_size;
        self.page = 1;
        Ok(())
    }

    /// Zero-based index of the first record on the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total: 0,
        }
    }
}

/// `max(1, ceil(total / page_size))`.
pub fn page_count(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(u64::from(page_size)).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Validate a requested page size against `1..=MAX_PAGE_SIZE`.
pub fn validate_page_size(page_size: u32) -> Result<(), CoreError> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(CoreError::Validation(format!(
            "Page size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(95, 20), 5);
    }

    #[test]
    fn page_count_zero_size_is_one() {
        assert_eq!(page_count(50, 0), 1);
    }

    #[test]
    fn out_of_range_page_is_clamped() {
        let mut window = PageWindow::new(10).unwrap();
        window.total = 21;
        window.set_page(3);
        assert!(!window.is_out_of_range());

        window.total = 15;
        assert!(window.is_out_of_range());
        assert_eq!(window.clamped_page(), 2);

        window.total = 0;
        assert_eq!(window.clamped_page(), 1);
    }

    #[test]
    fn page_zero_becomes_one() {
        let mut window = PageWindow::default();
        window.set_page(0);
        assert_eq!(window.page, 1);
    }

    #[test]
    fn page_size_bounds() {
        assert!(PageWindow::new(0).is_err());
        assert!(PageWindow::new(MAX_PAGE_SIZE).is_ok());
        assert!(PageWindow::new(MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn set_page_size_resets_page() {
        let mut window = PageWindow::new(10).unwrap();
        window.total = 100;
        window.set_page(4);
        window.set_page_size(25).unwrap();
        assert_eq!(window.page, 1);
        assert_eq!(window.page_size, 25);
    }

    #[test]
    fn offset_tracks_page() {
        let mut window = PageWindow::new(20).unwrap();
        assert_eq!(window.offset(), 0);
        window.set_page(3);
        assert_eq!(window.offset(), 40);
    }
}
