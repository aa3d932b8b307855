//! Page arithmetic shared by drivers.

use crate::error::{Result, TableError};
use crate::template::PageParam;
use crate::value::PageInfo;
use std::ops::Range;

/// Page metadata for `total` matching rows; unpaged requests report one page
pub fn page_info(page: &PageParam, total: u64) -> PageInfo {
    let total_pages = if page.is_paged() {
        total.div_ceil(page.page_size)
    } else {
        1
    };
    PageInfo {
        current_page: page.page,
        page_size: page.page_size,
        total_pages,
        total_results: total,
    }
}

/// Slice of `len` rows covered by the requested page
pub fn page_window(page: &PageParam, len: usize) -> Range<usize> {
    if !page.is_paged() {
        return 0..len;
    }
    let start = page.page.saturating_mul(page.page_size);
    let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
    let end = usize::try_from(page.page_size)
        .map(|size| start.saturating_add(size))
        .unwrap_or(usize::MAX)
        .min(len);
    start..end
}

/// Offset of the first row of the requested page
pub fn page_offset(page: &PageParam) -> u64 {
    page.page.saturating_mul(page.page_size)
}

/// Reject unpaged requests whose total exceeds `limit`
pub fn check_limit(page: &PageParam, total: u64, limit: u64) -> Result<()> {
    if !page.is_paged() && total > limit {
        return Err(TableError::ResultExceedMaxLimit {
            count: total,
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info_rounds_up() {
        let info = page_info(&PageParam::new(0, 3), 10);
        assert_eq!(info.total_pages, 4);
        assert_eq!(info.total_results, 10);

        let info = page_info(&PageParam::new(1, 5), 10);
        assert_eq!(info.total_pages, 2);
        assert_eq!(info.current_page, 1);

        assert_eq!(page_info(&PageParam::new(0, 5), 0).total_pages, 0);
        assert_eq!(page_info(&PageParam::unpaged(), 42).total_pages, 1);
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(&PageParam::new(0, 3), 10), 0..3);
        assert_eq!(page_window(&PageParam::new(3, 3), 10), 9..10);
        assert_eq!(page_window(&PageParam::new(5, 3), 10), 10..10);
        assert_eq!(page_window(&PageParam::unpaged(), 10), 0..10);
    }

    #[test]
    fn test_check_limit_only_applies_unpaged() {
        assert!(check_limit(&PageParam::unpaged(), 10, 10).is_ok());
        assert!(matches!(
            check_limit(&PageParam::unpaged(), 11, 10),
            Err(TableError::ResultExceedMaxLimit { count: 11, limit: 10 })
        ));
        assert!(check_limit(&PageParam::new(0, 5), 11, 10).is_ok());
    }
}
