//! Splitting items into page-sized slices
//!
//! An empty item list still produces one (empty) page so the prototype
//! table is rendered blank rather than dropped.

/// Number of pages for `item_count` items at `items_per_page` per page
///
/// Always at least 1. A page size of zero is treated as one.
pub fn page_count(item_count: usize, items_per_page: usize) -> usize {
    let per_page = items_per_page.max(1);
    item_count.div_ceil(per_page).max(1)
}

/// Contiguous pages of at most `items_per_page` items, in order
pub fn paginate<T>(items: &[T], items_per_page: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return vec![items];
    }
    items.chunks(items_per_page.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_count_formula() {
        assert_eq!(page_count(0, 3), 1);
        assert_eq!(page_count(1, 3), 1);
        assert_eq!(page_count(3, 3), 1);
        assert_eq!(page_count(4, 3), 2);
        assert_eq!(page_count(7, 3), 3);
        assert_eq!(page_count(5, 0), 5);
    }

    #[test]
    fn test_paginate_seven_by_three() {
        let items: Vec<u32> = (1..=7).collect();
        let pages = paginate(&items, 3);
        let sizes: Vec<usize> = pages.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(pages[2], &[7]);
    }

    #[test]
    fn test_empty_input_yields_one_empty_page() {
        let items: Vec<u32> = Vec::new();
        let pages = paginate(&items, 4);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn test_page_sizes_match_formula() {
        for per_page in 1..6 {
            for n in 0..20 {
                let items: Vec<usize> = (0..n).collect();
                let pages = paginate(&items, per_page);
                let count = page_count(n, per_page);
                assert_eq!(pages.len(), count);
                let last = pages.last().unwrap().len();
                assert_eq!(last, n - (count - 1) * per_page);
                assert!(pages.iter().all(|p| p.len() <= per_page));
            }
        }
    }
}
