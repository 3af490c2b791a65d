// grantdesk-core/tests/pagination.rs
// ============================================================================
// Module: Pagination Tests
// Description: Tests for page requests, envelopes, and filter matching.
// Purpose: Validate pagination math and search semantics.
// Dependencies: grantdesk-core, proptest
// ============================================================================
//! ## Overview
//! Checks the page envelope invariants (`total_pages = ceil(total / limit)`,
//! offsets never overlap) both on fixed cases and property-based over
//! arbitrary totals, plus case-insensitive search matching.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use grantdesk_core::Page;
use grantdesk_core::PageInfo;
use grantdesk_core::PageRequest;
use grantdesk_core::ProposalFilter;
use proptest::prelude::proptest;

#[test]
fn zero_page_or_limit_is_rejected() {
    assert!(PageRequest::new(0, 10).is_none());
    assert!(PageRequest::new(1, 0).is_none());
    assert!(PageRequest::new(0, 0).is_none());
    assert!(PageRequest::new(1, 1).is_some());
}

#[test]
fn default_request_is_first_page_of_ten() {
    let request = PageRequest::default();
    assert_eq!(request.page, 1);
    assert_eq!(request.limit, 10);
    assert_eq!(request.offset(), 0);
}

#[test]
fn total_pages_rounds_up() {
    let request = PageRequest::new(1, 10).expect("request");
    assert_eq!(PageInfo::new(request, 0).total_pages, 0);
    assert_eq!(PageInfo::new(request, 1).total_pages, 1);
    assert_eq!(PageInfo::new(request, 10).total_pages, 1);
    assert_eq!(PageInfo::new(request, 11).total_pages, 2);
}

#[test]
fn empty_page_keeps_the_request_shape() {
    let request = PageRequest::new(3, 25).expect("request");
    let page: Page<u32> = Page::empty(request);
    assert!(page.data.is_empty());
    assert_eq!(page.pagination.page, 3);
    assert_eq!(page.pagination.limit, 25);
    assert_eq!(page.pagination.total_count, 0);
}

#[test]
fn map_preserves_the_envelope() {
    let request = PageRequest::new(1, 2).expect("request");
    let page = Page::new(vec![1u32, 2], PageInfo::new(request, 5));
    let mapped = page.map(|value| value.to_string());
    assert_eq!(mapped.data, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(mapped.pagination.total_count, 5);
}

#[test]
fn search_matches_title_or_abstract_case_insensitively() {
    let filter = ProposalFilter {
        search_term: Some("CORAL".to_string()),
        ..ProposalFilter::default()
    };
    assert!(filter.matches_search("Coral reef recovery", "irrelevant"));
    assert!(filter.matches_search("irrelevant", "studies coral bleaching"));
    assert!(!filter.matches_search("kelp forests", "sea otters"));

    let unfiltered = ProposalFilter::default();
    assert!(unfiltered.matches_search("anything", "at all"));
}

proptest! {
    #[test]
    fn envelope_math_holds(total in 0u64..100_000, limit in 1u64..1_000, page in 1u64..1_000) {
        let request = PageRequest::new(page, limit).expect("nonzero request");
        let info = PageInfo::new(request, total);
        // Ceiling division without overflow games.
        assert_eq!(info.total_pages, total.div_ceil(limit));
        assert!(info.total_pages.saturating_mul(limit) >= total);
        if total > 0 {
            assert!((info.total_pages - 1).saturating_mul(limit) < total);
        }
    }

    #[test]
    fn offsets_partition_the_row_space(limit in 1u64..1_000, page in 1u64..1_000) {
        let request = PageRequest::new(page, limit).expect("nonzero request");
        let next = PageRequest::new(page + 1, limit).expect("nonzero request");
        assert_eq!(request.offset() + limit, next.offset());
    }
}
