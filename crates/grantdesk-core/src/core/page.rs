// grantdesk-core/src/core/page.rs
// ============================================================================
// Module: Grantdesk Pagination
// Description: Page requests, page envelopes, and proposal filters.
// Purpose: Define the listing contract shared by every collection endpoint.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every list endpoint takes a [`PageRequest`] and returns a [`Page`] with a
//! `{data, pagination}` envelope. `total_pages` is always
//! `ceil(total_count / limit)`; requesting a page beyond range yields empty
//! data, not an error. Proposal filters compose conjunctively.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CallId;
use crate::core::identifiers::UserId;
use crate::core::proposal::ProposalStatus;

// ============================================================================
// SECTION: Page Request
// ============================================================================

/// Default page number when none is supplied.
pub const DEFAULT_PAGE: u64 = 1;
/// Default page size when none is supplied.
pub const DEFAULT_LIMIT: u64 = 10;

/// A validated fixed-size page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// One-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u64,
}

impl PageRequest {
    /// Builds a page request, rejecting zero page or limit.
    #[must_use]
    pub const fn new(page: u64, limit: u64) -> Option<Self> {
        if page == 0 || limit == 0 {
            return None;
        }
        Some(Self {
            page,
            limit,
        })
    }

    /// Returns the number of rows to skip for this page.
    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

// ============================================================================
// SECTION: Page Envelope
// ============================================================================

/// Pagination metadata attached to every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// One-based page number served.
    pub page: u64,
    /// Page size served.
    pub limit: u64,
    /// Total matching rows across all pages.
    pub total_count: u64,
    /// Total pages: `ceil(total_count / limit)`.
    pub total_pages: u64,
}

impl PageInfo {
    /// Computes pagination metadata for a request and total count.
    #[must_use]
    pub const fn new(request: PageRequest, total_count: u64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total_count,
            total_pages: total_count.div_ceil(request.limit),
        }
    }
}

/// A page of results with its pagination envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page, creation time descending.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    /// Builds a page from rows and pagination metadata.
    #[must_use]
    pub const fn new(data: Vec<T>, pagination: PageInfo) -> Self {
        Self {
            data,
            pagination,
        }
    }

    /// Builds an empty page for a request with zero matches.
    #[must_use]
    pub const fn empty(request: PageRequest) -> Self {
        Self {
            data: Vec::new(),
            pagination: PageInfo::new(request, 0),
        }
    }

    /// Maps the row type while keeping the pagination envelope.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

// ============================================================================
// SECTION: Proposal Filter
// ============================================================================

/// Conjunctive filter over proposal listings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProposalFilter {
    /// Restrict to a single status.
    pub status: Option<ProposalStatus>,
    /// Restrict to a single call.
    pub call_id: Option<CallId>,
    /// Restrict to a single researcher.
    pub researcher_id: Option<UserId>,
    /// Case-insensitive substring match over title and abstract.
    pub search_term: Option<String>,
}

impl ProposalFilter {
    /// Returns a copy of the filter scoped to one researcher.
    #[must_use]
    pub fn scoped_to(mut self, researcher_id: UserId) -> Self {
        self.researcher_id = Some(researcher_id);
        self
    }

    /// Returns true when a proposal's title or abstract matches the search
    /// term (case-insensitive substring), or when no term is set.
    #[must_use]
    pub fn matches_search(&self, title: &str, abstract_text: &str) -> bool {
        self.search_term.as_deref().is_none_or(|term| {
            let term = term.to_lowercase();
            title.to_lowercase().contains(&term) || abstract_text.to_lowercase().contains(&term)
        })
    }
}
