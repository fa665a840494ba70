//! Offset pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

/// One page of a paginated list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    /// Items per page
    pub page_size: u32,
}

impl PageRequest {
    /// First page with the given size.
    pub fn first(page_size: u32) -> Self {
        Self { page: 1, page_size }
    }

    /// The page after this one.
    pub fn next(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self
        }
    }

    /// Query parameters for this page.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ]
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(25)
    }
}
