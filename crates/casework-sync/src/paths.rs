//! Resource paths under the configured API base.
//!
//! Identifiers are percent-encoded as path segments and query strings are
//! form-encoded, both through `url`, so ids containing `/` or spaces cannot
//! escape their segment.

use casework_core::config::ApiConfig;
use casework_core::errors::{CaseworkError, Result};
use url::Url;

const ORIGIN: &str = "http://casework.invalid/";

/// Builds request paths for every workflow endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPaths {
    base: Vec<String>,
    scopes: Vec<String>,
    origin: Url,
}

impl ApiPaths {
    /// Paths rooted at `config.base_path`.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let origin = Url::parse(ORIGIN)
            .map_err(|e| CaseworkError::internal(format!("path origin: {e}")))?;
        Ok(Self {
            base: split_segments(&config.base_path),
            scopes: split_segments(&config.scopes_path),
            origin,
        })
    }

    fn build(&self, segments: &[&str], query: &[(&'static str, String)]) -> String {
        let mut url = self.origin.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear();
            path.extend(self.base.iter().map(String::as_str));
            path.extend(segments.iter().copied());
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        }
    }

    // ─── Review ──────────────────────────────────────────────

    /// `GET` the review record.
    pub fn review(&self, transaction_id: &str) -> String {
        self.build(&["transactions", transaction_id, "review"], &[])
    }

    /// `PATCH` the review status.
    pub fn review_status(&self, transaction_id: &str) -> String {
        self.build(&["transactions", transaction_id, "review", "status"], &[])
    }

    /// `POST` an assignment.
    pub fn review_assign(&self, transaction_id: &str) -> String {
        self.build(&["transactions", transaction_id, "review", "assign"], &[])
    }

    /// `POST` a resolution.
    pub fn review_resolve(&self, transaction_id: &str) -> String {
        self.build(&["transactions", transaction_id, "review", "resolve"], &[])
    }

    /// `POST` an escalation.
    pub fn review_escalate(&self, transaction_id: &str) -> String {
        self.build(&["transactions", transaction_id, "review", "escalate"], &[])
    }

    // ─── Notes ───────────────────────────────────────────────

    /// List or create notes.
    pub fn notes(&self, transaction_id: &str) -> String {
        self.build(&["transactions", transaction_id, "notes"], &[])
    }

    /// Update or delete one note.
    pub fn note(&self, transaction_id: &str, note_id: &str) -> String {
        self.build(&["transactions", transaction_id, "notes", note_id], &[])
    }

    // ─── Cases ───────────────────────────────────────────────

    /// Case list with filter and page parameters.
    pub fn cases(&self, query: &[(&'static str, String)]) -> String {
        self.build(&["cases"], query)
    }

    /// Fetch, update or delete one case.
    pub fn case(&self, case_id: &str) -> String {
        self.build(&["cases", case_id], &[])
    }

    /// `POST` a case resolution.
    pub fn case_resolve(&self, case_id: &str) -> String {
        self.build(&["cases", case_id, "resolve"], &[])
    }

    /// Link transactions to a case.
    pub fn case_transactions(&self, case_id: &str) -> String {
        self.build(&["cases", case_id, "transactions"], &[])
    }

    /// Unlink one transaction.
    pub fn case_transaction(&self, case_id: &str, transaction_id: &str) -> String {
        self.build(&["cases", case_id, "transactions", transaction_id], &[])
    }

    // ─── Worklist ────────────────────────────────────────────

    /// Worklist page with filter parameters.
    pub fn worklist(&self, query: &[(&'static str, String)]) -> String {
        self.build(&["worklist"], query)
    }

    /// Worklist counters.
    pub fn worklist_stats(&self) -> String {
        self.build(&["worklist", "stats"], &[])
    }

    /// `POST` to claim the next item.
    pub fn worklist_claim(&self) -> String {
        self.build(&["worklist", "claim"], &[])
    }

    // ─── Authorization ───────────────────────────────────────

    /// External scope endpoint.
    pub fn scopes(&self) -> String {
        let segments: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        self.build(&segments, &[])
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> ApiPaths {
        ApiPaths::new(&ApiConfig::default()).unwrap()
    }

    #[test]
    fn test_review_paths() {
        let p = paths();
        assert_eq!(p.review("txn-1"), "/api/v1/transactions/txn-1/review");
        assert_eq!(
            p.review_escalate("txn-1"),
            "/api/v1/transactions/txn-1/review/escalate"
        );
    }

    #[test]
    fn test_segments_are_encoded() {
        assert_eq!(
            paths().note("txn 1", "a/b"),
            "/api/v1/transactions/txn%201/notes/a%2Fb"
        );
    }

    #[test]
    fn test_query_is_form_encoded() {
        let path = paths().cases(&[
            ("status", "OPEN".to_string()),
            ("search", "card ring&co".to_string()),
        ]);
        assert_eq!(path, "/api/v1/cases?status=OPEN&search=card+ring%26co");
    }

    #[test]
    fn test_empty_base_and_custom_scopes() {
        let p = ApiPaths::new(&ApiConfig {
            base_path: String::new(),
            scopes_path: "/oauth/me/scopes".to_string(),
        })
        .unwrap();
        assert_eq!(p.scopes(), "/oauth/me/scopes");
        assert_eq!(p.worklist_stats(), "/worklist/stats");
    }
}
