//! SIS import upload.
//!
//! Each selected term's staged file is POSTed as-is to
//! `/api/v1/accounts/{account}/sis_imports.json?import_type=instructure_csv`.
//! Terms are independent: a failed upload is logged and reported, and the
//! remaining terms still go out. A selected term that failed staging is
//! reported as failed without a request.
//!
//! ```rust,ignore
//! use rosterload::publish::{publish, SisImportClient};
//!
//! let client = SisImportClient::new(&config);
//! let report = publish(&client, &outcome.staging, &config.selected_terms).await;
//! ```

pub mod staging;

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::PublishConfig;
use crate::error::{UploadError, UploadResult};
use crate::logs::{log_error, log_info, log_success, log_warning};
use staging::{StagedTerm, StagingReport};

/// Response body excerpt kept in reports.
const BODY_EXCERPT: usize = 500;

/// Client for the SIS import endpoint.
#[derive(Clone)]
pub struct SisImportClient {
    http: reqwest::Client,
    token: String,
    endpoint: String,
}

impl SisImportClient {
    pub fn new(config: &PublishConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: config.api_token.clone(),
            endpoint: import_url(&config.base_url, &config.account_id),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload one staged file. Returns the response body on a 2xx status.
    pub async fn upload(&self, path: &Path) -> UploadResult<String> {
        let body = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/csv")
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UploadError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body: excerpt(&text),
            });
        }
        Ok(text)
    }
}

/// Import endpoint for a host and account. `https://` is assumed when the
/// host carries no scheme.
pub fn import_url(base_url: &str, account_id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("https://{}", base)
    };
    format!(
        "{}/api/v1/accounts/{}/sis_imports.json?import_type=instructure_csv",
        base, account_id
    )
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT).collect()
}

/// What happened to one staged term.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TermOutcome {
    Uploaded { response: String },
    Failed { error: String },
    /// Staged but not selected for upload.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermReport {
    pub term_id: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: TermOutcome,
}

/// Per-term results of a publish step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublishReport {
    pub terms: Vec<TermReport>,
    /// Selected terms with no partition at all.
    pub missing_terms: Vec<String>,
}

impl PublishReport {
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, TermOutcome::Uploaded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TermOutcome::Failed { .. }))
    }

    /// True when uploads were attempted and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.failed() > 0 && self.uploaded() == 0
    }

    fn count(&self, pred: impl Fn(&TermOutcome) -> bool) -> usize {
        self.terms.iter().filter(|t| pred(&t.outcome)).count()
    }
}

/// Split staged terms into those to upload and those to skip, and list
/// selected terms that were never staged.
pub fn select_terms<'a>(
    staged: &'a [StagedTerm],
    selected: &[String],
) -> (Vec<&'a StagedTerm>, Vec<&'a StagedTerm>, Vec<String>) {
    let (chosen, skipped): (Vec<&StagedTerm>, Vec<&StagedTerm>) =
        staged.iter().partition(|s| selected.contains(&s.term_id));
    let missing = selected
        .iter()
        .filter(|t| !staged.iter().any(|s| &s.term_id == *t))
        .cloned()
        .collect();
    (chosen, skipped, missing)
}

/// Upload the selected terms one after another.
pub async fn publish(client: &SisImportClient, staging: &StagingReport, selected: &[String]) -> PublishReport {
    let (chosen, skipped, unstaged) = select_terms(&staging.staged, selected);
    let (not_written, missing_terms): (Vec<String>, Vec<String>) = unstaged
        .into_iter()
        .partition(|term| staging.failed_terms().any(|f| f == term.as_str()));
    let mut report = PublishReport {
        terms: Vec::with_capacity(staging.staged.len() + not_written.len()),
        missing_terms,
    };

    for term in &report.missing_terms {
        log_warning(format!("Selected term {} has no enrollments (nothing to upload)", term));
    }
    for failure in staging.failed.iter().filter(|f| not_written.contains(&f.term_id)) {
        log_error(format!("Term {} was not staged, nothing uploaded", failure.term_id));
        report.terms.push(TermReport {
            term_id: failure.term_id.clone(),
            path: failure.path.clone(),
            outcome: TermOutcome::Failed {
                error: failure.error.clone(),
            },
        });
    }
    for term in skipped {
        log_info(format!("Skipping term {}", term.term_id));
        report.terms.push(TermReport {
            term_id: term.term_id.clone(),
            path: term.path.clone(),
            outcome: TermOutcome::Skipped,
        });
    }

    for term in chosen {
        log_info(format!("📤 Uploading {} ({} rows)...", term.path.display(), term.rows));
        let outcome = match client.upload(&term.path).await {
            Ok(response) => {
                log_success(format!("Term {} accepted", term.term_id));
                TermOutcome::Uploaded { response }
            }
            Err(e) => {
                log_error(format!("Term {} failed: {}", term.term_id, e));
                TermOutcome::Failed { error: e.to_string() }
            }
        };
        report.terms.push(TermReport {
            term_id: term.term_id.clone(),
            path: term.path.clone(),
            outcome,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use staging::StagingFailure;

    fn client(selected: &[&str]) -> (SisImportClient, Vec<String>) {
        let config = PublishConfig {
            api_token: "x".into(),
            base_url: "localhost".into(),
            account_id: "1".into(),
            selected_terms: selected.iter().map(|t| t.to_string()).collect(),
        };
        (SisImportClient::new(&config), config.selected_terms)
    }

    fn staged(term: &str) -> StagedTerm {
        StagedTerm {
            term_id: term.to_string(),
            path: PathBuf::from(format!("out/enrollments_{}/enrollments.csv", term)),
            rows: 1,
        }
    }

    #[test]
    fn test_import_url() {
        assert_eq!(
            import_url("school.instructure.com", "1"),
            "https://school.instructure.com/api/v1/accounts/1/sis_imports.json?import_type=instructure_csv"
        );
        assert_eq!(
            import_url("http://localhost:3000/", "self"),
            "http://localhost:3000/api/v1/accounts/self/sis_imports.json?import_type=instructure_csv"
        );
    }

    #[test]
    fn test_select_terms() {
        let all = vec![staged("T1"), staged("T2"), staged("T3")];
        let selected = vec!["T2".to_string(), "T9".to_string()];

        let (chosen, skipped, missing) = select_terms(&all, &selected);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].term_id, "T2");
        assert_eq!(skipped.len(), 2);
        assert_eq!(missing, vec!["T9"]);
    }

    #[test]
    fn test_empty_selection_uploads_nothing() {
        let all = vec![staged("T1")];
        let (chosen, skipped, missing) = select_terms(&all, &[]);
        assert!(chosen.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_missing_staged_file_fails_per_term() {
        let (client, selected) = client(&["T1"]);
        let staging = StagingReport {
            staged: vec![staged("T1"), staged("T2")],
            failed: vec![],
        };

        let report = publish(&client, &staging, &selected).await;
        assert_eq!(report.failed(), 1);
        assert!(report.all_failed());
        assert!(report
            .terms
            .iter()
            .any(|t| t.term_id == "T2" && t.outcome == TermOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_unstaged_selected_term_reported_failed() {
        let (client, selected) = client(&["T1", "T9"]);
        let staging = StagingReport {
            staged: vec![staged("T2")],
            failed: vec![StagingFailure {
                term_id: "T1".into(),
                path: PathBuf::from("out/enrollments_T1/enrollments.csv"),
                error: "Not a directory".into(),
            }],
        };

        let report = publish(&client, &staging, &selected).await;
        assert_eq!(report.missing_terms, vec!["T9"]);
        assert_eq!(report.failed(), 1);
        let t1 = report.terms.iter().find(|t| t.term_id == "T1").unwrap();
        assert_eq!(t1.outcome, TermOutcome::Failed { error: "Not a directory".into() });
        assert!(report
            .terms
            .iter()
            .any(|t| t.term_id == "T2" && t.outcome == TermOutcome::Skipped));
    }

    #[test]
    fn test_report_counts() {
        let report = PublishReport {
            terms: vec![
                TermReport {
                    term_id: "T1".into(),
                    path: PathBuf::from("a"),
                    outcome: TermOutcome::Uploaded { response: "{}".into() },
                },
                TermReport {
                    term_id: "T2".into(),
                    path: PathBuf::from("b"),
                    outcome: TermOutcome::Failed { error: "401".into() },
                },
            ],
            missing_terms: vec![],
        };
        assert_eq!(report.uploaded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_failed());
    }
}
