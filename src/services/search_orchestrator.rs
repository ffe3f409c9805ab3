use std::time::Instant;

use chrono::Utc;
use serde_json::Value;

use crate::{
    dal::ResultStore,
    domain::{
        extracted_record::ExtractedRecord,
        search_kind::SearchKind,
        search_request::{SearchQuery, SearchRequest},
        search_result::SearchResult,
    },
    error::{RelayError, SearchError},
    services::{
        admission::AdmissionController,
        listing_scraper::ListingScraper,
        webhook_relay::{RelayOutcome, WebhookRelay},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// The webhook answered.
    Enriched,
    /// Listings were scraped but the webhook call failed.
    Degraded,
    /// Listings were scraped and no webhook is configured for the kind.
    Unenriched,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub result: SearchResult,
    pub relay_error: Option<RelayError>,
}

impl SearchOutcome {
    pub fn records(&self) -> &[ExtractedRecord] {
        &self.result.scraped
    }
}

pub struct SearchOrchestrator {
    admission: AdmissionController,
    scraper: ListingScraper,
    relay: WebhookRelay,
    store: ResultStore,
}

impl SearchOrchestrator {
    pub fn new(
        admission: AdmissionController,
        scraper: ListingScraper,
        relay: WebhookRelay,
        store: ResultStore,
    ) -> Self {
        SearchOrchestrator {
            admission,
            scraper,
            relay,
            store,
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchOutcome, SearchError> {
        let SearchRequest {
            kind,
            user_id,
            query,
        } = request;

        let _slot = self.admission.try_acquire(&user_id, kind).ok_or_else(|| {
            SearchError::AdmissionConflict {
                user_id: user_id.clone(),
                kind,
            }
        })?;
        let started = Instant::now();
        log::info!("[{}] Search started for user {}: {:?}", kind, user_id, query);

        let mut scraped = Vec::new();
        if kind.pre_scrapes() {
            let report = self.scraper.run_search(kind, &query).await?;
            if report.records.is_empty() {
                log::error!(
                    "[{}] Failed for user {} after {} attempts ({} showed no results text)",
                    kind,
                    user_id,
                    report.attempts,
                    report.no_results_pages
                );
                return Err(SearchError::ExtractionExhausted {
                    attempts: report.attempts,
                    last_error: report.last_error,
                });
            }
            scraped = report.records;
        }

        let outcome = self.relay.relay(kind, &query, &scraped).await;
        let (status, external_response, relay_error) = match outcome {
            RelayOutcome::Enriched(value) => (SearchStatus::Enriched, Some(value), None),
            RelayOutcome::Skipped if kind.pre_scrapes() => (SearchStatus::Unenriched, None, None),
            RelayOutcome::Skipped => return Err(RelayError::NotConfigured(kind).into()),
            RelayOutcome::Failed(error) if kind.pre_scrapes() => {
                (SearchStatus::Degraded, None, Some(error))
            }
            RelayOutcome::Failed(error) => return Err(error.into()),
        };

        let failed = relay_error.is_some();
        let result = build_result(&user_id, kind, query, scraped, external_response, failed);
        self.persist(&result).await;

        log::info!(
            "[{}] Search for user {} finished as {:?} in {:.2}s",
            kind,
            user_id,
            status,
            started.elapsed().as_secs_f64()
        );
        Ok(SearchOutcome {
            status,
            result,
            relay_error,
        })
    }

    pub async fn saved_result(
        &self,
        user_id: &str,
        kind: SearchKind,
    ) -> Result<Option<SearchResult>, SearchError> {
        Ok(self.store.load(user_id, kind).await?)
    }

    /// A failed save is logged; the caller still gets its data.
    async fn persist(&self, result: &SearchResult) {
        if let Err(e) = self.store.save(result).await {
            log::error!(
                "Error saving {} results for user {}: {}",
                result.kind,
                result.user_id,
                e
            );
        }
    }
}

fn build_result(
    user_id: &str,
    kind: SearchKind,
    query: SearchQuery,
    scraped: Vec<ExtractedRecord>,
    external_response: Option<Value>,
    external_failed: bool,
) -> SearchResult {
    SearchResult {
        user_id: user_id.to_string(),
        kind,
        timestamp: Utc::now(),
        query,
        scraped,
        external_response,
        external_failed,
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;
    use tokio::sync::Notify;

    use super::{SearchOrchestrator, SearchStatus};
    use crate::{
        configuration::WebhookSettings,
        dal::ResultStore,
        domain::{
            search_kind::SearchKind,
            search_request::{SearchQuery, SearchRequest},
            site_profile::{PageSettle, SiteProfile},
        },
        error::{RelayError, SearchError},
        services::{
            admission::AdmissionController,
            listing_scraper::{ListingScraper, RetryPolicy},
            testing::{
                indeed_page, spawn_json_webhook, unreachable_url, AttemptScript, FixtureLauncher,
            },
            webhook_relay::WebhookRelay,
        },
    };

    fn orchestrator(
        launcher: &FixtureLauncher,
        jobs_url: Option<String>,
        colleges_url: Option<String>,
        store: ResultStore,
    ) -> SearchOrchestrator {
        let policy = RetryPolicy {
            page_load_timeout: Duration::from_millis(500),
            empty_backoff: Duration::ZERO,
            error_backoff: Duration::ZERO,
            backoff_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let scraper = ListingScraper::new(Arc::new(launcher.clone()), policy)
            .with_profile(SiteProfile::indeed().with_settle(PageSettle::immediate()))
            .with_profile(SiteProfile::internshala().with_settle(PageSettle::immediate()));
        let relay = WebhookRelay::new(WebhookSettings {
            jobs_url,
            internships_url: None,
            colleges_url,
            timeout_secs: 5,
        });

        SearchOrchestrator::new(AdmissionController::new(), scraper, relay, store)
    }

    fn jobs_request(user_id: &str) -> SearchRequest {
        SearchRequest {
            kind: SearchKind::Jobs,
            user_id: user_id.to_string(),
            query: SearchQuery {
                role: Some("Backend Engineer".to_string()),
                city: "Pune".to_string(),
                course: None,
            },
        }
    }

    #[tokio::test]
    async fn scraped_jobs_are_enriched_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let webhook = spawn_json_webhook(json!([{
            "output": "```json\n{\"jobs\": [{\"title\": \"Backend Engineer 1\"}], \"summary\": \"Best fit first\"}\n```"
        }]))
        .unwrap();
        let launcher = FixtureLauncher::new(vec![AttemptScript::Page(indeed_page(
            ".job_seen_beacon",
            5,
        ))]);
        let orchestrator =
            orchestrator(&launcher, Some(webhook), None, ResultStore::new(dir.path()));

        let outcome = orchestrator.search(jobs_request("u1")).await.unwrap();

        assert_eq!(outcome.status, SearchStatus::Enriched);
        assert_eq!(outcome.records().len(), 5);
        assert!(outcome
            .records()
            .iter()
            .all(|r| !r.title.is_empty() && !r.raw_text.is_empty()));
        assert_eq!(
            outcome.result.external_response,
            Some(json!({"results": [{"title": "Backend Engineer 1"}], "answer": "Best fit first"}))
        );

        let stored = orchestrator
            .saved_result("u1", SearchKind::Jobs)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, outcome.result);
        assert_eq!(stored.scraped.len(), 5);
        assert!(!stored.external_failed);
        assert!(!orchestrator.admission().is_in_flight("u1", SearchKind::Jobs));
    }

    #[tokio::test]
    async fn webhook_failure_degrades_and_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FixtureLauncher::new(vec![AttemptScript::Page(indeed_page(
            ".cardOutline",
            2,
        ))]);
        let orchestrator = orchestrator(
            &launcher,
            Some(unreachable_url().unwrap()),
            None,
            ResultStore::new(dir.path()),
        );

        let outcome = orchestrator.search(jobs_request("u2")).await.unwrap();

        assert_eq!(outcome.status, SearchStatus::Degraded);
        assert!(matches!(outcome.relay_error, Some(RelayError::Connect(_))));
        let stored = orchestrator
            .saved_result("u2", SearchKind::Jobs)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.external_failed);
        assert_eq!(stored.scraped.len(), 2);
        assert_eq!(stored.external_response, None);
    }

    #[tokio::test]
    async fn exhaustion_is_an_error_and_frees_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FixtureLauncher::new(vec![]);
        let orchestrator = orchestrator(&launcher, None, None, ResultStore::new(dir.path()));

        let err = orchestrator.search(jobs_request("u3")).await.unwrap_err();

        assert!(matches!(
            err,
            SearchError::ExtractionExhausted { attempts: 3, .. }
        ));
        assert_eq!(launcher.launched(), 3);
        assert!(!orchestrator.admission().is_in_flight("u3", SearchKind::Jobs));
        assert_eq!(
            orchestrator.saved_result("u3", SearchKind::Jobs).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn no_results_pages_still_exhaust() {
        let dir = tempfile::tempdir().unwrap();
        let page = "<html><body><p>The search Backend Engineer did not match any jobs.</p></body></html>";
        let launcher = FixtureLauncher::new(vec![
            AttemptScript::Page(page.to_string()),
            AttemptScript::Page(page.to_string()),
            AttemptScript::Page(page.to_string()),
        ]);
        let orchestrator = orchestrator(&launcher, None, None, ResultStore::new(dir.path()));

        let err = orchestrator.search(jobs_request("u4")).await.unwrap_err();

        assert!(matches!(
            err,
            SearchError::ExtractionExhausted { attempts: 3, .. }
        ));
        assert_eq!(launcher.launched(), 3);
        assert_eq!(
            orchestrator.saved_result("u4", SearchKind::Jobs).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn duplicate_search_is_rejected_while_first_runs() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let launcher = FixtureLauncher::new(vec![AttemptScript::Gated(
            Arc::clone(&gate),
            indeed_page(".job_seen_beacon", 1),
        )]);
        let orchestrator = Arc::new(orchestrator(
            &launcher,
            None,
            None,
            ResultStore::new(dir.path()),
        ));

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.search(jobs_request("u5")).await })
        };
        while !orchestrator.admission().is_in_flight("u5", SearchKind::Jobs) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = orchestrator.search(jobs_request("u5")).await;
        assert!(matches!(
            second,
            Err(SearchError::AdmissionConflict { .. })
        ));

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status, SearchStatus::Unenriched);
        assert_eq!(launcher.launched(), 1);
        assert!(!orchestrator.admission().is_in_flight("u5", SearchKind::Jobs));
    }

    #[tokio::test]
    async fn colleges_go_straight_to_the_webhook() {
        let dir = tempfile::tempdir().unwrap();
        let webhook = spawn_json_webhook(json!({"colleges": [{"name": "COEP"}]})).unwrap();
        let launcher = FixtureLauncher::new(vec![]);
        let orchestrator =
            orchestrator(&launcher, None, Some(webhook), ResultStore::new(dir.path()));
        let request = SearchRequest {
            kind: SearchKind::Colleges,
            user_id: "u6".to_string(),
            query: SearchQuery {
                role: None,
                city: "Pune".to_string(),
                course: Some("B.Tech".to_string()),
            },
        };

        let outcome = orchestrator.search(request).await.unwrap();

        assert_eq!(outcome.status, SearchStatus::Enriched);
        assert_eq!(
            outcome.result.external_response,
            Some(json!({"colleges": [{"name": "COEP"}]}))
        );
        assert_eq!(launcher.launched(), 0);
    }

    #[tokio::test]
    async fn college_relay_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FixtureLauncher::new(vec![]);
        let orchestrator = orchestrator(
            &launcher,
            None,
            Some(unreachable_url().unwrap()),
            ResultStore::new(dir.path()),
        );
        let request = SearchRequest {
            kind: SearchKind::Colleges,
            user_id: "u7".to_string(),
            query: SearchQuery {
                role: None,
                city: "Pune".to_string(),
                course: Some("MBA".to_string()),
            },
        };

        let err = orchestrator.search(request).await.unwrap_err();

        assert!(matches!(err, SearchError::Relay(RelayError::Connect(_))));
        assert!(!orchestrator.admission().is_in_flight("u7", SearchKind::Colleges));
    }
}
