use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::time::{sleep, timeout};

use crate::{
    configuration::SearchSettings,
    domain::{
        extracted_record::ExtractedRecord, search_kind::SearchKind, search_request::SearchQuery,
        site_profile::SiteProfile,
    },
    error::SearchError,
    services::{
        droid::{BrowserSession, SessionIdentity, SessionLauncher},
        extractor::{extract_listings, Extraction},
    },
};

pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub page_load_timeout: Duration,
    pub empty_backoff: Duration,
    pub error_backoff: Duration,
    pub backoff_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: MAX_RETRIES,
            page_load_timeout: Duration::from_secs(60),
            empty_backoff: Duration::from_millis(2000),
            error_backoff: Duration::from_millis(2750),
            backoff_jitter: Duration::from_millis(250),
        }
    }
}

impl From<&SearchSettings> for RetryPolicy {
    fn from(settings: &SearchSettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            page_load_timeout: Duration::from_secs(settings.page_load_timeout_secs),
            empty_backoff: Duration::from_millis(settings.empty_backoff_millis),
            error_backoff: Duration::from_millis(settings.error_backoff_millis),
            backoff_jitter: Duration::from_millis(settings.backoff_jitter_millis),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, base: Duration) -> Duration {
        let jitter_ms = self.backoff_jitter.as_millis() as u64;
        match jitter_ms {
            0 => base,
            _ => base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms)),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ScrapeReport {
    pub records: Vec<ExtractedRecord>,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Attempts whose page carried the site's "no results" text.
    pub no_results_pages: u32,
}

pub struct ListingScraper {
    launcher: Arc<dyn SessionLauncher>,
    policy: RetryPolicy,
    profiles: Vec<SiteProfile>,
}

impl ListingScraper {
    pub fn new(launcher: Arc<dyn SessionLauncher>, policy: RetryPolicy) -> Self {
        let profiles = SearchKind::ALL
            .into_iter()
            .filter_map(SiteProfile::for_kind)
            .collect();

        ListingScraper {
            launcher,
            policy,
            profiles,
        }
    }

    /// Replaces the built-in profile for the profile's kind.
    pub fn with_profile(mut self, profile: SiteProfile) -> Self {
        self.profiles.retain(|p| p.kind != profile.kind);
        self.profiles.push(profile);
        self
    }

    pub fn profile(&self, kind: SearchKind) -> Result<&SiteProfile, SearchError> {
        self.profiles
            .iter()
            .find(|p| p.kind == kind)
            .ok_or(SearchError::UnsupportedKind(kind))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs up to `max_attempts` sequential attempts, each in a fresh
    /// session, and stops at the first one that yields records. An empty
    /// page is retried even when it claims there are no results; a blocked
    /// or half-rendered page can say the same thing.
    pub async fn run_search(
        &self,
        kind: SearchKind,
        query: &SearchQuery,
    ) -> Result<ScrapeReport, SearchError> {
        let profile = self.profile(kind)?;
        let url = profile.target_url(query);
        log::info!("[{}] Target URL: {}", kind, url);

        let mut report = ScrapeReport::default();
        let mut previous: Option<SessionIdentity> = None;

        for attempt in 1..=self.policy.max_attempts {
            let identity = SessionIdentity::fresh(attempt, previous.as_ref());
            report.attempts = attempt;
            log::info!(
                "[{}] Attempt {}/{} with session {}",
                kind,
                attempt,
                self.policy.max_attempts,
                identity.session_id
            );

            let backoff = match self.attempt(profile, &url, &identity).await {
                Ok(extraction) if !extraction.records.is_empty() => {
                    log::info!(
                        "[{}] Success on attempt {} with {} records",
                        kind,
                        attempt,
                        extraction.records.len()
                    );
                    report.records = extraction.records;
                    break;
                }
                Ok(Extraction {
                    no_results: true, ..
                }) => {
                    log::warn!(
                        "[{}] Attempt {} shows the site's no results text for {}",
                        kind,
                        attempt,
                        url
                    );
                    report.no_results_pages += 1;
                    self.policy.backoff(self.policy.empty_backoff)
                }
                Ok(_) => {
                    log::warn!("[{}] No data found on attempt {}", kind, attempt);
                    self.policy.backoff(self.policy.empty_backoff)
                }
                Err(e) => {
                    log::error!("[{}] Error on attempt {}: {}", kind, attempt, e);
                    report.last_error = Some(e.to_string());
                    self.policy.backoff(self.policy.error_backoff)
                }
            };

            previous = Some(identity);
            if attempt < self.policy.max_attempts {
                sleep(backoff).await;
            }
        }

        Ok(report)
    }

    /// One attempt. The session is closed before this returns, whatever
    /// happened while driving it.
    async fn attempt(
        &self,
        profile: &SiteProfile,
        url: &str,
        identity: &SessionIdentity,
    ) -> Result<Extraction, SearchError> {
        let mut session = timeout(
            self.policy.page_load_timeout,
            self.launcher.launch(identity, profile.viewport),
        )
        .await
        .map_err(|_| SearchError::PageLoadTimeout(self.policy.page_load_timeout))??;

        let outcome = self.drive(session.as_mut(), profile, url).await;

        if let Err(e) = session.close().await {
            log::warn!(
                "Failed to close browser session {}: {}",
                identity.session_id,
                e
            );
        }

        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        profile: &SiteProfile,
        url: &str,
    ) -> Result<Extraction, SearchError> {
        timeout(self.policy.page_load_timeout, session.goto(url))
            .await
            .map_err(|_| SearchError::PageLoadTimeout(self.policy.page_load_timeout))??;

        sleep(profile.settle.initial_wait).await;

        if let Some(popup) = profile.popup_close {
            if let Err(e) = session.dismiss(popup).await {
                log::debug!("Could not dismiss popup {}: {}", popup, e);
            }
        }

        for _ in 0..profile.settle.scroll_cycles {
            session.scroll_by(profile.settle.scroll_step_px).await?;
            sleep(profile.settle.scroll_pause).await;
        }

        let source = session.page_source().await?;
        extract_listings(&source, profile)
    }
}
