//! Scripted browser sessions for exercising the scraper without a WebDriver.
//!
//! A [`FixtureLauncher`] hands out one [`AttemptScript`] per launched session,
//! in order. Once the script runs out every further session serves an empty
//! page.

use std::{
    collections::VecDeque,
    net::TcpListener,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use actix_web::{web, App, HttpResponse, HttpServer};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::{
    domain::site_profile::Viewport,
    error::SearchError,
    services::droid::{BrowserSession, SessionIdentity, SessionLauncher},
};

const EMPTY_PAGE: &str = "<html><body></body></html>";

pub enum AttemptScript {
    /// Serve this HTML.
    Page(String),
    /// Fail navigation with a session error.
    Crash(String),
    /// Never finish navigating.
    HangOnGoto,
    /// Wait for the notify before finishing navigation, then serve the HTML.
    Gated(Arc<Notify>, String),
}

#[derive(Default)]
struct FixtureState {
    scripts: Mutex<VecDeque<AttemptScript>>,
    launched: AtomicUsize,
    closed: AtomicUsize,
    identities: Mutex<Vec<SessionIdentity>>,
    visited: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct FixtureLauncher {
    state: Arc<FixtureState>,
}

impl FixtureLauncher {
    pub fn new(scripts: Vec<AttemptScript>) -> Self {
        let launcher = FixtureLauncher::default();
        launcher
            .state
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(scripts);
        launcher
    }

    pub fn launched(&self) -> usize {
        self.state.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn identities(&self) -> Vec<SessionIdentity> {
        self.state
            .identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state
            .visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SessionLauncher for FixtureLauncher {
    async fn launch(
        &self,
        identity: &SessionIdentity,
        _viewport: Viewport,
    ) -> Result<Box<dyn BrowserSession>, SearchError> {
        let script = self
            .state
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| AttemptScript::Page(EMPTY_PAGE.to_string()));

        self.state.launched.fetch_add(1, Ordering::SeqCst);
        self.state
            .identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identity.clone());

        Ok(Box::new(FixtureSession {
            script,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FixtureSession {
    script: AttemptScript,
    state: Arc<FixtureState>,
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn goto(&mut self, url: &str) -> Result<(), SearchError> {
        self.state
            .visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        match &self.script {
            AttemptScript::Page(_) => Ok(()),
            AttemptScript::Crash(message) => Err(SearchError::session(message)),
            AttemptScript::HangOnGoto => std::future::pending().await,
            AttemptScript::Gated(gate, _) => {
                gate.notified().await;
                Ok(())
            }
        }
    }

    async fn scroll_by(&mut self, _pixels: i64) -> Result<(), SearchError> {
        Ok(())
    }

    async fn dismiss(&mut self, _selector: &str) -> Result<(), SearchError> {
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, SearchError> {
        match &self.script {
            AttemptScript::Page(html) | AttemptScript::Gated(_, html) => Ok(html.clone()),
            _ => Ok(EMPTY_PAGE.to_string()),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SearchError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An Indeed-like results page with `count` cards carrying `card_class`
/// (e.g. `.job_seen_beacon`).
pub fn indeed_page(card_class: &str, count: usize) -> String {
    let class = card_class.trim_start_matches('.');
    let cards: String = (1..=count)
        .map(|i| {
            format!(
                r#"<div class="{class}">
                    <h2 class="jobTitle"><a href="/rc/clk?jk=job{i}"><span>Backend Engineer {i}</span></a></h2>
                    <span data-testid="company-name">Company {i} Pvt Ltd</span>
                    <div data-testid="text-location">Pune, Maharashtra</div>
                </div>"#
            )
        })
        .collect();

    format!("<html><body><main>{}</main></body></html>", cards)
}

/// Serves `reply` to every POST on a random local port and returns the URL.
/// Must be called from inside a tokio runtime.
pub fn spawn_json_webhook(reply: Value) -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    let reply = web::Data::new(reply);
    let server = HttpServer::new(move || {
        App::new().app_data(reply.clone()).default_service(web::to(
            |reply: web::Data<Value>| async move { HttpResponse::Ok().json(reply.get_ref()) },
        ))
    })
    .workers(1)
    .listen(listener)?
    .run();
    tokio::spawn(server);

    Ok(format!("http://127.0.0.1:{}/webhook", port))
}

/// A URL on a local port that nothing listens on.
pub fn unreachable_url() -> std::io::Result<String> {
    let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    Ok(format!("http://127.0.0.1:{}/webhook", port))
}
