use async_trait::async_trait;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use uuid::Uuid;

use crate::{configuration::BrowserSettings, domain::site_profile::Viewport, error::SearchError};

const USER_AGENT_DRAWS: usize = 5;

/// Per-attempt browser fingerprint. No two attempts share one.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    pub attempt: u32,
    pub session_id: Uuid,
    pub user_agent: String,
}

impl SessionIdentity {
    /// Draws a new identity, avoiding the previous attempt's user agent when
    /// the pool gives us something else.
    pub fn fresh(attempt: u32, previous: Option<&SessionIdentity>) -> Self {
        let mut user_agent = fake_user_agent::get_rua().to_string();
        if let Some(previous) = previous {
            for _ in 0..USER_AGENT_DRAWS {
                if user_agent != previous.user_agent {
                    break;
                }
                user_agent = fake_user_agent::get_rua().to_string();
            }
        }

        SessionIdentity {
            attempt,
            session_id: Uuid::new_v4(),
            user_agent,
        }
    }
}

/// One isolated browser, used for a single scrape attempt.
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str) -> Result<(), SearchError>;

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), SearchError>;

    /// Clicks the element if it is on the page. Absence is not an error.
    async fn dismiss(&mut self, selector: &str) -> Result<(), SearchError>;

    async fn page_source(&mut self) -> Result<String, SearchError>;

    async fn close(self: Box<Self>) -> Result<(), SearchError>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(
        &self,
        identity: &SessionIdentity,
        viewport: Viewport,
    ) -> Result<Box<dyn BrowserSession>, SearchError>;
}

/// Launches Chrome sessions through a WebDriver endpoint.
pub struct Droid {
    webdriver_url: String,
    headless: bool,
}

impl Droid {
    pub fn new(settings: &BrowserSettings) -> Self {
        Droid {
            webdriver_url: settings.webdriver_url.clone(),
            headless: settings.headless,
        }
    }
}

#[async_trait]
impl SessionLauncher for Droid {
    async fn launch(
        &self,
        identity: &SessionIdentity,
        viewport: Viewport,
    ) -> Result<Box<dyn BrowserSession>, SearchError> {
        let mut caps = DesiredCapabilities::chrome();
        if self.headless {
            caps.add_arg("--headless=new")?;
        }
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--disable-infobars")?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_arg(&format!(
            "--window-size={},{}",
            viewport.width, viewport.height
        ))?;
        caps.add_arg(&format!("--user-agent={}", identity.user_agent))?;

        let driver = WebDriver::new(self.webdriver_url.as_str(), caps).await?;
        log::info!(
            "Launched browser session {} for attempt {}",
            identity.session_id,
            identity.attempt
        );

        Ok(Box::new(ChromeSession { driver }))
    }
}

struct ChromeSession {
    driver: WebDriver,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), SearchError> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), SearchError> {
        self.driver
            .execute(format!("window.scrollBy(0, {});", pixels), Vec::new())
            .await?;
        Ok(())
    }

    async fn dismiss(&mut self, selector: &str) -> Result<(), SearchError> {
        if let Ok(element) = self.driver.find(By::Css(selector)).await {
            if element.is_displayed().await.unwrap_or(false) {
                element.click().await?;
            }
        }
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, SearchError> {
        Ok(self.driver.source().await?)
    }

    async fn close(self: Box<Self>) -> Result<(), SearchError> {
        self.driver.quit().await?;
        Ok(())
    }
}
