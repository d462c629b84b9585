//! `PageSession` over chromiumoxide
//!
//! Each context is one tab (`Page`). Commands are sent to the `Page` object
//! directly, so which tab the browser window shows is irrelevant to
//! correctness; `switch_to` still brings the tab to front for headed runs.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::{
    GetNavigationHistoryParams, NavigateToHistoryEntryParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use rand::seq::IndexedRandom;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    ContextId, Deadline, ElementRef, Locator, Pace, PageSession, Pacing, SessionFactory,
    with_timeout,
};
use crate::browser_profile::{BrowserProfile, create_unique_profile};
use crate::browser_setup::{launch_browser, mask_automation};
use crate::config::ScrapeConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::tail_chars;

pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// Dropped after the browser process has exited
    profile: Option<BrowserProfile>,
    pages: Vec<(ContextId, Page)>,
    current: ContextId,
    pacing: Pacing,
    op_timeout: Duration,
}

fn context_of(page: &Page) -> ContextId {
    ContextId::new(page.target_id().inner().clone())
}

impl ChromiumSession {
    fn page(&self) -> ScrapeResult<Page> {
        self.pages
            .iter()
            .find(|(id, _)| *id == self.current)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| {
                ScrapeError::StaleReference(format!("context {} is closed", self.current))
            })
    }

    async fn resolve(&self, element: &ElementRef) -> ScrapeResult<Element> {
        if element.context != self.current {
            return Err(element.stale("context is not active"));
        }
        let page = self.page()?;
        let found = with_timeout(
            async {
                page.find_elements(element.locator.as_str())
                    .await
                    .map_err(ScrapeError::browser)
            },
            self.op_timeout,
            "element lookup",
        )
        .await?;
        found
            .into_iter()
            .nth(element.index)
            .ok_or_else(|| element.stale("index no longer exists"))
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> ScrapeResult<()> {
        let page = self.page()?;
        debug!("Navigating to {url}");
        with_timeout(
            async {
                page.goto(url).await.map_err(ScrapeError::browser)?;
                Ok(())
            },
            self.op_timeout,
            "navigation",
        )
        .await?;
        self.pacing.pause(Pace::Navigation).await;
        Ok(())
    }

    async fn go_back(&mut self) -> ScrapeResult<()> {
        let page = self.page()?;
        with_timeout(
            async {
                let history = page
                    .execute(GetNavigationHistoryParams::default())
                    .await
                    .map_err(ScrapeError::browser)?;
                let previous = usize::try_from(history.result.current_index - 1)
                    .ok()
                    .and_then(|i| history.result.entries.get(i))
                    .ok_or_else(|| ScrapeError::Browser("no previous history entry".into()))?;
                page.execute(NavigateToHistoryEntryParams::new(previous.id))
                    .await
                    .map_err(ScrapeError::browser)?;
                page.wait_for_navigation()
                    .await
                    .map_err(ScrapeError::browser)?;
                Ok(())
            },
            self.op_timeout,
            "back navigation",
        )
        .await?;
        self.pacing.pause(Pace::Back).await;
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> ScrapeResult<ElementRef> {
        let page = self.page()?;
        let deadline = Deadline::after(timeout);
        loop {
            if page.find_element(locator.as_str()).await.is_ok() {
                return Ok(ElementRef::new(self.current.clone(), locator.clone(), 0));
            }
            if !deadline.tick().await {
                return Err(deadline.timed_out(format!("wait for '{locator}'")));
            }
        }
    }

    async fn find_all(&mut self, locator: &Locator) -> ScrapeResult<Vec<ElementRef>> {
        let page = self.page()?;
        let count = match page.find_elements(locator.as_str()).await {
            Ok(elements) => elements.len(),
            Err(e) => {
                // chromiumoxide reports "no node" as an error on some pages
                debug!("find_elements('{locator}') failed: {e}");
                0
            }
        };
        Ok((0..count)
            .map(|i| ElementRef::new(self.current.clone(), locator.clone(), i))
            .collect())
    }

    async fn text(&mut self, element: &ElementRef) -> ScrapeResult<String> {
        let node = self.resolve(element).await?;
        let text = with_timeout(
            async { node.inner_text().await.map_err(ScrapeError::browser) },
            self.op_timeout,
            "read element text",
        )
        .await?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> ScrapeResult<Option<String>> {
        let node = self.resolve(element).await?;
        with_timeout(
            async { node.attribute(name).await.map_err(ScrapeError::browser) },
            self.op_timeout,
            "read attribute",
        )
        .await
    }

    async fn click(&mut self, element: &ElementRef) -> ScrapeResult<()> {
        let node = self.resolve(element).await?;
        with_timeout(
            async {
                node.click().await.map_err(ScrapeError::browser)?;
                Ok(())
            },
            self.op_timeout,
            "click",
        )
        .await?;
        self.pacing.pause(Pace::PostClick).await;
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementRef, text: &str) -> ScrapeResult<()> {
        let node = self.resolve(element).await?;
        node.click().await.map_err(ScrapeError::browser)?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            node.type_str(ch.encode_utf8(&mut buf))
                .await
                .map_err(ScrapeError::browser)?;
            self.pacing.pause(Pace::Keystroke).await;
        }
        Ok(())
    }

    async fn open_in_new_context(&mut self, element: &ElementRef) -> ScrapeResult<ContextId> {
        let node = self.resolve(element).await?;
        let href = node
            .attribute("href")
            .await
            .map_err(ScrapeError::browser)?
            .ok_or_else(|| ScrapeError::Browser(format!("{} has no href", element.locator)))?;
        let base = self.current_url().await?;
        let target = url::Url::parse(&base)
            .and_then(|b| b.join(&href))
            .map_err(|e| ScrapeError::Browser(format!("cannot resolve '{href}': {e}")))?;

        let page = with_timeout(
            async {
                self.browser
                    .new_page(target.as_str())
                    .await
                    .map_err(ScrapeError::browser)
            },
            self.op_timeout,
            "open context",
        )
        .await?;
        if let Err(e) = mask_automation(&page).await {
            debug!("{e:#}");
        }
        let id = context_of(&page);
        self.pages.push((id.clone(), page));
        Ok(id)
    }

    async fn contexts(&mut self) -> ScrapeResult<Vec<ContextId>> {
        let live = with_timeout(
            async { self.browser.pages().await.map_err(ScrapeError::browser) },
            self.op_timeout,
            "list tabs",
        )
        .await?;
        let live_ids: Vec<ContextId> = live.iter().map(context_of).collect();

        self.pages.retain(|(id, _)| live_ids.contains(id));
        for page in live {
            let id = context_of(&page);
            if !self.pages.iter().any(|(known, _)| *known == id) {
                self.pages.push((id, page));
            }
        }
        Ok(self.pages.iter().map(|(id, _)| id.clone()).collect())
    }

    fn current_context(&self) -> ContextId {
        self.current.clone()
    }

    async fn switch_to(&mut self, context: &ContextId) -> ScrapeResult<()> {
        let page = self
            .pages
            .iter()
            .find(|(id, _)| id == context)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| ScrapeError::StaleReference(format!("context {context} is closed")))?;
        self.current = context.clone();
        if let Err(e) = page.bring_to_front().await {
            debug!("bring_to_front failed for {context}: {e}");
        }
        Ok(())
    }

    async fn close_current_context(&mut self) -> ScrapeResult<()> {
        let Some(pos) = self.pages.iter().position(|(id, _)| *id == self.current) else {
            return Err(ScrapeError::StaleReference(format!(
                "context {} is already closed",
                self.current
            )));
        };
        let (_, page) = self.pages.remove(pos);
        if let Some((first, _)) = self.pages.first() {
            self.current = first.clone();
        }
        with_timeout(
            async { page.close().await.map_err(ScrapeError::browser) },
            self.op_timeout,
            "close tab",
        )
        .await
    }

    async fn current_url(&mut self) -> ScrapeResult<String> {
        let page = self.page()?;
        let url = with_timeout(
            async { page.url().await.map_err(ScrapeError::browser) },
            self.op_timeout,
            "read page url",
        )
        .await?;
        Ok(url.unwrap_or_default())
    }

    async fn rendered_markup(&mut self) -> ScrapeResult<String> {
        let page = self.page()?;
        with_timeout(
            async { page.content().await.map_err(ScrapeError::browser) },
            self.op_timeout,
            "read page content",
        )
        .await
    }

    async fn shutdown(&mut self) -> ScrapeResult<()> {
        info!("Shutting down browser session");
        self.pages.clear();
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Waiting for browser exit failed: {e}");
        }
        self.handler.abort();
        // Chrome has released the profile now
        self.profile.take();
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
        if self.profile.is_some() {
            warn!("ChromiumSession dropped without shutdown()");
        }
    }
}

/// Launches one browser per session with a random user agent and a fresh profile
#[derive(Debug, Clone)]
pub struct ChromiumSessionFactory {
    headless: bool,
    user_agents: Vec<String>,
    pacing: Pacing,
    op_timeout: Duration,
}

impl ChromiumSessionFactory {
    #[must_use]
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            headless: config.headless(),
            user_agents: config.user_agents().to_vec(),
            pacing: Pacing::new(*config.delays()),
            op_timeout: config.wait_timeout(),
        }
    }

    fn pick_user_agent(&self) -> ScrapeResult<String> {
        self.user_agents
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| ScrapeError::Config("user agent pool is empty".into()))
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    type Session = ChromiumSession;

    async fn open(&self) -> ScrapeResult<ChromiumSession> {
        let user_agent = self.pick_user_agent()?;
        let profile = create_unique_profile().map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
        info!(
            "Opening browser session, user agent ...{}",
            tail_chars(&user_agent, 40)
        );

        let (browser, handler) = launch_browser(self.headless, profile.path(), &user_agent)
            .await
            .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(ScrapeError::browser(e));
            }
        };
        if let Err(e) = mask_automation(&page).await {
            debug!("{e:#}");
        }
        let current = context_of(&page);

        Ok(ChromiumSession {
            browser,
            handler,
            profile: Some(profile),
            pages: vec![(current.clone(), page)],
            current,
            pacing: self.pacing,
            op_timeout: self.op_timeout,
        })
    }
}
