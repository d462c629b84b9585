//! Test utilities for the rankscrape test suite
//!
//! `FakeSite` renders a tiny directory site (listing pages, item pages, record
//! pages, a parcel search form) as HTML and `FakeSession` drives it through the
//! `PageSession` trait, resolving locators with `scraper` against the rendered
//! markup. Faults are injected per link or per item name.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use rankscrape::config::{DelayBounds, PartitionSpec, ScrapeConfig};
use rankscrape::error::{ScrapeError, ScrapeResult};
use rankscrape::session::{ContextId, ElementRef, Locator, PageSession, SessionFactory};
use rankscrape::sink::{AuditLine, AuditLog, CsvSink};

pub const BASE_URL: &str = "https://directory.test";
pub const PARCEL_SEARCH_URL: &str = "https://county.test/search";

/// Creates a temporary directory for test output
pub fn create_test_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Fast, pause-free configuration rooted at `output_dir`
pub fn test_config(output_dir: &Path) -> ScrapeConfig {
    test_config_with(output_dir, |b| b)
}

pub fn test_config_with(
    output_dir: &Path,
    customize: impl FnOnce(
        rankscrape::config::ScrapeConfigBuilder<rankscrape::config::WithBaseUrl>,
    ) -> rankscrape::config::ScrapeConfigBuilder<rankscrape::config::WithBaseUrl>,
) -> ScrapeConfig {
    let builder = ScrapeConfig::builder()
        .output_dir(output_dir)
        .base_url(BASE_URL)
        .delays(DelayBounds::none())
        .restart_pause_secs(0)
        .cookie_wait_secs(0)
        .wait_timeout_secs(1)
        .parcel_search_url(PARCEL_SEARCH_URL);
    customize(builder).build().expect("test config is valid")
}

pub fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Absolute URL of the `k`-th record page of `item`
pub fn record_url(item: &str, k: usize) -> String {
    format!("{BASE_URL}/rankings/ranking/{}-{k}", slug(item))
}

#[derive(Debug, Clone)]
pub struct FakeItem {
    pub name: String,
    /// Record pages linked from the item page
    pub cards: usize,
}

impl FakeItem {
    pub fn new(name: &str, cards: usize) -> Self {
        Self {
            name: name.to_string(),
            cards,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeListing {
    pub name: String,
    pub path: String,
    pub location: String,
    pub items: Vec<FakeItem>,
}

impl FakeListing {
    pub fn new(name: &str, items: Vec<FakeItem>) -> Self {
        Self {
            name: name.to_string(),
            path: format!("c/{}/directory", slug(name)),
            location: name.to_string(),
            items,
        }
    }

    pub fn spec(&self) -> PartitionSpec {
        PartitionSpec::new(&self.name, &self.path)
    }
}

/// After `after_clicks` item clicks every listing shows only its first `keep` items
#[derive(Debug, Clone, Copy)]
pub struct Shrink {
    pub after_clicks: usize,
    pub keep: usize,
}

#[derive(Default)]
pub struct FakeSite {
    pub listings: Vec<FakeListing>,
    /// Record URLs whose open request fails
    pub failing_opens: HashSet<String>,
    /// Record URLs whose open request succeeds but never yields a context
    pub ghost_opens: HashSet<String>,
    /// Record URLs rendered without the record container
    pub broken_records: HashSet<String>,
    /// Record URLs whose tab refuses the first switch to it
    pub flaky_switches: HashSet<String>,
    /// Items whose page heading does not name them
    pub not_target: HashSet<String>,
    /// Items from whose page going back fails
    pub failing_back: HashSet<String>,
    pub shrink: Option<Shrink>,
    /// Cancel the token when the named item is clicked
    pub cancel_on_click: Option<(String, CancellationToken)>,
    /// Parcel number -> result rows `(pin, address)`
    pub parcels: HashMap<String, Vec<(String, Option<String>)>>,
    /// Listing pages show a consent banner until it is accepted
    pub cookie_banner: bool,
    /// Session serials (0-based, in open order) whose launch fails
    pub failing_launches: HashSet<usize>,
    /// Parcel numbers whose entry crashes the browser; the crashed
    /// session's shutdown then fails too
    pub crashing_parcels: HashSet<String>,

    pub sessions_opened: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub item_clicks: AtomicUsize,
    pub cookie_clicks: AtomicUsize,
    pub clicked: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new(listings: Vec<FakeListing>) -> Self {
        Self {
            listings,
            ..Self::default()
        }
    }

    pub fn specs(&self) -> Vec<PartitionSpec> {
        self.listings.iter().map(FakeListing::spec).collect()
    }

    pub fn clicked_items(&self) -> Vec<String> {
        self.clicked.lock().expect("clicked lock").clone()
    }

    fn item(&self, item_slug: &str) -> Option<&FakeItem> {
        self.listings
            .iter()
            .flat_map(|l| &l.items)
            .find(|i| slug(&i.name) == item_slug)
    }

    fn visible_items<'a>(&self, listing: &'a FakeListing) -> &'a [FakeItem] {
        match self.shrink {
            Some(s) if self.item_clicks.load(Ordering::SeqCst) >= s.after_clicks => {
                &listing.items[..s.keep.min(listing.items.len())]
            }
            _ => &listing.items,
        }
    }

    /// HTML served at `url`
    pub fn render(&self, url: &str) -> String {
        let Ok(parsed) = url::Url::parse(url) else {
            return page("");
        };
        let path = parsed.path().trim_matches('/');

        if parsed.host_str() == Some("county.test") {
            return self.render_parcels(path, &parsed);
        }
        if path == "rankings" {
            let links: String = self
                .listings
                .iter()
                .map(|l| {
                    let href = l.path.trim_end_matches("/directory");
                    format!(r#"<li><a href="/{href}/">{}</a></li>"#, l.name)
                })
                .collect();
            return page(&format!("<h4>England</h4><ul>{links}</ul>"));
        }
        if let Some(listing) = self.listings.iter().find(|l| l.path == path) {
            let items: String = self
                .visible_items(listing)
                .iter()
                .map(|i| {
                    format!(
                        r#"<article><a href="/firm/{}"><h4>{}</h4></a></article>"#,
                        slug(&i.name),
                        i.name
                    )
                })
                .collect();
            let banner = if self.cookie_banner && self.cookie_clicks.load(Ordering::SeqCst) == 0 {
                r#"<div id="consent"><button>Reject</button><button>Accept All</button></div>"#
            } else {
                ""
            };
            return page(&format!(
                r#"{banner}<h1>{}</h1><div class="grid">{items}</div>"#,
                listing.location
            ));
        }
        if let Some(item_slug) = path.strip_prefix("firm/") {
            let Some(item) = self.item(item_slug) else {
                return page("<h1>Not found</h1>");
            };
            let heading = if self.not_target.contains(&item.name) {
                "Directory home".to_string()
            } else {
                format!("{} - Rankings", item.name)
            };
            let cards: String = (1..=item.cards)
                .map(|k| {
                    format!(
                        r#"<a href="/rankings/ranking/{}-{k}">Ranking {k}</a>"#,
                        slug(&item.name)
                    )
                })
                .collect();
            return page(&format!(
                r#"<h1>{heading}</h1><section class="p-0">{cards}</section>"#
            ));
        }
        if let Some(rest) = path.strip_prefix("rankings/ranking/") {
            let Some((item_slug, k)) = rest.rsplit_once('-') else {
                return page("<h1>Not found</h1>");
            };
            let Some(item) = self.item(item_slug) else {
                return page("<h1>Not found</h1>");
            };
            if self.broken_records.contains(url) {
                return page("<header><p>Temporarily unavailable</p></header>");
            }
            return page(&format!(
                r#"<header class="flex flex-col gap-4">
                     <h3 class="typography-heading-s"><a>Area {k}</a></h3>
                     <h1 class="typography-heading-l"><a>{}</a></h1>
                     <span class="md:typography-interface-l-bold">Tier {k}</span>
                   </header>"#,
                item.name
            ));
        }
        page("")
    }

    fn render_parcels(&self, path: &str, parsed: &url::Url) -> String {
        match path {
            "search" => page(&format!(
                r#"<form>
                     <input type="radio" name="PropertySearchType" value="parcel">
                     <input id="pt-search-editor-1" type="text">
                     <button id="pt-search-button" type="button" data-submit="{PARCEL_SEARCH_URL}/results?parcel=">Search</button>
                   </form>"#
            )),
            "search/results" => {
                let parcel = parsed
                    .query_pairs()
                    .find(|(k, _)| k == "parcel")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default();
                let rows: String = self
                    .parcels
                    .get(&parcel)
                    .map(|rows| rows.iter().map(|(pin, addr)| parcel_row(pin, addr.as_deref())).collect())
                    .unwrap_or_default();
                page(&format!(
                    r#"<table id="gridResults"><tbody>{rows}</tbody></table>"#
                ))
            }
            _ => page(""),
        }
    }
}

fn page(body: &str) -> String {
    format!("<!DOCTYPE html><html><head><title>t</title></head><body>{body}</body></html>")
}

fn parcel_row(pin: &str, address: Option<&str>) -> String {
    let address = address
        .map(|a| format!(r#"<span class="pt-sr-address">{a}</span>"#))
        .unwrap_or_default();
    format!(
        r#"<tr>
             <td aria-describedby="gridResults_PIN">{pin}</td>
             <td aria-describedby="gridResults_Description"><span class="pt-sr-name">OWNER {pin}</span>{address}</td>
             <td aria-describedby="gridResults_Account">A-{pin}</td>
             <td aria-describedby="gridResults_ParcelNumberFormatted">P-{pin}</td>
             <td aria-describedby="gridResults_tyYEAR">2024</td>
             <td aria-describedby="gridResults_tyYEAR_BILLING">2023</td>
             <td aria-describedby="gridResults_TotalTaxDisplay">$100.00</td>
             <td aria-describedby="gridResults_BalanceDueDisplay">$0.00</td>
           </tr>"#
    )
}

/// What a locator matched, copied out of the parsed document
#[derive(Debug, Clone)]
struct Found {
    text: String,
    attrs: HashMap<String, String>,
    /// `href` of the element or its nearest linking ancestor
    link: Option<String>,
}

fn query(markup: &str, locator: &Locator) -> ScrapeResult<Vec<Found>> {
    let selector = locator.selector()?;
    let document = scraper::Html::parse_document(markup);
    Ok(document
        .select(&selector)
        .map(|el| {
            let link = el.value().attr("href").map(str::to_string).or_else(|| {
                el.ancestors()
                    .filter_map(scraper::ElementRef::wrap)
                    .find_map(|a| a.value().attr("href").map(str::to_string))
            });
            Found {
                text: el.text().collect::<String>(),
                attrs: el
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                link,
            }
        })
        .collect())
}

struct Tab {
    id: ContextId,
    history: Vec<String>,
}

pub struct FakeSession {
    site: Arc<FakeSite>,
    serial: usize,
    tabs: Vec<Tab>,
    current: ContextId,
    next_tab: usize,
    typed: String,
    closed: bool,
    crashed: bool,
    refused: HashSet<ContextId>,
}

impl FakeSession {
    fn new(site: Arc<FakeSite>, serial: usize) -> Self {
        let id = ContextId::new(format!("s{serial}-tab-0"));
        Self {
            site,
            serial,
            tabs: vec![Tab {
                id: id.clone(),
                history: vec!["about:blank".to_string()],
            }],
            current: id,
            next_tab: 1,
            typed: String::new(),
            closed: false,
            crashed: false,
            refused: HashSet::new(),
        }
    }

    fn live(&self) -> ScrapeResult<()> {
        if self.closed {
            Err(ScrapeError::Browser("session is shut down".into()))
        } else {
            Ok(())
        }
    }

    fn tab(&self) -> ScrapeResult<&Tab> {
        self.tabs
            .iter()
            .find(|t| t.id == self.current)
            .ok_or_else(|| ScrapeError::Browser(format!("context {} is closed", self.current)))
    }

    fn tab_mut(&mut self) -> ScrapeResult<&mut Tab> {
        let current = self.current.clone();
        self.tabs
            .iter_mut()
            .find(|t| t.id == current)
            .ok_or_else(|| ScrapeError::Browser(format!("context {current} is closed")))
    }

    fn url(&self) -> ScrapeResult<String> {
        Ok(self.tab()?.history.last().cloned().unwrap_or_default())
    }

    fn absolute(&self, href: &str) -> ScrapeResult<String> {
        let base = self.url()?;
        url::Url::parse(&base)
            .or_else(|_| url::Url::parse(BASE_URL))
            .and_then(|b| b.join(href))
            .map(|u| u.to_string())
            .map_err(|e| ScrapeError::Browser(format!("cannot resolve '{href}': {e}")))
    }

    fn resolve(&self, element: &ElementRef) -> ScrapeResult<Found> {
        self.live()?;
        if element.context != self.current {
            return Err(element_stale(element, "context is not active"));
        }
        let markup = self.site.render(&self.url()?);
        query(&markup, &element.locator)?
            .into_iter()
            .nth(element.index)
            .ok_or_else(|| element_stale(element, "index out of range"))
    }

    fn item_on_page(&self) -> Option<String> {
        let url = self.url().ok()?;
        let parsed = url::Url::parse(&url).ok()?;
        let item_slug = parsed.path().trim_matches('/').strip_prefix("firm/")?.to_string();
        self.site.item(&item_slug).map(|i| i.name.clone())
    }
}

fn element_stale(element: &ElementRef, why: &str) -> ScrapeError {
    ScrapeError::StaleReference(format!(
        "{}[{}] in {}: {why}",
        element.locator, element.index, element.context
    ))
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> ScrapeResult<()> {
        self.live()?;
        self.tab_mut()?.history.push(url.to_string());
        Ok(())
    }

    async fn go_back(&mut self) -> ScrapeResult<()> {
        self.live()?;
        if let Some(item) = self.item_on_page()
            && self.site.failing_back.contains(&item)
        {
            return Err(ScrapeError::Browser("history navigation failed".into()));
        }
        let tab = self.tab_mut()?;
        if tab.history.len() < 2 {
            return Err(ScrapeError::Browser("no previous page".into()));
        }
        tab.history.pop();
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> ScrapeResult<ElementRef> {
        self.live()?;
        let markup = self.site.render(&self.url()?);
        if query(&markup, locator)?.is_empty() {
            return Err(ScrapeError::timeout(format!("waiting for {locator}"), timeout));
        }
        Ok(ElementRef::new(self.current.clone(), locator.clone(), 0))
    }

    async fn find_all(&mut self, locator: &Locator) -> ScrapeResult<Vec<ElementRef>> {
        self.live()?;
        let markup = self.site.render(&self.url()?);
        let count = query(&markup, locator)?.len();
        Ok((0..count)
            .map(|i| ElementRef::new(self.current.clone(), locator.clone(), i))
            .collect())
    }

    async fn text(&mut self, element: &ElementRef) -> ScrapeResult<String> {
        Ok(self.resolve(element)?.text)
    }

    async fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> ScrapeResult<Option<String>> {
        Ok(self.resolve(element)?.attrs.get(name).cloned())
    }

    async fn click(&mut self, element: &ElementRef) -> ScrapeResult<()> {
        let found = self.resolve(element)?;
        if let Some(submit) = found.attrs.get("data-submit") {
            let target = format!("{submit}{}", self.typed.trim());
            self.typed.clear();
            return self.navigate(&target).await;
        }
        let Some(href) = found.link else {
            if found.text.trim() == "Accept All" {
                self.site.cookie_clicks.fetch_add(1, Ordering::SeqCst);
            }
            return Ok(());
        };
        let target = self.absolute(&href)?;
        if target.contains("/firm/") {
            let name = found.text.trim().to_string();
            self.site.item_clicks.fetch_add(1, Ordering::SeqCst);
            self.site
                .clicked
                .lock()
                .expect("clicked lock")
                .push(name.clone());
            if let Some((trigger, token)) = &self.site.cancel_on_click
                && *trigger == name
            {
                token.cancel();
            }
        }
        self.navigate(&target).await
    }

    async fn type_text(&mut self, element: &ElementRef, text: &str) -> ScrapeResult<()> {
        self.resolve(element)?;
        if self.site.crashing_parcels.contains(text) {
            self.crashed = true;
            return Err(ScrapeError::Browser(format!("renderer crashed on {text}")));
        }
        self.typed.push_str(text);
        Ok(())
    }

    async fn open_in_new_context(&mut self, element: &ElementRef) -> ScrapeResult<ContextId> {
        let found = self.resolve(element)?;
        let href = found
            .link
            .ok_or_else(|| ScrapeError::Browser(format!("{} has no href", element.locator)))?;
        let target = self.absolute(&href)?;
        if self.site.failing_opens.contains(&target) {
            return Err(ScrapeError::Browser(format!("target crashed opening {target}")));
        }
        let id = ContextId::new(format!("s{}-tab-{}", self.serial, self.next_tab));
        self.next_tab += 1;
        if !self.site.ghost_opens.contains(&target) {
            self.tabs.push(Tab {
                id: id.clone(),
                history: vec![target],
            });
        }
        Ok(id)
    }

    async fn contexts(&mut self) -> ScrapeResult<Vec<ContextId>> {
        self.live()?;
        Ok(self.tabs.iter().map(|t| t.id.clone()).collect())
    }

    fn current_context(&self) -> ContextId {
        self.current.clone()
    }

    async fn switch_to(&mut self, context: &ContextId) -> ScrapeResult<()> {
        self.live()?;
        let Some(tab) = self.tabs.iter().find(|t| &t.id == context) else {
            return Err(ScrapeError::Browser(format!("no such context {context}")));
        };
        let flaky = tab
            .history
            .last()
            .is_some_and(|url| self.site.flaky_switches.contains(url));
        if flaky && self.refused.insert(context.clone()) {
            return Err(ScrapeError::Browser(format!("context {context} not responding")));
        }
        self.current = context.clone();
        Ok(())
    }

    async fn close_current_context(&mut self) -> ScrapeResult<()> {
        self.live()?;
        let current = self.current.clone();
        self.tabs.retain(|t| t.id != current);
        if let Some(first) = self.tabs.first() {
            self.current = first.id.clone();
        }
        Ok(())
    }

    async fn current_url(&mut self) -> ScrapeResult<String> {
        self.live()?;
        self.url()
    }

    async fn rendered_markup(&mut self) -> ScrapeResult<String> {
        self.live()?;
        Ok(self.site.render(&self.url()?))
    }

    async fn shutdown(&mut self) -> ScrapeResult<()> {
        if !self.closed {
            self.closed = true;
            self.site.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        if self.crashed {
            return Err(ScrapeError::Browser("target already gone".into()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeFactory {
    pub site: Arc<FakeSite>,
}

impl FakeFactory {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn open(&self) -> ScrapeResult<FakeSession> {
        let serial = self.site.sessions_opened.fetch_add(1, Ordering::SeqCst);
        if self.site.failing_launches.contains(&serial) {
            return Err(ScrapeError::CriticalUnhandled(format!(
                "browser launch {serial} crashed"
            )));
        }
        Ok(FakeSession::new(Arc::clone(&self.site), serial))
    }
}

pub fn rankings_sink(config: &ScrapeConfig) -> CsvSink {
    CsvSink::new(
        config.output_dir().clone(),
        config.output_suffix(),
        rankscrape::extractor::RecordSchema::rankings(),
    )
}

/// Every line of a partition's audit log
pub fn audit_lines(sink: &CsvSink, partition: &str) -> Vec<AuditLine> {
    AuditLog::read_lines(&sink.paths(partition).audit).expect("audit log readable")
}
