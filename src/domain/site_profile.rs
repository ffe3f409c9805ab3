use std::time::Duration;

use url::Url;

use super::{search_kind::SearchKind, search_request::SearchQuery};

const INDEED_BASE: &str = "https://in.indeed.com";
const INTERNSHALA_BASE: &str = "https://internshala.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// How long to let a page render and how hard to scroll it before reading.
/// Listings on both sites load lazily on scroll.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSettle {
    pub initial_wait: Duration,
    pub scroll_cycles: u32,
    pub scroll_step_px: i64,
    pub scroll_pause: Duration,
}

impl PageSettle {
    pub fn immediate() -> Self {
        PageSettle {
            initial_wait: Duration::ZERO,
            scroll_cycles: 0,
            scroll_step_px: 0,
            scroll_pause: Duration::ZERO,
        }
    }
}

/// Ordered candidate selectors per field. Earlier entries win.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelectors {
    pub title: Vec<&'static str>,
    pub organization: Vec<&'static str>,
    pub location: Vec<&'static str>,
    pub compensation: Vec<&'static str>,
    pub link: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefaults {
    pub title: &'static str,
    pub organization: &'static str,
    pub location: &'static str,
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub kind: SearchKind,
    pub base_url: &'static str,
    pub card_selectors: Vec<&'static str>,
    pub fields: FieldSelectors,
    pub defaults: FieldDefaults,
    pub no_results_markers: Vec<&'static str>,
    pub popup_close: Option<&'static str>,
    pub viewport: Viewport,
    pub settle: PageSettle,
    build_url: fn(&SearchQuery) -> String,
}

impl SiteProfile {
    pub fn for_kind(kind: SearchKind) -> Option<Self> {
        match kind {
            SearchKind::Jobs => Some(Self::indeed()),
            SearchKind::Internships => Some(Self::internshala()),
            SearchKind::Colleges => None,
        }
    }

    pub fn indeed() -> Self {
        SiteProfile {
            kind: SearchKind::Jobs,
            base_url: INDEED_BASE,
            card_selectors: vec![
                "#mosaic-provider-jobcards ul li",
                ".job_seen_beacon",
                ".jobsearch-ResultsList li",
                r#"[data-testid="job-result"]"#,
                ".cardOutline",
                "div.slider_container div.slider_item",
            ],
            fields: FieldSelectors {
                title: vec![
                    "h2",
                    ".jobTitle",
                    r#"[data-testid="job-title"]"#,
                    "h2 a span",
                    ".job-title",
                ],
                organization: vec![
                    r#"[data-testid="company-name"]"#,
                    ".companyName",
                    "span.company",
                ],
                location: vec![
                    r#"[data-testid="text-location"]"#,
                    ".companyLocation",
                    ".location",
                ],
                compensation: vec![
                    r#"[data-testid="attribute_snippet_testid"]"#,
                    ".salary-snippet-container",
                    ".estimated-salary",
                ],
                link: vec!["h2 a", "a.jcs-JobTitle"],
            },
            defaults: FieldDefaults {
                title: "Job Opening",
                organization: "Company",
                location: "Location not specified",
            },
            no_results_markers: vec!["did not match any jobs"],
            popup_close: None,
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            settle: PageSettle {
                initial_wait: Duration::from_millis(5000),
                scroll_cycles: 5,
                scroll_step_px: 500,
                scroll_pause: Duration::from_millis(1500),
            },
            build_url: indeed_url,
        }
    }

    pub fn internshala() -> Self {
        SiteProfile {
            kind: SearchKind::Internships,
            base_url: INTERNSHALA_BASE,
            card_selectors: vec![".individual_internship", ".internship_meta"],
            fields: FieldSelectors {
                title: vec![".profile", "h3"],
                organization: vec![".company_name"],
                location: vec![".location_link"],
                compensation: vec![".stipend"],
                link: vec!["a.job-title-href", "h3 a"],
            },
            defaults: FieldDefaults {
                title: "Internship Position",
                organization: "",
                location: "",
            },
            no_results_markers: vec!["No internships found"],
            popup_close: Some("#close_popup"),
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            settle: PageSettle {
                initial_wait: Duration::from_millis(3000),
                scroll_cycles: 3,
                scroll_step_px: 500,
                scroll_pause: Duration::from_millis(1000),
            },
            build_url: internshala_url,
        }
    }

    pub fn with_settle(mut self, settle: PageSettle) -> Self {
        self.settle = settle;
        self
    }

    pub fn target_url(&self, query: &SearchQuery) -> String {
        (self.build_url)(query)
    }

    /// Resolves a card link against the site root. Unparseable hrefs are dropped.
    pub fn absolute_link(&self, href: &str) -> Option<String> {
        let base = Url::parse(self.base_url).ok()?;
        base.join(href.trim()).ok().map(|url| url.to_string())
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn indeed_url(query: &SearchQuery) -> String {
    let role = collapse_whitespace(query.role());
    let city = collapse_whitespace(&query.city);
    let url = format!("{}/jobs", INDEED_BASE);

    match Url::parse_with_params(
        &url,
        &[
            ("q", role.as_str()),
            ("l", city.as_str()),
            ("fromage", "1"),
            ("radius", "25"),
        ],
    ) {
        Ok(url) => url.to_string(),
        Err(_) => url,
    }
}

fn internshala_slug(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace('/', "-")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("-")
}

fn internshala_url(query: &SearchQuery) -> String {
    format!(
        "{}/internships/{}-internship-in-{}/",
        INTERNSHALA_BASE,
        internshala_slug(query.role()),
        internshala_slug(&query.city)
    )
}
