use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

use crate::{
    domain::{extracted_record::ExtractedRecord, site_profile::SiteProfile},
    error::SearchError,
};

/// Cards with less visible text than this are ads or spacers.
pub const MIN_CARD_TEXT_LEN: usize = 30;
const MIN_TITLE_LINE_LEN: usize = 3;
const BADGE_MARKERS: [&str; 6] = ["actively hiring", "₹", "$", "€", "£", "hiring multiple"];

#[derive(Debug, Default, PartialEq)]
pub struct Extraction {
    /// Card selector the page was read with, if any matched.
    pub matched_selector: Option<&'static str>,
    pub records: Vec<ExtractedRecord>,
    /// The site explicitly said the search has no results.
    pub no_results: bool,
}

/// Returns the first candidate, in order, for which `probe` yields a value,
/// together with its position.
pub fn first_match<C, T>(
    candidates: impl IntoIterator<Item = C>,
    mut probe: impl FnMut(&C) -> Option<T>,
) -> Option<(usize, T)> {
    candidates
        .into_iter()
        .enumerate()
        .find_map(|(i, candidate)| probe(&candidate).map(|value| (i, value)))
}

pub fn parse_selectors(raw: &[&'static str]) -> Result<Vec<(&'static str, Selector)>, SearchError> {
    raw.iter()
        .map(|&s| {
            Selector::parse(s)
                .map(|selector| (s, selector))
                .map_err(|e| SearchError::selector(s, e))
        })
        .collect()
}

pub fn extract_listings(page_source: &str, profile: &SiteProfile) -> Result<Extraction, SearchError> {
    let document = Html::parse_document(page_source);
    extract(&document, profile)
}

pub fn extract(document: &Html, profile: &SiteProfile) -> Result<Extraction, SearchError> {
    let card_selectors = parse_selectors(&profile.card_selectors)?;
    let fields = CompiledFields::new(profile)?;

    let committed = first_match(card_selectors.iter(), |(_, selector)| {
        let cards: Vec<ElementRef> = document.select(selector).collect();
        (!cards.is_empty()).then_some(cards)
    });

    let Some((index, cards)) = committed else {
        let page_text = document.root_element().text().collect::<String>();
        let no_results = profile
            .no_results_markers
            .iter()
            .any(|marker| page_text.contains(marker));
        log::warn!(
            "No {} cards matched any of {} selectors (no results marker: {})",
            profile.kind,
            card_selectors.len(),
            no_results
        );
        return Ok(Extraction {
            matched_selector: None,
            records: vec![],
            no_results,
        });
    };

    let selector = card_selectors[index].0;
    log::info!(
        "Found {} potential {} cards using selector: {}",
        cards.len(),
        profile.kind,
        selector
    );

    let records = cards
        .into_iter()
        .filter_map(|card| read_card(card, &fields, profile))
        .collect();

    Ok(Extraction {
        matched_selector: Some(selector),
        records,
        no_results: false,
    })
}

struct CompiledFields {
    title: Vec<(&'static str, Selector)>,
    organization: Vec<(&'static str, Selector)>,
    location: Vec<(&'static str, Selector)>,
    compensation: Vec<(&'static str, Selector)>,
    link: Vec<(&'static str, Selector)>,
}

impl CompiledFields {
    fn new(profile: &SiteProfile) -> Result<Self, SearchError> {
        Ok(CompiledFields {
            title: parse_selectors(&profile.fields.title)?,
            organization: parse_selectors(&profile.fields.organization)?,
            location: parse_selectors(&profile.fields.location)?,
            compensation: parse_selectors(&profile.fields.compensation)?,
            link: parse_selectors(&profile.fields.link)?,
        })
    }
}

fn read_card(card: ElementRef, fields: &CompiledFields, profile: &SiteProfile) -> Option<ExtractedRecord> {
    let lines = text_lines(card);
    let text_len: usize = lines.iter().map(|l| l.chars().count()).sum::<usize>()
        + lines.len().saturating_sub(1);
    if text_len < MIN_CARD_TEXT_LEN {
        log::debug!("Skipping {} card with {} chars of text", profile.kind, text_len);
        return None;
    }

    let title = field_text(card, &fields.title)
        .or_else(|| title_from_lines(&lines))
        .unwrap_or_else(|| profile.defaults.title.to_string());
    let organization = field_text(card, &fields.organization)
        .unwrap_or_else(|| profile.defaults.organization.to_string());
    let location = field_text(card, &fields.location)
        .unwrap_or_else(|| profile.defaults.location.to_string());
    let compensation = field_text(card, &fields.compensation);
    let link = first_match(fields.link.iter(), |(_, selector)| {
        card.select(selector)
            .find_map(|a| a.value().attr("href"))
            .filter(|href| !href.trim().is_empty())
    })
    .and_then(|(_, href)| profile.absolute_link(href));

    Some(ExtractedRecord {
        title,
        organization,
        location,
        compensation,
        link,
        raw_text: lines.iter().join(" | "),
    })
}

/// Visible text of an element, one entry per non-empty text node.
fn text_lines(element: ElementRef) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn field_text(card: ElementRef, selectors: &[(&'static str, Selector)]) -> Option<String> {
    first_match(selectors.iter(), |(_, selector)| {
        card.select(selector)
            .next()
            .map(|el| text_lines(el).join(" "))
            .filter(|text| !text.is_empty())
    })
    .map(|(_, text)| text)
}

/// Picks the first line that looks like a heading rather than a badge.
pub fn title_from_lines(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .find(|line| {
            let lowered = line.to_lowercase();
            line.chars().count() > MIN_TITLE_LINE_LEN
                && !BADGE_MARKERS.iter().any(|badge| lowered.contains(badge))
        })
        .map(str::to_string)
}
