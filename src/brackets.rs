use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{Html, Selector};

// Stats-site link shapes carrying a match id: dotabuff/datdota/opendota use
// /matches/<id>, stratz uses /match/<id>.
static MATCH_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/match(?:es)?/([0-9]+)/?$").expect("valid match-link pattern"));

static VOD_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/watch|youtu\.be/|twitch\.tv/videos/)")
        .expect("valid vod-link pattern")
});

static CLIENT: OnceCell<Client> = OnceCell::new();

fn page_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .user_agent("dota_rewind/0.1 (match backlog ranker)")
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build page client")
    })
}

/// Pull a match id out of a single statistics-site URL, if it has one of the
/// known shapes.
pub fn extract_match_id(url: &str) -> Option<u64> {
    let caps = MATCH_LINK.captures(url.trim())?;
    caps[1].parse().ok()
}

/// All match ids linked from a tournament bracket page.
pub fn extract_all_match_ids(url: &str) -> Result<BTreeSet<u64>> {
    let html = fetch_page(url)?;
    let ids = match_ids_from_html(&html);
    log::info!("extracted {} match ids from {url}", ids.len());
    Ok(ids)
}

/// Broadcast links keyed by match id, harvested from the same bracket page.
pub fn extract_vod_urls(url: &str) -> Result<HashMap<u64, String>> {
    let html = fetch_page(url)?;
    let vods = vod_urls_from_html(&html);
    log::info!("extracted {} vod links from {url}", vods.len());
    Ok(vods)
}

pub fn match_ids_from_html(html: &str) -> BTreeSet<u64> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("static selector");
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(extract_match_id)
        .collect()
}

/// Bracket popups list a game's stats link followed by its broadcast link,
/// so a VOD belongs to the nearest preceding match id in document order.
/// The first VOD wins when a match is linked more than once.
pub fn vod_urls_from_html(html: &str) -> HashMap<u64, String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("static selector");

    let mut vods = HashMap::new();
    let mut current: Option<u64> = None;
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Some(match_id) = extract_match_id(href) {
            current = Some(match_id);
            continue;
        }
        if VOD_LINK.is_match(href) {
            if let Some(match_id) = current {
                vods.entry(match_id).or_insert_with(|| href.to_string());
            }
        }
    }
    vods
}

fn fetch_page(url: &str) -> Result<String> {
    let client = page_client()?;
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("bracket page request failed: {url}"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading bracket page")?;
    if !status.is_success() {
        anyhow::bail!("http {status} for {url}");
    }
    Ok(body)
}
