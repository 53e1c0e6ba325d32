use std::fs;
use std::path::PathBuf;

use dota_rewind::brackets::{extract_match_id, match_ids_from_html, vod_urls_from_html};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn bracket_page_yields_all_match_ids() {
    let html = read_fixture("bracket.html");
    let ids: Vec<u64> = match_ids_from_html(&html).into_iter().collect();
    assert_eq!(ids, vec![7400000001, 7400000002, 7400000003]);
}

#[test]
fn bracket_page_maps_vods_to_matches() {
    let html = read_fixture("bracket.html");
    let vods = vod_urls_from_html(&html);
    assert_eq!(vods.len(), 2);
    assert_eq!(vods[&7400000001], "https://www.youtube.com/watch?v=game1cast");
    assert_eq!(vods[&7400000002], "https://www.twitch.tv/videos/2214567890");
    assert!(!vods.contains_key(&7400000003));
}

#[test]
fn duplicate_stats_links_collapse_to_one_id() {
    let html = read_fixture("bracket.html");
    let ids = match_ids_from_html(&html);
    // Game 1 is linked on both datdota and dotabuff.
    assert_eq!(ids.iter().filter(|id| **id == 7400000001).count(), 1);
}

#[test]
fn single_url_extraction_matches_page_extraction() {
    let html = read_fixture("bracket.html");
    for id in match_ids_from_html(&html) {
        let url = format!("https://www.dotabuff.com/matches/{id}");
        assert_eq!(extract_match_id(&url), Some(id));
    }
}
