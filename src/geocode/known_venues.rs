// src/geocode/known_venues.rs
//! Fixed coordinates for venues the public geocoder resolves poorly
//! (nightclubs registered under operator names, venues without a street number).
//!
//! Matching is case-insensitive on whole words: the key's word sequence must
//! appear contiguously in the venue name, so "Berghain / Panorama Bar" matches
//! "Berghain" but "Post Office" does not match "OST". Longer keys win.

use indexmap::IndexMap;

use super::Coordinates;

#[derive(Debug, Clone, Default)]
pub struct KnownVenues {
    // (key words, coordinates), longest key first
    entries: Vec<(Vec<String>, Coordinates)>,
}

fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}

impl KnownVenues {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Coordinates)>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(Vec<String>, Coordinates)> = pairs
            .into_iter()
            .map(|(k, c)| (words(k.as_ref()), c))
            .filter(|(w, _)| !w.is_empty())
            .collect();
        // stable: equal lengths keep configuration order
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    /// Build from a config table of `name = [lat, lon]`; invalid pairs are skipped.
    pub fn from_table(table: &IndexMap<String, [f64; 2]>) -> Self {
        Self::from_pairs(
            table
                .iter()
                .filter_map(|(k, [lat, lon])| Coordinates::new(*lat, *lon).map(|c| (k, c))),
        )
    }

    pub fn lookup(&self, venue: &str) -> Option<Coordinates> {
        let hay = words(venue);
        self.entries
            .iter()
            .find(|(key, _)| contains_run(&hay, key))
            .map(|(_, c)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Built-in seed of Berlin club coordinates.
    pub fn default_seed() -> Self {
        Self::from_table(&default_table())
    }
}

pub(crate) fn default_table() -> IndexMap<String, [f64; 2]> {
    [
        ("Berghain", [52.5108, 13.4429]),
        ("Panorama Bar", [52.5108, 13.4429]),
        ("Watergate", [52.5053, 13.4415]),
        ("Tresor", [52.5126, 13.4154]),
        ("About Blank", [52.5245, 13.4693]),
        ("Sisyphos", [52.5198, 13.4872]),
        ("RSO", [52.5074, 13.4536]),
        ("RSO.Berlin", [52.5074, 13.4536]),
        ("Salon zur Wilden Renate", [52.5001, 13.4652]),
        ("Wilde Renate", [52.5001, 13.4652]),
        ("Renate", [52.5001, 13.4652]),
        ("Kater Blau", [52.5123, 13.4250]),
        ("KitKatClub", [52.5025, 13.4100]),
        ("Griessmühle", [52.4756, 13.4394]),
        ("Club der Visionaere", [52.4967, 13.4427]),
        ("Else", [52.5251, 13.4124]),
        ("Golden Gate", [52.4992, 13.4393]),
        ("Ritter Butzke", [52.5030, 13.4190]),
        ("Birgit & Bier", [52.5145, 13.4210]),
        ("Fitzroy", [52.5287, 13.4149]),
        ("OST", [52.4969, 13.4643]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
