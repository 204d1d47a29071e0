//! Pairs sidecars with media files by filename.
//!
//! A sidecar is named after its media file with `.json` appended, sometimes
//! with an extra suffix in between (`IMG_0001.JPG.supplemental-metadata.json`)
//! and sometimes with a duplicate counter moved to the very end
//! (`IMG_0001.JPG(1).json` and `IMG_0001.JPG.supplemental-metadata(1).json`
//! both describe `IMG_0001(1).JPG`). Matching is purely textual on
//! NFC-normalised, case-folded names.

use caseless::default_case_fold_str;
use std::cmp::Reverse;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Marker exiftool puts in the name of its in-progress output file
pub const TEMP_MARKER: &str = "_exiftool_tmp";

const SIDECAR_SUFFIX: &str = ".json";

/// macOS Finder metadata and AppleDouble resource forks
const JUNK_NAMES: &[&str] = &[".DS_Store"];
const APPLEDOUBLE_PREFIX: &str = "._";

/// How closely a media name corresponds to a sidecar name. Better ranks
/// order first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    /// Sidecar is exactly `<media>.json`, or the numbered-duplicate form of it
    Exact,
    /// Sidecar starts with the media name and carries an extra suffix
    Prefix,
    /// Media name appears somewhere else inside the sidecar name
    Contained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMatch {
    /// File name of the media file, as found on disk
    pub name: String,
    pub rank: MatchRank,
}

pub fn is_temp_file(name: &str) -> bool {
    name.contains(TEMP_MARKER)
}

pub fn is_sidecar_name(name: &str) -> bool {
    sidecar_base(name).is_some() || name.eq_ignore_ascii_case(SIDECAR_SUFFIX)
}

/// Whether a sibling file may be the media file of some sidecar. Hidden
/// media files count; Finder droppings do not.
pub fn is_media_candidate(name: &str) -> bool {
    !name.is_empty()
        && !JUNK_NAMES.contains(&name)
        && !name.starts_with(APPLEDOUBLE_PREFIX)
        && !is_sidecar_name(name)
        && !is_temp_file(name)
}

/// Name with the `.json` suffix removed. `None` when the name does not end
/// in `.json` or nothing is left once it is removed.
fn sidecar_base(name: &str) -> Option<&str> {
    let cut = name.len().checked_sub(SIDECAR_SUFFIX.len())?;
    let suffix = name.get(cut..)?;
    if !suffix.eq_ignore_ascii_case(SIDECAR_SUFFIX) || cut == 0 {
        return None;
    }
    Some(&name[..cut])
}

fn normalize(s: &str) -> String {
    default_case_fold_str(&s.nfc().collect::<String>())
}

/// Split a trailing duplicate counter: `img.jpg.extra(3)` -> (`img.jpg.extra`, `3`)
fn split_counter(base: &str) -> Option<(&str, &str)> {
    let inner = base.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let counter = &inner[open + 1..];
    if counter.is_empty() || !counter.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let rest = &inner[..open];
    if rest.is_empty() {
        return None;
    }
    Some((rest, counter))
}

/// Name a numbered duplicate was copied from: `img(3).jpg` -> `img.jpg`
fn undo_counter(candidate: &str, counter: &str) -> Option<String> {
    let marker = format!("({})", counter);
    let at = candidate.rfind(&marker)?;
    let (stem, tail) = (&candidate[..at], &candidate[at + marker.len()..]);
    if stem.is_empty() || !(tail.is_empty() || tail.starts_with('.')) {
        return None;
    }
    Some(format!("{}{}", stem, tail))
}

/// `name` is `prefix`, or `prefix` followed by a `.suffix` segment
fn starts_with_segment(name: &str, prefix: &str) -> bool {
    name == prefix
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

fn rank_candidate(base: &str, candidate: &str) -> Option<MatchRank> {
    if candidate == base {
        return Some(MatchRank::Exact);
    }

    if let Some((rest, counter)) = split_counter(base) {
        // A numbered sidecar only ever describes the numbered media file
        let original = undo_counter(candidate, counter)?;
        return starts_with_segment(rest, &original).then_some(MatchRank::Exact);
    }

    if base.starts_with(candidate) {
        Some(MatchRank::Prefix)
    } else if base.contains(candidate) {
        Some(MatchRank::Contained)
    } else {
        None
    }
}

/// Find the media file a sidecar describes among the names of its siblings.
///
/// The best rank wins; within a rank the longest media name wins, then the
/// lexicographically first one. Names that are not media candidates are
/// ignored.
pub fn find_media(sidecar_name: &str, candidates: &[String]) -> Option<MediaMatch> {
    let base = normalize(sidecar_base(sidecar_name)?);

    candidates
        .iter()
        .filter(|c| is_media_candidate(c))
        .filter_map(|c| {
            let normalized = normalize(c);
            let rank = rank_candidate(&base, &normalized)?;
            Some((rank, normalized.chars().count(), c))
        })
        .min_by(|a, b| (a.0, Reverse(a.1), a.2).cmp(&(b.0, Reverse(b.1), b.2)))
        .map(|(rank, _, name)| MediaMatch {
            name: name.clone(),
            rank,
        })
}

/// Match every sidecar of one directory, making sure no media file is
/// claimed twice. When several sidecars land on the same media file the best
/// rank keeps it, ties going to the lexicographically first sidecar; the
/// others are left unmatched.
///
/// The result is index-aligned with `sidecars`.
pub fn plan_directory(sidecars: &[String], candidates: &[String]) -> Vec<Option<MediaMatch>> {
    let mut matches: Vec<Option<MediaMatch>> = sidecars
        .iter()
        .map(|s| find_media(s, candidates))
        .collect();

    let keep: Vec<bool> = {
        let mut winners: HashMap<&str, usize> = HashMap::new();
        for (i, m) in matches.iter().enumerate() {
            let Some(m) = m else { continue };
            winners
                .entry(m.name.as_str())
                .and_modify(|best| {
                    let current = matches[*best].as_ref().map(|b| b.rank);
                    if (Some(m.rank), sidecars[i].as_str()) < (current, sidecars[*best].as_str()) {
                        *best = i;
                    }
                })
                .or_insert(i);
        }

        matches
            .iter()
            .enumerate()
            .map(|(i, m)| match m {
                Some(m) => winners.get(m.name.as_str()) == Some(&i),
                None => false,
            })
            .collect()
    };

    for (m, keep) in matches.iter_mut().zip(keep) {
        if !keep {
            *m = None;
        }
    }

    matches
}
