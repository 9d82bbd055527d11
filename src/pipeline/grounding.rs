//! Citation grounding for generated narratives.
//!
//! The report stage asks the model to cite opinions with `[ref:N]` markers
//! tied to a parallel references array. Models hallucinate and misindex, so
//! before anything is persisted the narrative is reconciled against the
//! run's ground-truth session ids: references pointing outside the valid set
//! are dropped, markers without a surviving reference are erased, and valid
//! markers are rewritten into stable citation links. Pure text transforms,
//! no external calls.

use crate::model::{Reference, Representative};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Maximum representative opinions kept per topic.
pub(crate) const MAX_REPRESENTATIVES: usize = 5;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[ref:(\d+)\]").unwrap())
}

/// Render the citation link a valid marker is rewritten into.
fn citation_link(session_id: &str) -> String {
    format!("[{session_id}](#session-{session_id})")
}

/// Validate claimed references and rewrite the narrative's markers.
///
/// Returns the rewritten narrative and the surviving references. Markers
/// whose `ref_id` has no surviving reference are removed outright, even when
/// numerically plausible; repeated markers for one `ref_id` all resolve to
/// the same link. Running the function on its own output is a no-op, since
/// rewritten text contains no `[ref:N]` markers.
pub fn ground_narrative(
    narrative: &str,
    references: &[Reference],
    valid_ids: &HashSet<String>,
) -> (String, Vec<Reference>) {
    let kept: Vec<Reference> = references
        .iter()
        .filter(|r| valid_ids.contains(&r.session_id))
        .cloned()
        .collect();

    let by_id: HashMap<u32, &str> = kept
        .iter()
        .map(|r| (r.ref_id, r.session_id.as_str()))
        .collect();

    let rewritten = marker_regex().replace_all(narrative, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(|id| by_id.get(&id))
            .map(|session_id| citation_link(session_id))
            .unwrap_or_default()
    });

    (rewritten.into_owned(), kept)
}

/// Drop representatives whose session is outside the valid set, capped at
/// [`MAX_REPRESENTATIVES`].
pub fn filter_representatives(
    representatives: Vec<Representative>,
    valid_ids: &HashSet<String>,
) -> Vec<Representative> {
    let mut kept: Vec<Representative> = representatives
        .into_iter()
        .filter(|r| valid_ids.contains(&r.session_id))
        .collect();
    kept.truncate(MAX_REPRESENTATIVES);
    kept
}
