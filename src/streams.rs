use yenitv_api::Source;

pub const BEST_PRIORITY: u8 = 1;
pub const DEFAULT_PRIORITY: u8 = 5;
pub const WORST_PRIORITY: u8 = 10;
const PREFERRED_MARKER: &str = "ex";
const PREFERRED_QUALITY: &str = "SD 600kbps";
/// Lower-quality provider, hidden whenever anything else is on offer.
const FALLBACK_MARKER: &str = "tsn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrioritizedSource {
    pub id: String,
    pub raw_url: String,
    pub display_name: String,
    /// 1 is best, 10 is worst.
    pub priority: u8,
    /// Empty when unknown.
    pub quality_label: String,
}

impl PrioritizedSource {
    fn ranked(source: &Source) -> Self {
        let (priority, quality) = rank(&source.display_name);
        Self {
            id: source.id.clone(),
            raw_url: source.raw_url.clone(),
            display_name: source.display_name.clone(),
            priority,
            quality_label: quality.to_owned(),
        }
    }

    fn is_fallback_provider(&self) -> bool {
        is_fallback_provider(&self.display_name)
    }
}

/// Priority and quality label for a display name, matched as raw
/// case-insensitive substrings. The `"ex"` check runs first, so a name
/// containing both markers ranks as preferred.
pub fn rank(display_name: &str) -> (u8, &'static str) {
    let name = display_name.to_lowercase();
    if name.contains(PREFERRED_MARKER) {
        (BEST_PRIORITY, PREFERRED_QUALITY)
    } else if name.contains(FALLBACK_MARKER) {
        (WORST_PRIORITY, "")
    } else {
        (DEFAULT_PRIORITY, "")
    }
}

fn is_fallback_provider(display_name: &str) -> bool {
    display_name.to_lowercase().contains(FALLBACK_MARKER)
}

/// Rank every source and order best-first. Equal priorities keep their
/// original order.
pub fn prioritize_streams(sources: &[Source]) -> Vec<PrioritizedSource> {
    let mut ranked: Vec<PrioritizedSource> = sources.iter().map(PrioritizedSource::ranked).collect();
    ranked.sort_by_key(|s| s.priority);
    ranked
}

/// Drop fallback-provider sources when at least one other source exists.
/// Never empties a non-empty list.
pub fn filter_streams(prioritized: Vec<PrioritizedSource>) -> Vec<PrioritizedSource> {
    let others = prioritized.iter().filter(|s| !s.is_fallback_provider()).count();
    if others > 0 && others < prioritized.len() {
        prioritized.into_iter().filter(|s| !s.is_fallback_provider()).collect()
    } else {
        prioritized
    }
}

/// The sources worth offering for a match, best first.
pub fn select_sources(sources: &[Source]) -> Vec<PrioritizedSource> {
    filter_streams(prioritize_streams(sources))
}
