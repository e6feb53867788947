//! Favicon resolution: candidate-URL construction, a sequential fallback
//! state machine, and a shared outcome cache.
//!
//! The resolver is pure string construction; it performs no I/O. The loader
//! walks the candidate list one source at a time, driven by load/error events
//! from whatever surface is attempting the fetch, and degrades to an inline
//! placeholder when every remote candidate fails.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use url::Url;

pub const DEFAULT_ICON_SIZE: u32 = 32;

/// Substituted when the input does not parse as an absolute URL, so a
/// candidate list is always produced.
const PLACEHOLDER_DOMAIN: &str = "example.com";

/// Inline SVG rendered when every remote candidate fails. Needs no network
/// fetch and cannot itself fail to load.
pub const LOCAL_FALLBACK_ICON: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 16 16'%3E%3Ccircle cx='8' cy='8' r='7' fill='%23e2e8f0'/%3E%3Cpath d='M1 8h14M8 1a11 11 0 0 1 0 14M8 1a11 11 0 0 0 0 14' stroke='%2394a3b8' fill='none'/%3E%3C/svg%3E";

fn host_of(website_url: &str) -> String {
    Url::parse(website_url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| PLACEHOLDER_DOMAIN.to_string())
}

/// URL of the favicon-by-domain service for `website_url` at `size` pixels.
/// Deterministic for identical input.
pub fn google_favicon_url(website_url: &str, size: u32) -> String {
    format!(
        "https://www.google.com/s2/favicons?domain={}&sz={}",
        host_of(website_url),
        size
    )
}

/// Human-displayable domain: protocol stripped, leading `www.` stripped.
/// Fails soft: input that does not parse comes back unchanged.
pub fn domain_from_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

/// Ordered candidate sources for one `(url, size)` input: the primary
/// favicon-service URL, fallbacks in declaration order, and the local
/// placeholder always last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct FaviconCandidates {
    pub primary: String,
    pub fallbacks: Vec<String>,
    pub local_fallback: String,
}

impl FaviconCandidates {
    pub fn resolve(website_url: &str, size: u32) -> Self {
        let host = host_of(website_url);
        Self {
            primary: google_favicon_url(website_url, size),
            fallbacks: vec![
                format!("https://icons.duckduckgo.com/ip3/{host}.ico"),
                format!("https://{host}/favicon.ico"),
            ],
            local_fallback: LOCAL_FALLBACK_ICON.to_string(),
        }
    }

    /// Number of candidates that require a network fetch. The local
    /// placeholder sits at this index.
    pub fn remote_len(&self) -> usize {
        1 + self.fallbacks.len()
    }

    /// Candidate at `index` in attempt order; `remote_len()` and anything
    /// past it yield the local placeholder.
    pub fn get(&self, index: usize) -> &str {
        match index {
            0 => &self.primary,
            i if i <= self.fallbacks.len() => &self.fallbacks[i - 1],
            _ => &self.local_fallback,
        }
    }
}

/// Last known resolution for a website URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FaviconOutcome {
    Resolved { source: String },
    Failed,
}

/// Shared, URL-keyed map of resolution outcomes. Writes from independent
/// loaders never collide because each loader writes only its own URL's key.
/// Entries are overwritten by later attempts and live for the cache's
/// lifetime; cardinality is bounded by the distinct websites rendered.
#[derive(Debug, Default)]
pub struct FaviconOutcomeCache {
    entries: DashMap<String, FaviconOutcome>,
}

impl FaviconOutcomeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, url: &str, source: &str) {
        self.entries.insert(
            url.to_string(),
            FaviconOutcome::Resolved {
                source: source.to_string(),
            },
        );
    }

    pub fn record_failure(&self, url: &str) {
        self.entries.insert(url.to_string(), FaviconOutcome::Failed);
    }

    pub fn lookup(&self, url: &str) -> Option<FaviconOutcome> {
        self.entries.get(url).map(|entry| entry.clone())
    }
}

/// Where the loader currently is in its fallback sequence.
///
/// `Settled` and `Failed` are terminal until the input changes; `Failed` is
/// visually identical to showing the placeholder but recorded distinctly so
/// the cache holds an explicit failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Trying(usize),
    Settled(usize),
    Failed,
}

/// A load/error signal from the surface attempting the current candidate,
/// tagged with the generation that was current when the attempt started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconEvent {
    Loaded { generation: u64 },
    Errored { generation: u64 },
}

impl IconEvent {
    fn generation(&self) -> u64 {
        match *self {
            IconEvent::Loaded { generation } | IconEvent::Errored { generation } => generation,
        }
    }
}

/// Sequential fallback machine for one icon slot.
///
/// One outstanding attempt at a time; the next candidate is only tried after
/// the previous one's error event. Changing the input rebuilds the candidate
/// list, resets the cursor, and bumps the generation so events from
/// superseded attempts are discarded.
pub struct FaviconLoader {
    url: String,
    size: u32,
    candidates: FaviconCandidates,
    phase: LoadPhase,
    generation: u64,
    cache: Arc<FaviconOutcomeCache>,
}

impl FaviconLoader {
    pub fn new(cache: Arc<FaviconOutcomeCache>, url: impl Into<String>, size: u32) -> Self {
        let url = url.into();
        let candidates = FaviconCandidates::resolve(&url, size);
        Self {
            url,
            size,
            candidates,
            phase: LoadPhase::Trying(0),
            generation: 0,
            cache,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn candidates(&self) -> &FaviconCandidates {
        &self.candidates
    }

    /// Replace the input. A no-op when `(url, size)` is unchanged; otherwise
    /// the fallback sequence restarts from the primary candidate and any
    /// in-flight attempt's event becomes stale.
    pub fn set_input(&mut self, url: impl Into<String>, size: u32) {
        let url = url.into();
        if url == self.url && size == self.size {
            return;
        }
        self.url = url;
        self.size = size;
        self.candidates = FaviconCandidates::resolve(&self.url, self.size);
        self.phase = LoadPhase::Trying(0);
        self.generation += 1;
    }

    /// Source currently being rendered or attempted.
    pub fn current_source(&self) -> &str {
        match self.phase {
            LoadPhase::Trying(index) | LoadPhase::Settled(index) => self.candidates.get(index),
            LoadPhase::Failed => &self.candidates.local_fallback,
        }
    }

    /// True once every remote candidate has failed for the current input.
    pub fn is_failed(&self) -> bool {
        self.phase == LoadPhase::Failed
    }

    /// True when no further attempt will be issued for the current input.
    pub fn is_settled(&self) -> bool {
        match self.phase {
            LoadPhase::Settled(_) | LoadPhase::Failed => true,
            LoadPhase::Trying(index) => index >= self.candidates.remote_len(),
        }
    }

    pub fn handle_event(&mut self, event: IconEvent) {
        if event.generation() != self.generation {
            // Stale attempt from a superseded input.
            return;
        }
        let LoadPhase::Trying(index) = self.phase else {
            return;
        };
        let remote = self.candidates.remote_len();
        if index >= remote {
            // The local placeholder never transitions further.
            return;
        }
        match event {
            IconEvent::Loaded { .. } => {
                self.cache.record_success(&self.url, self.candidates.get(index));
                self.phase = LoadPhase::Settled(index);
            }
            IconEvent::Errored { .. } => {
                if index + 1 < remote {
                    self.phase = LoadPhase::Trying(index + 1);
                } else {
                    self.cache.record_failure(&self.url);
                    self.phase = LoadPhase::Failed;
                }
            }
        }
    }

    /// Walk the fallback sequence by calling `attempt` on each candidate in
    /// turn until one loads or all remote candidates are exhausted. The
    /// caller reads `current_source()`/`is_failed()` afterwards.
    pub async fn drive<F, Fut>(&mut self, mut attempt: F)
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = bool>,
    {
        while let LoadPhase::Trying(index) = self.phase {
            if index >= self.candidates.remote_len() {
                break;
            }
            let generation = self.generation;
            let source = self.current_source().to_string();
            let event = if attempt(source).await {
                IconEvent::Loaded { generation }
            } else {
                IconEvent::Errored { generation }
            };
            self.handle_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(url: &str) -> FaviconLoader {
        FaviconLoader::new(Arc::new(FaviconOutcomeCache::new()), url, DEFAULT_ICON_SIZE)
    }

    #[test]
    fn candidate_list_ends_with_local_placeholder() {
        let candidates = FaviconCandidates::resolve("https://foo.com", 32);
        let remote = candidates.remote_len();
        assert!(remote >= 1);
        assert_eq!(candidates.get(remote), LOCAL_FALLBACK_ICON);
        // Anything past the end is still the placeholder.
        assert_eq!(candidates.get(remote + 5), LOCAL_FALLBACK_ICON);
    }

    #[test]
    fn malformed_input_falls_back_to_placeholder_domain() {
        for input in ["not a url", "", "://nope"] {
            let candidates = FaviconCandidates::resolve(input, 32);
            assert!(candidates.primary.contains("example.com"), "input: {input:?}");
            assert_eq!(candidates.get(candidates.remote_len()), LOCAL_FALLBACK_ICON);
        }
    }

    #[test]
    fn resolver_is_deterministic() {
        let a = FaviconCandidates::resolve("https://foo.com/deep/path", 48);
        let b = FaviconCandidates::resolve("https://foo.com/deep/path", 48);
        assert_eq!(a, b);
    }

    #[test]
    fn google_url_embeds_host_and_size() {
        assert_eq!(
            google_favicon_url("https://example.org", 64),
            "https://www.google.com/s2/favicons?domain=example.org&sz=64"
        );
    }

    #[test]
    fn domain_helper_strips_protocol_and_www() {
        assert_eq!(domain_from_url("https://www.foo.com/page"), "foo.com");
        assert_eq!(domain_from_url("https://foo.com"), "foo.com");
        assert_eq!(domain_from_url("not-a-url"), "not-a-url");
        assert_eq!(domain_from_url(""), "");
    }

    #[test]
    fn success_on_last_remote_candidate_is_recorded() {
        let cache = Arc::new(FaviconOutcomeCache::new());
        let mut loader =
            FaviconLoader::new(cache.clone(), "https://foo.com", DEFAULT_ICON_SIZE);
        let remote = loader.candidates().remote_len();
        let last = loader.candidates().get(remote - 1).to_string();

        for _ in 0..remote - 1 {
            loader.handle_event(IconEvent::Errored { generation: 0 });
        }
        loader.handle_event(IconEvent::Loaded { generation: 0 });

        assert_eq!(loader.current_source(), last);
        assert!(!loader.is_failed());
        assert_eq!(
            cache.lookup("https://foo.com"),
            Some(FaviconOutcome::Resolved { source: last })
        );
    }

    #[test]
    fn exhaustion_shows_placeholder_and_records_failure() {
        let cache = Arc::new(FaviconOutcomeCache::new());
        let mut loader =
            FaviconLoader::new(cache.clone(), "https://foo.com", DEFAULT_ICON_SIZE);
        let remote = loader.candidates().remote_len();

        for _ in 0..remote {
            loader.handle_event(IconEvent::Errored { generation: 0 });
        }

        assert!(loader.is_failed());
        assert_eq!(loader.current_source(), LOCAL_FALLBACK_ICON);
        assert_eq!(cache.lookup("https://foo.com"), Some(FaviconOutcome::Failed));

        // The placeholder never fails: further events change nothing.
        loader.handle_event(IconEvent::Errored { generation: 0 });
        assert!(loader.is_failed());
        assert_eq!(loader.current_source(), LOCAL_FALLBACK_ICON);
    }

    #[test]
    fn success_locks_the_machine_until_input_changes() {
        let mut loader = loader("https://foo.com");
        loader.handle_event(IconEvent::Loaded { generation: 0 });
        let settled = loader.current_source().to_string();

        loader.handle_event(IconEvent::Errored { generation: 0 });
        assert_eq!(loader.current_source(), settled);
        assert!(loader.is_settled());
    }

    #[test]
    fn input_change_resets_cursor_and_ignores_stale_events() {
        let mut loader = loader("https://a.example");
        loader.handle_event(IconEvent::Errored { generation: 0 });
        assert_ne!(loader.current_source(), loader.candidates().primary);

        loader.set_input("https://b.example", DEFAULT_ICON_SIZE);
        let b_primary = loader.candidates().primary.clone();
        assert_eq!(loader.current_source(), b_primary);
        assert_eq!(loader.generation(), 1);

        // A late failure from the superseded input must not advance B's cursor.
        loader.handle_event(IconEvent::Errored { generation: 0 });
        assert_eq!(loader.current_source(), b_primary);
    }

    #[test]
    fn unchanged_input_does_not_reset() {
        let mut loader = loader("https://foo.com");
        loader.handle_event(IconEvent::Errored { generation: 0 });
        let cursor = loader.current_source().to_string();

        loader.set_input("https://foo.com", DEFAULT_ICON_SIZE);
        assert_eq!(loader.generation(), 0);
        assert_eq!(loader.current_source(), cursor);
    }

    #[tokio::test]
    async fn drive_never_attempts_past_the_remote_candidates() {
        let mut loader = loader("https://foo.com");
        let remote = loader.candidates().remote_len();

        let mut attempts = 0;
        loader
            .drive(|_| {
                attempts += 1;
                async { false }
            })
            .await;

        assert_eq!(attempts, remote);
        assert!(loader.is_failed());
        assert_eq!(loader.current_source(), LOCAL_FALLBACK_ICON);
    }

    #[tokio::test]
    async fn drive_stops_on_first_success() {
        let cache = Arc::new(FaviconOutcomeCache::new());
        let mut loader =
            FaviconLoader::new(cache.clone(), "https://foo.com", DEFAULT_ICON_SIZE);
        let second = loader.candidates().get(1).to_string();

        let mut attempts = 0;
        loader
            .drive(|_| {
                attempts += 1;
                let succeed = attempts == 2;
                async move { succeed }
            })
            .await;

        assert_eq!(attempts, 2);
        assert_eq!(loader.current_source(), second);
        assert_eq!(
            cache.lookup("https://foo.com"),
            Some(FaviconOutcome::Resolved { source: second })
        );
    }

    #[test]
    fn cache_entries_are_overwritten_by_later_attempts() {
        let cache = FaviconOutcomeCache::new();
        cache.record_failure("https://foo.com");
        cache.record_success("https://foo.com", "https://foo.com/favicon.ico");
        assert_eq!(
            cache.lookup("https://foo.com"),
            Some(FaviconOutcome::Resolved {
                source: "https://foo.com/favicon.ico".to_string()
            })
        );
        assert_eq!(cache.lookup("https://other.com"), None);
    }
}
