use crate::metadata::TrackMetadata;
use crate::search::fuzzy::token_set_ratio;
use crate::search::{RawCandidate, MAX_CANDIDATES};
use crate::utils::{contains_word, tokenize};

/// Terms that usually mean "a different version of the song".
pub const DISALLOWED_KEYWORDS: &[&str] = &[
    "live",
    "vivo",
    "concert",
    "remix",
    "karaoke",
    "instrumental",
    "cover",
    "speed",
    "sped",
    "slowed",
    "reverb",
    "nightcore",
];

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub title_weight: f64,
    pub exact_window_secs: f64,
    pub exact_bonus: f64,
    pub close_window_secs: f64,
    pub close_bonus: f64,
    pub loose_window_secs: f64,
    pub loose_bonus: f64,
    /// Candidates further off than this are never accepted.
    pub reject_after_secs: f64,
    pub keyword_penalty: f64,
    pub disallowed_keywords: Vec<String>,
    pub uploader_bonus: f64,
    /// A winner must score strictly above this.
    pub accept_threshold: f64,
    pub max_candidates: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            title_weight: 0.5,
            exact_window_secs: 2.0,
            exact_bonus: 40.0,
            close_window_secs: 5.0,
            close_bonus: 20.0,
            loose_window_secs: 15.0,
            loose_bonus: 10.0,
            reject_after_secs: 20.0,
            keyword_penalty: 50.0,
            disallowed_keywords: DISALLOWED_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            uploader_bonus: 10.0,
            accept_threshold: 60.0,
            max_candidates: MAX_CANDIDATES,
        }
    }
}

/// A search hit that survived scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub video_id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub duration_secs: f64,
    pub duration_delta: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    MissingId,
    UnknownDuration,
    DurationMismatch(f64),
}

#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScorerConfig,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScorerConfig::default())
    }
}

impl Scorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, track: &TrackMetadata, raw: &RawCandidate) -> Result<Candidate, Rejection> {
        let video_id = raw.video_id.as_deref().filter(|id| !id.is_empty()).ok_or(Rejection::MissingId)?;
        let duration = raw.duration_secs.filter(|d| *d > 0.0).ok_or(Rejection::UnknownDuration)?;

        let delta = (track.duration_secs() - duration).abs();
        if delta > self.config.reject_after_secs {
            return Err(Rejection::DurationMismatch(delta));
        }

        let mut score = token_set_ratio(&track.title, &raw.title) * self.config.title_weight;
        score += self.duration_bonus(delta);
        score -= self.keyword_penalty(&track.title, &raw.title);
        if let Some(uploader) = &raw.uploader {
            if self.uploader_matches(uploader, &track.artist) {
                score += self.config.uploader_bonus;
            }
        }

        Ok(Candidate {
            video_id: video_id.to_string(),
            title: raw.title.clone(),
            uploader: raw.uploader.clone(),
            duration_secs: duration,
            duration_delta: delta,
            score,
        })
    }

    fn duration_bonus(&self, delta: f64) -> f64 {
        let c = &self.config;
        if delta <= c.exact_window_secs {
            c.exact_bonus
        } else if delta <= c.close_window_secs {
            c.close_bonus
        } else if delta <= c.loose_window_secs {
            c.loose_bonus
        } else {
            0.0
        }
    }

    fn keyword_penalty(&self, source_title: &str, candidate_title: &str) -> f64 {
        let source = tokenize(source_title);
        let candidate = tokenize(candidate_title);
        let hits = self
            .config
            .disallowed_keywords
            .iter()
            .filter(|keyword| contains_word(&candidate, keyword) && !contains_word(&source, keyword))
            .count();
        hits as f64 * self.config.keyword_penalty
    }

    fn uploader_matches(&self, uploader: &str, artist: &str) -> bool {
        let tokens = tokenize(uploader);
        tokens.last().map(|t| t == "topic").unwrap_or(false) || token_set_ratio(uploader, artist) >= 90.0
    }

    /// Scores the first `max_candidates` results, dropping rejected ones.
    pub fn rank(&self, track: &TrackMetadata, results: &[RawCandidate]) -> Vec<Candidate> {
        results
            .iter()
            .take(self.config.max_candidates)
            .filter_map(|raw| match self.score(track, raw) {
                Ok(candidate) => {
                    log::info!(
                        "   Candidate: {} | Score: {:.1} | Dur: {:.0}s (Δ{:.0}s)",
                        candidate.title,
                        candidate.score,
                        candidate.duration_secs,
                        candidate.duration_delta
                    );
                    Some(candidate)
                }
                Err(reason) => {
                    log::info!("   Rejected: {} | {:?}", raw.title, reason);
                    None
                }
            })
            .collect()
    }

    /// Best candidate above the acceptance threshold. Ties keep the earlier result.
    pub fn select(&self, track: &TrackMetadata, results: &[RawCandidate]) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for candidate in self.rank(track, results) {
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        best.filter(|b| b.score > self.config.accept_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::sample_track;
    use crate::search::fakes::candidate;
    use proptest::prelude::*;

    const TITLE: &str = "Never Gonna Give You Up";

    #[test]
    fn zero_delta_is_never_penalized() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);
        let exact = scorer.score(&track, &candidate("a", TITLE, 200.0)).unwrap();
        assert_eq!(exact.duration_delta, 0.0);
        assert_eq!(exact.score, 50.0 + 40.0);
    }

    #[test]
    fn duration_tiers() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);
        let score = |secs| scorer.score(&track, &candidate("a", TITLE, secs)).unwrap().score;
        assert_eq!(score(202.0), 90.0);
        assert_eq!(score(204.5), 70.0);
        assert_eq!(score(212.0), 60.0);
        assert_eq!(score(219.0), 50.0);
    }

    #[test]
    fn over_threshold_delta_is_rejected_even_with_perfect_title() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);
        let result = scorer.score(&track, &candidate("a", TITLE, 221.0));
        assert!(matches!(result, Err(Rejection::DurationMismatch(_))));

        let results = vec![candidate("a", TITLE, 400.0), candidate("b", TITLE, 160.0)];
        assert!(scorer.select(&track, &results).is_none());
    }

    #[test]
    fn missing_id_or_duration_is_rejected() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);

        let mut no_id = candidate("a", TITLE, 200.0);
        no_id.video_id = None;
        assert_eq!(scorer.score(&track, &no_id), Err(Rejection::MissingId));

        let mut no_duration = candidate("a", TITLE, 200.0);
        no_duration.duration_secs = None;
        assert_eq!(scorer.score(&track, &no_duration), Err(Rejection::UnknownDuration));
    }

    #[test]
    fn disallowed_keyword_lowers_score() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);
        let clean = scorer.score(&track, &candidate("a", TITLE, 200.0)).unwrap();
        let live = scorer
            .score(&track, &candidate("b", &format!("{} (Live)", TITLE), 200.0))
            .unwrap();
        assert!(live.score < clean.score);
    }

    #[test]
    fn keyword_already_in_source_title_is_not_penalized() {
        let scorer = Scorer::default();
        let mut track = sample_track(200_000);
        track.title = "Song (Live at Wembley)".to_string();
        let live = scorer
            .score(&track, &candidate("a", "Song (Live at Wembley)", 200.0))
            .unwrap();
        assert_eq!(live.score, 90.0);
    }

    #[test]
    fn topic_channel_and_artist_uploader_get_bonus() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);

        let mut topic = candidate("a", TITLE, 200.0);
        topic.uploader = Some("Rick Astley - Topic".to_string());
        assert_eq!(scorer.score(&track, &topic).unwrap().score, 100.0);

        let mut official = candidate("b", TITLE, 200.0);
        official.uploader = Some("RickAstleyVEVO".to_string());
        assert_eq!(scorer.score(&track, &official).unwrap().score, 90.0);

        let mut artist = candidate("c", TITLE, 200.0);
        artist.uploader = Some("Rick Astley".to_string());
        assert_eq!(scorer.score(&track, &artist).unwrap().score, 100.0);
    }

    #[test]
    fn picks_closest_duration_among_synthetic_results() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);
        let results: Vec<RawCandidate> = [198.0, 205.0, 160.0, 400.0, 201.0]
            .iter()
            .enumerate()
            .map(|(i, secs)| candidate(&format!("id{}", i), TITLE, *secs))
            .collect();

        let best = scorer.select(&track, &results).unwrap();
        assert!(best.duration_secs == 201.0 || best.duration_secs == 198.0);
        // Equal scores keep the earlier result.
        assert_eq!(best.video_id, "id0");
    }

    #[test]
    fn only_first_five_results_are_considered() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);
        let mut results: Vec<RawCandidate> = (0..5)
            .map(|i| candidate(&format!("far{}", i), TITLE, 300.0))
            .collect();
        results.push(candidate("late", TITLE, 200.0));

        assert!(scorer.select(&track, &results).is_none());
    }

    #[test]
    fn threshold_is_strict() {
        let scorer = Scorer::default();
        let track = sample_track(200_000);
        // 50 title + 10 loose duration bonus == 60, not above the threshold.
        let results = vec![candidate("a", TITLE, 212.0)];
        assert!(scorer.select(&track, &results).is_none());
    }

    fn arb_candidate() -> impl Strategy<Value = RawCandidate> {
        (
            proptest::option::of("[a-zA-Z0-9]{11}"),
            "[a-zA-Z ()]{0,40}",
            proptest::option::of("[a-zA-Z -]{0,20}"),
            proptest::option::of(0.0f64..600.0),
        )
            .prop_map(|(video_id, title, uploader, duration_secs)| RawCandidate {
                video_id,
                title,
                uploader,
                duration_secs,
            })
    }

    proptest! {
        #[test]
        fn selection_is_deterministic(results in proptest::collection::vec(arb_candidate(), 0..8)) {
            let scorer = Scorer::default();
            let track = sample_track(200_000);
            prop_assert_eq!(scorer.select(&track, &results), scorer.select(&track, &results));
        }

        #[test]
        fn keyword_never_helps(title in "[a-zA-Z ]{1,30}", secs in 180.0f64..220.0) {
            let scorer = Scorer::default();
            let mut track = sample_track(200_000);
            track.title = title.clone();
            let plain = scorer.score(&track, &candidate("a", &title, secs));
            let karaoke = scorer.score(&track, &candidate("a", &format!("{} karaoke", title), secs));
            if let (Ok(plain), Ok(karaoke)) = (plain, karaoke) {
                if !tokenize(&title).iter().any(|t| t == "karaoke") {
                    prop_assert!(karaoke.score < plain.score);
                }
            }
        }
    }
}
