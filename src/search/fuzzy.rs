//! Order-insensitive fuzzy title matching.
//!
//! `token_set_ratio` compares the shared words of two titles against each
//! side's leftovers, so "Artist - Song (Official Audio)" still scores high
//! against "Song".

use std::collections::BTreeSet;

use crate::utils::tokenize;

/// Similarity in 0..=100 based on the longest common subsequence:
/// `2 * lcs / (len_a + len_b)`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    let lcs = previous[b.len()];

    (200.0 * lcs as f64 / total as f64).round()
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<String> = tokenize(a).into_iter().collect();
    let tokens_b: BTreeSet<String> = tokenize(b).into_iter().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let join = |tokens: Vec<&String>| {
        tokens
            .into_iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let intersection = join(tokens_a.intersection(&tokens_b).collect());
    let only_a = join(tokens_a.difference(&tokens_b).collect());
    let only_b = join(tokens_b.difference(&tokens_a).collect());

    let combined_a = format!("{} {}", intersection, only_a).trim().to_string();
    let combined_b = format!("{} {}", intersection, only_b).trim().to_string();

    let mut best = ratio(&combined_a, &combined_b);
    if !intersection.is_empty() {
        best = best
            .max(ratio(&intersection, &combined_a))
            .max(ratio(&intersection, &combined_b));
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_bounds() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(ratio("", "abc"), 0.0);
        assert_eq!(ratio("ab", "abcd"), 67.0);
    }

    #[test]
    fn token_set_ignores_order_and_punctuation() {
        assert_eq!(token_set_ratio("Rick Astley - Never Gonna", "never gonna, rick astley"), 100.0);
    }

    #[test]
    fn subset_titles_score_full() {
        assert_eq!(
            token_set_ratio("Never Gonna Give You Up", "Rick Astley - Never Gonna Give You Up (Official Audio)"),
            100.0
        );
    }

    #[test]
    fn unrelated_titles_score_low() {
        assert!(token_set_ratio("Bohemian Rhapsody", "Never Gonna Give You Up") < 50.0);
        assert_eq!(token_set_ratio("", "anything"), 0.0);
    }

    #[test]
    fn symmetric() {
        let a = "Shape of You";
        let b = "Ed Sheeran - Shape of You [Official Video]";
        assert_eq!(token_set_ratio(a, b), token_set_ratio(b, a));
    }
}
