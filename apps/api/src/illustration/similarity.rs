use std::collections::HashSet;

/// Below this word-set overlap an existing illustration no longer matches its text.
const REGENERATE_THRESHOLD: f64 = 0.7;

/// Decides whether an illustration made for `old_text` should be regenerated
/// for `new_text`: true when the Jaccard similarity of their word sets is < 0.7.
pub fn should_regenerate(old_text: &str, new_text: &str) -> bool {
    word_set_similarity(old_text, new_text) < REGENERATE_THRESHOLD
}

/// Jaccard similarity of lowercase whitespace-separated word sets.
/// Two texts with no words at all are identical (1.0).
pub fn word_set_similarity(a: &str, b: &str) -> f64 {
    let words_a = word_set(a);
    let words_b = word_set(b);

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
