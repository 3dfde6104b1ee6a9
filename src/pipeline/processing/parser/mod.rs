use once_cell::sync::Lazy;
use regex::Regex;

static NOTE_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*/\s*").expect("note delimiter pattern is valid"));
static REPEATED_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace pattern is valid"));

/// Split a composite notes cell into its ordered tokens.
///
/// Every label token (for example `"Bean:"`) is removed wherever it occurs,
/// the remainder is split on `/` with any surrounding whitespace, and each
/// token is trimmed with interior whitespace runs collapsed to one space.
///
/// The token count is not checked here: the normalizer zips tokens against the
/// configured attribute columns and reports any mismatch.
pub fn parse_notes<S: AsRef<str>>(raw_text: &str, labels: &[S]) -> Vec<String> {
    let mut stripped = raw_text.to_string();
    for label in labels {
        let label = label.as_ref();
        if !label.is_empty() {
            stripped = stripped.replace(label, "");
        }
    }

    NOTE_DELIMITER
        .split(&stripped)
        .map(|token| REPEATED_WHITESPACE.replace_all(token.trim(), " ").into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COFFEE_GURU_LABELS: [&str; 5] = ["Bean:", "Grinder:", "Grind:", "Flavor:", "Balance:"];

    #[test]
    fn test_parse_labeled_segments_in_order() {
        let tokens = parse_notes(
            "Bean: Ethiopia Guji / Grinder: Baratza Encore / Grind: 18 / Flavor: Very Fruity / Balance: Slightly Heavy",
            &COFFEE_GURU_LABELS,
        );
        assert_eq!(
            tokens,
            vec!["Ethiopia Guji", "Baratza Encore", "18", "Very Fruity", "Slightly Heavy"]
        );
    }

    #[test]
    fn test_parse_tolerates_unpadded_and_padded_delimiters() {
        let tokens = parse_notes("Flavor:Very Sweet/   Balance:  Balanced", &["Flavor:", "Balance:"]);
        assert_eq!(tokens, vec!["Very Sweet", "Balanced"]);
    }

    #[test]
    fn test_parse_collapses_interior_whitespace() {
        let tokens = parse_notes("Bean:  Kenya    AA  / Grind: 20", &["Bean:", "Grind:"]);
        assert_eq!(tokens, vec!["Kenya AA", "20"]);
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        let tokens = parse_notes("flavor: Very Sweet / Balance: Balanced", &["Flavor:", "Balance:"]);
        assert_eq!(tokens, vec!["flavor: Very Sweet", "Balanced"]);
    }

    #[test]
    fn test_labels_are_stripped_anywhere() {
        let tokens = parse_notes("Very Flavor:Sweet / Balanced", &["Flavor:"]);
        assert_eq!(tokens, vec!["Very Sweet", "Balanced"]);
    }

    #[test]
    fn test_extra_segments_are_returned_not_dropped() {
        let tokens = parse_notes(
            "Flavor: Very Sweet / Balance: Balanced / Extra note",
            &["Flavor:", "Balance:"],
        );
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2], "Extra note");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = "Bean: Colombia / Grind: 15";
        assert_eq!(parse_notes(raw, &["Bean:", "Grind:"]), parse_notes(raw, &["Bean:", "Grind:"]));
    }
}
