use crate::{ErrorCode, Ub515Error};

impl From<std::io::Error> for Ub515Error {
    fn from(err: std::io::Error) -> Self {
        Ub515Error::new(ErrorCode::InternalPanic, err.to_string())
    }
}

impl From<serde_json::Error> for Ub515Error {
    fn from(err: serde_json::Error) -> Self {
        Ub515Error::new(ErrorCode::SerializationFailed, err.to_string())
    }
}

impl From<serde_yaml::Error> for Ub515Error {
    fn from(err: serde_yaml::Error) -> Self {
        Ub515Error::new(ErrorCode::InvalidConfig, err.to_string())
    }
}

/// Closest option to `target` within an edit distance of 3, if any.
///
/// Used to attach "Did you mean ...?" hints to rejected identifiers.
pub fn find_closest_match<S: AsRef<str>>(target: &str, options: &[S]) -> Option<String> {
    let mut best_match: Option<&str> = None;
    let mut min_distance = usize::MAX;

    for option in options {
        let option = option.as_ref();
        let distance = levenshtein(target, option);
        if distance < min_distance && distance <= 3 {
            min_distance = distance;
            best_match = Some(option);
        }
    }

    best_match.map(|s| s.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut dp = vec![vec![0; b.len() + 1]; a.len() + 1];

    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in dp[0].iter_mut().enumerate() {
        *val = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            dp[i][j] = std::cmp::min(
                std::cmp::min(dp[i - 1][j] + 1, dp[i][j - 1] + 1),
                dp[i - 1][j - 1] + cost,
            );
        }
    }

    dp[a.len()][b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("book", "back"), 2);
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_find_closest_match() {
        let options = vec![
            "race_date".to_string(),
            "race_edition".to_string(),
            "race_location".to_string(),
        ];

        assert_eq!(
            find_closest_match("race_dte", &options),
            Some("race_date".to_string())
        );
        assert_eq!(
            find_closest_match("race_editon", &options),
            Some("race_edition".to_string())
        );
        assert_eq!(find_closest_match("completely_different", &options), None);
    }

    #[test]
    fn test_io_error_mapping() {
        let io_err = std::io::Error::other("disk gone");
        let err: Ub515Error = io_err.into();
        assert_eq!(err.code, ErrorCode::InternalPanic);
        assert!(err.message.contains("disk gone"));
    }
}
