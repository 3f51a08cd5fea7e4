use once_cell::sync::Lazy;
use regex::Regex;

/// Best-effort PII scrubbing for SQL text and store error messages before
/// they are logged.
///
/// Queries built by the query service never inline values, but raw queries
/// passed to `execute` and store error details (e.g. "Key (email)=(...)
/// already exists") can. Regex-based, so it is a safety net rather than a
/// guarantee.
static STRING_LITERAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'(?:[^']|'')*'").expect("valid literal regex"));

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid email regex")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    // +55 (11) 91234-5678, (555) 123-4567, 555-123-4567
    Regex::new(r"(?:\+\d{1,3}[-. ]?)?\(?\d{2,3}\)?[-. ]?\d{4,5}[-. ]?\d{4}")
        .expect("valid phone regex")
});

static KEY_DETAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\)=\([^)]*\)").expect("valid key detail regex"));

pub fn scrub(input: &str) -> String {
    let scrubbed = STRING_LITERAL_REGEX.replace_all(input, "'[LITERAL]'");
    let scrubbed = KEY_DETAIL_REGEX.replace_all(&scrubbed, ")=([VALUE])");
    let scrubbed = EMAIL_REGEX.replace_all(&scrubbed, "[EMAIL]");
    PHONE_REGEX.replace_all(&scrubbed, "[PHONE]").into_owned()
}
