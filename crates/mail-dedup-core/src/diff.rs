//! Zero-context, line-level unified diff.
//!
//! Output follows the classic `diff -U0` layout: a `---`/`+++` header pair,
//! then one `@@` hunk per run of changed lines, removed lines before added
//! ones. Identical inputs produce an empty string.

use similar::TextDiff;

fn header_label(file: &str, date: &str) -> String {
    if date.is_empty() {
        file.to_string()
    } else {
        format!("{file}\t{date}")
    }
}

/// Zero-context unified diff of two newline-terminated line sequences.
///
/// Uses Myers' algorithm, so memory stays linear in the input size.
pub fn unified_diff(
    a: &[String],
    b: &[String],
    from_file: &str,
    to_file: &str,
    from_date: &str,
    to_date: &str,
) -> String {
    let a: Vec<&str> = a.iter().map(String::as_str).collect();
    let b: Vec<&str> = b.iter().map(String::as_str).collect();
    let diff = TextDiff::configure()
        .newline_terminated(true)
        .diff_slices(&a, &b);

    diff.unified_diff()
        .context_radius(0)
        .header(
            &header_label(from_file, from_date),
            &header_label(to_file, to_date),
        )
        .to_string()
}

/// Magnitude of the difference between two bodies, in bytes of diff output.
pub fn diff_len(a: &[String], b: &[String]) -> usize {
    unified_diff(a, b, "a", "b", "", "").len()
}
