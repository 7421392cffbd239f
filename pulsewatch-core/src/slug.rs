//! Metric-name slugs for record keys.

/// Lowercases and trims `name`, collapses every run of non-word characters
/// into a single `_`, and strips leading and trailing underscores.
///
/// Word characters are alphanumerics and `_`.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_run = false;

    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    out.trim_matches('_').to_string()
}
