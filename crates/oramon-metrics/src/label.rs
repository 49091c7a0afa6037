//! Label and metric-name normalization.

use std::sync::LazyLock;

use regex::Regex;

// Both patterns are literals; a failure here is a programming error.
static STRIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[:()*/\-]").expect("strip pattern"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("space-run pattern"));

/// Turn a statistic name into a metric-name fragment.
///
/// Drops `: ( ) * / -`, collapses runs of two or more spaces into `_`,
/// lowercases, then replaces the remaining spaces with `_`.
pub fn format_label(name: &str) -> String {
    let stripped = STRIP.replace_all(name, "");
    let collapsed = SPACE_RUN.replace_all(&stripped, "_");
    collapsed.to_lowercase().replace(' ', "_")
}
