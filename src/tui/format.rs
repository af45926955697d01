//! Wait-duration folding and formatting for table cells.

/// Parse the leading minute count out of a raw header duration like
/// `"5 minutes"`. Unparseable strings count as zero.
pub fn parse_minutes(duration: &str) -> u64 {
    duration
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// The longest wait among a group's durations, in minutes.
pub fn max_wait_minutes(durations: &[String]) -> u64 {
    durations.iter().map(|d| parse_minutes(d)).max().unwrap_or(0)
}

fn abbreviate(duration: &str) -> String {
    duration
        .replace(" minutes", " mins")
        .replace(" minute", " min")
}

fn format_minutes(minutes: u64) -> String {
    if minutes == 1 {
        "1 min".to_string()
    } else {
        format!("{minutes} mins")
    }
}

/// Collapse a group's wait durations into one cell: a single value as-is
/// (abbreviated), a spread as a `min-max` range.
pub fn format_wait_range(durations: &[String]) -> String {
    if durations.is_empty() {
        return String::new();
    }

    let mut unique: Vec<&String> = durations.iter().collect();
    unique.sort();
    unique.dedup();

    if unique.len() == 1 {
        return abbreviate(&durations[0]);
    }

    let minutes: Vec<u64> = unique.iter().map(|d| parse_minutes(d)).collect();
    let min = minutes.iter().copied().min().unwrap_or(0);
    let max = minutes.iter().copied().max().unwrap_or(0);

    if min == max {
        format_minutes(min)
    } else {
        format!("{min}-{max}min")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_leading_minutes() {
        assert_eq!(parse_minutes("5 minutes"), 5);
        assert_eq!(parse_minutes("1 minute"), 1);
        assert_eq!(parse_minutes("nonsense"), 0);
        assert_eq!(parse_minutes(""), 0);
    }

    #[test]
    fn single_value_is_abbreviated() {
        assert_eq!(format_wait_range(&strings(&["5 minutes"])), "5 mins");
        assert_eq!(format_wait_range(&strings(&["1 minute"])), "1 min");
    }

    #[test]
    fn repeated_value_stays_single() {
        assert_eq!(
            format_wait_range(&strings(&["5 minutes", "5 minutes"])),
            "5 mins"
        );
    }

    #[test]
    fn spread_renders_as_range() {
        assert_eq!(
            format_wait_range(&strings(&["2 minutes", "7 minutes", "5 minutes"])),
            "2-7min"
        );
    }

    #[test]
    fn empty_durations_render_empty() {
        assert_eq!(format_wait_range(&[]), "");
    }

    #[test]
    fn max_wait_finds_the_longest() {
        assert_eq!(max_wait_minutes(&strings(&["2 minutes", "9 minutes"])), 9);
        assert_eq!(max_wait_minutes(&[]), 0);
    }
}
