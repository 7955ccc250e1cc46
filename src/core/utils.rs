/// Escapes special characters for Telegram MarkdownV2.
///
/// Every character from the MarkdownV2 reserved set is prefixed with a
/// backslash, including the backslash itself.
///
/// # Example
///
/// ```
/// use campusdrive::core::utils::escape_markdown_v2;
///
/// assert_eq!(escape_markdown_v2("unit_1.pdf"), "unit\\_1\\.pdf");
/// ```
pub fn escape_markdown_v2(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '_' => result.push_str("\\_"),
            '*' => result.push_str("\\*"),
            '[' => result.push_str("\\["),
            ']' => result.push_str("\\]"),
            '(' => result.push_str("\\("),
            ')' => result.push_str("\\)"),
            '~' => result.push_str("\\~"),
            '`' => result.push_str("\\`"),
            '>' => result.push_str("\\>"),
            '#' => result.push_str("\\#"),
            '+' => result.push_str("\\+"),
            '-' => result.push_str("\\-"),
            '=' => result.push_str("\\="),
            '|' => result.push_str("\\|"),
            '{' => result.push_str("\\{"),
            '}' => result.push_str("\\}"),
            '.' => result.push_str("\\."),
            '!' => result.push_str("\\!"),
            _ => result.push(c),
        }
    }

    result
}

/// Formats a points score against the maximum achievable for a branch.
///
/// Falls back to a bare point count when the maximum is unknown or zero.
pub fn format_score(points: i64, max_points: i64) -> String {
    if max_points > 0 {
        let percentage = (points as f64 / max_points as f64) * 100.0;
        format!("{}/{} points ({:.0}%)", points, max_points, percentage)
    } else {
        format!("{} points", points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markdown_v2_reserved() {
        assert_eq!(escape_markdown_v2("a.b!c"), "a\\.b\\!c");
        assert_eq!(escape_markdown_v2("(x)[y]"), "\\(x\\)\\[y\\]");
        assert_eq!(escape_markdown_v2("plain text"), "plain text");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(3, 12), "3/12 points (25%)");
        assert_eq!(format_score(5, 0), "5 points");
    }
}
