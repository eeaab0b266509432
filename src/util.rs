use itertools::Itertools;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Up to two uppercase initials, "?" for a blank name
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect();

    if letters.is_empty() {
        "?".to_string()
    } else {
        letters
    }
}

/// "@first.last" style handle
pub fn handle_for(name: &str) -> String {
    format!("@{}", name.split_whitespace().join(".").to_lowercase())
}

/// Clip to `max` terminal columns, marking the cut with an ellipsis
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Greedy word wrap by display width; long words are hard-split
pub fn wrap_to_width(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let sep = usize::from(!line.is_empty());
            if line.width() + sep + word.width() <= max {
                if sep == 1 {
                    line.push(' ');
                }
                line.push_str(word);
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let mut rest = word;
            while rest.width() > max {
                let cut = split_at_width(rest, max);
                lines.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            line.push_str(rest);
        }
        lines.push(line);
    }
    lines
}

// byte index of the longest prefix that fits in `max` columns (at least one char)
fn split_at_width(s: &str, max: usize) -> usize {
    let mut used = 0;
    for (i, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > max && i > 0 {
            return i;
        }
        used += w;
    }
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials() {
        assert_eq!(initials("Asha Rao"), "AR");
        assert_eq!(initials("  priya   lakshmi nair "), "PL");
        assert_eq!(initials("Kiran"), "K");
        assert_eq!(initials(""), "?");
        assert_eq!(initials("   "), "?");
    }

    #[test]
    fn test_handle_for() {
        assert_eq!(handle_for("Asha Rao"), "@asha.rao");
        assert_eq!(handle_for("You"), "@you");
        assert_eq!(handle_for("  Dev   Kumar Patel "), "@dev.kumar.patel");
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("hello", 10), "hello");
        assert_eq!(truncate_to_width("hello world", 6), "hello…");
        assert_eq!(truncate_to_width("hello", 0), "");
        // wide glyphs count double
        assert_eq!(truncate_to_width("🔥🔥🔥", 4), "🔥…");
    }

    #[test]
    fn test_wrap_to_width() {
        assert_eq!(
            wrap_to_width("drink water after the run", 10),
            vec!["drink", "water", "after the", "run"]
        );
        assert_eq!(wrap_to_width("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_to_width("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }
}
