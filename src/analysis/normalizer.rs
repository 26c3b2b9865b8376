/// Key normalization applied to indexed text and to containment keys alike:
/// lowercase, full-width ASCII folded to half-width, whitespace runs
/// collapsed to one blank and trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;

        for c in text.chars() {
            let c = fold_width(c);
            if c.is_whitespace() {
                pending_space = !out.is_empty();
                continue;
            }
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.extend(c.to_lowercase());
        }

        out
    }

    /// Counts possibly overlapping occurrences of `key` in `text`, both
    /// normalized.
    pub fn occurrences(&self, text: &str, key: &str) -> u32 {
        let text = self.normalize(text);
        let key = self.normalize(key);
        let Some(step) = key.chars().next().map(char::len_utf8) else {
            return 0;
        };

        let mut count = 0;
        let mut start = 0;
        while let Some(pos) = text[start..].find(&key) {
            count += 1;
            start += pos + step;
        }
        count
    }
}

fn fold_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3000}' => ' ',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_width_and_blanks() {
        let n = Normalizer;
        assert_eq!(n.normalize("  Hello\t\tＷｏｒｌｄ "), "hello world");
        assert_eq!(n.normalize("ＡＢＣ１２３"), "abc123");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn occurrences_overlap() {
        let n = Normalizer;
        assert_eq!(n.occurrences("AAAA", "aa"), 3);
        assert_eq!(n.occurrences("Hello  World", "o w"), 1);
        assert_eq!(n.occurrences("abc", ""), 0);
        assert_eq!(n.occurrences("日本語の日本", "日本"), 2);
    }
}
