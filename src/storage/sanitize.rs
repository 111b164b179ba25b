use unicode_normalization::UnicodeNormalization;

pub const MAX_FILE_NAME_LEN: usize = 120;
pub const MAX_SEGMENT_LEN: usize = 64;
pub const FALLBACK_FILE_NAME: &str = "file";

const LEADING_TRIM: &[char] = &['-', '.', ' '];
const TRAILING_TRIM: &[char] = &['-', ' '];

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Strips diacritics and maps everything outside `[A-Za-z0-9._-]` (plus a
/// single space when `allow_space`) to `-`, collapsing runs of separators.
fn sanitize(raw: &str, allow_space: bool, max_len: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.nfd().filter(|c| !is_combining_mark(*c)) {
        let mapped = match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.' | '-' => c,
            ' ' if allow_space => ' ',
            _ => '-',
        };
        if matches!(mapped, '-' | '.' | ' ') && out.ends_with(mapped) {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_start_matches(LEADING_TRIM).trim_end_matches(TRAILING_TRIM);
    let capped: String = trimmed.chars().take(max_len).collect();
    capped.trim_end_matches(TRAILING_TRIM).to_string()
}

/// Object-safe file name, never empty.
pub fn sanitize_file_name(raw: &str) -> String {
    let name = sanitize(raw, false, MAX_FILE_NAME_LEN);
    if name.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name
    }
}

/// A folder segment, or `None` when nothing survives sanitization.
pub fn sanitize_segment(raw: &str) -> Option<String> {
    Some(sanitize(raw, true, MAX_SEGMENT_LEN)).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(sanitize_file_name("Contrato Pérez Ñandú.pdf"), "Contrato-Perez-Nandu.pdf");
    }

    #[test]
    fn collapses_and_trims_separators() {
        assert_eq!(sanitize_file_name("--hello!!  world--.txt"), "hello-world-.txt");
        assert_eq!(sanitize_file_name("...hidden"), "hidden");
        assert_eq!(sanitize_file_name("a...b"), "a.b");
    }

    #[test]
    fn never_returns_empty_file_name() {
        assert_eq!(sanitize_file_name(""), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_file_name("///"), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_file_name(".."), FALLBACK_FILE_NAME);
    }

    #[test]
    fn slashes_cannot_survive() {
        let name = sanitize_file_name("../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn caps_length() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_file_name(&long).len(), MAX_FILE_NAME_LEN);
        assert_eq!(sanitize_segment(&long).unwrap().len(), MAX_SEGMENT_LEN);

        let edge = format!("{}-b", "a".repeat(MAX_SEGMENT_LEN - 1));
        assert_eq!(sanitize_segment(&edge).unwrap(), "a".repeat(MAX_SEGMENT_LEN - 1));
    }

    #[test]
    fn segments_keep_single_spaces() {
        assert_eq!(sanitize_segment("  Contratos   2024 ").as_deref(), Some("Contratos 2024"));
        assert_eq!(sanitize_segment("año\tfiscal").as_deref(), Some("ano-fiscal"));
        assert_eq!(sanitize_segment("%%%"), None);
    }
}
