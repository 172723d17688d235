//! URI and path codec.
//!
//! Pure functions over string buffers: scheme extraction, path
//! normalization, percent-encoding and -decoding, and the small
//! buffer-surgery helpers the name parser is built from. No state lives
//! here; everything operates on caller-owned buffers so parsers can chain
//! the steps without re-allocating at each stage.

use crate::error::{VfsError, VfsResult};
use crate::name::{FileType, PathStyle};

/// Path separator as a char.
pub const SEPARATOR_CHAR: char = '/';

/// Path separator as a string.
pub const SEPARATOR: &str = "/";

/// The root path of every filesystem.
pub const ROOT_PATH: &str = "/";

/// The separator translated by [`fix_separators`].
const TRANS_SEPARATOR: char = '\\';

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

// =============================================================================
// Scheme extraction
// =============================================================================

/// Extract the scheme from a URI, using the platform drive-letter rule.
///
/// On Windows a single-letter run before `:` denotes a drive letter, not a
/// scheme, so `c:/temp` yields no scheme there. See [`extract_scheme_with`]
/// for the explicit-rule variant.
pub fn extract_scheme(uri: &str, rest: Option<&mut String>) -> Option<String> {
    extract_scheme_with(uri, rest, cfg!(windows))
}

/// Extract the scheme from a URI.
///
/// Scans from the start of `uri`: ASCII letters are accepted anywhere,
/// digits and `+`/`-`/`.` only after the first character; the scan stops at
/// `:`. When `single_letter_is_drive` is set, a matched run of length ≤ 1
/// is treated as a drive letter and no scheme is returned.
///
/// When a scheme is found and `rest` is provided, the buffer is replaced
/// with `uri` minus the consumed `scheme:` prefix; otherwise it is replaced
/// with `uri` unchanged.
pub fn extract_scheme_with(
    uri: &str,
    mut rest: Option<&mut String>,
    single_letter_is_drive: bool,
) -> Option<String> {
    if let Some(buffer) = rest.as_deref_mut() {
        buffer.clear();
        buffer.push_str(uri);
    }

    for (pos, ch) in uri.char_indices() {
        if ch == ':' {
            let scheme = &uri[..pos];
            if scheme.len() <= 1 && single_letter_is_drive {
                // A Windows drive letter, not a scheme.
                return None;
            }
            if let Some(buffer) = rest {
                buffer.replace_range(..=pos, "");
            }
            return Some(scheme.to_string());
        }
        if ch.is_ascii_alphabetic() {
            continue;
        }
        if pos > 0 && (ch.is_ascii_digit() || ch == '+' || ch == '-' || ch == '.') {
            continue;
        }
        // Not a scheme character.
        break;
    }

    None
}

// =============================================================================
// Path normalization
// =============================================================================

/// Normalize a path buffer in place and report the file type its shape
/// implies (FOLDER when the raw input ends with the separator, FILE
/// otherwise).
///
/// Deletes empty and `.` segments. A `..` segment deletes itself together
/// with the nearest preceding segment; a `..` with nothing left to cancel
/// fails with [`VfsError::MalformedPath`]. A single trailing separator is
/// stripped unless `style` is [`PathStyle::Url`].
pub fn normalise_path(path: &mut String, style: PathStyle) -> VfsResult<FileType> {
    if path.is_empty() {
        return Ok(FileType::Folder);
    }

    let mut file_type = FileType::Folder;
    if !path.ends_with(SEPARATOR_CHAR) {
        file_type = FileType::File;
    }

    let mut chars: Vec<char> = path.chars().collect();

    // Start of the first element.
    let mut start_first = 0;
    if chars[0] == SEPARATOR_CHAR {
        if chars.len() == 1 {
            return Ok(file_type);
        }
        start_first = 1;
    }

    let mut start = start_first;
    let mut max = chars.len();
    while start < max {
        // Find the end of the element.
        let mut end = start;
        while end < max && chars[end] != SEPARATOR_CHAR {
            end += 1;
        }

        let elem_len = end - start;
        if elem_len == 0 {
            // An empty element - axe it.
            chars.remove(end);
            max = chars.len();
            continue;
        }
        if elem_len == 1 && chars[start] == '.' {
            // A '.' element - axe it.
            chars.drain(start..(end + 1).min(max));
            max = chars.len();
            continue;
        }
        if elem_len == 2 && chars[start] == '.' && chars[start + 1] == '.' {
            // A '..' element - remove the previous element as well.
            if start == start_first {
                // Previous element is missing: the path escapes the root.
                return Err(VfsError::MalformedPath {
                    path: path.clone(),
                    reason: "`..` escapes the filesystem root".to_string(),
                });
            }

            // Find the start of the previous element.
            let mut pos = start as isize - 2;
            while pos >= 0 && chars[pos as usize] != SEPARATOR_CHAR {
                pos -= 1;
            }
            start = (pos + 1) as usize;

            chars.drain(start..(end + 1).min(max));
            max = chars.len();
            continue;
        }

        // A regular element.
        start = end + 1;
    }

    // Strip a trailing separator.
    if style != PathStyle::Url && max > 1 && chars[max - 1] == SEPARATOR_CHAR {
        chars.pop();
    }

    *path = chars.into_iter().collect();
    Ok(file_type)
}

/// Translate `\` separators to `/`, reporting whether anything changed.
pub fn fix_separators(name: &mut String) -> bool {
    if !name.contains(TRANS_SEPARATOR) {
        return false;
    }
    *name = name.replace(TRANS_SEPARATOR, SEPARATOR);
    true
}

// =============================================================================
// Percent-encoding
// =============================================================================

/// Percent-decode a string.
///
/// Each `%XX` sequence (hex digits of either case) is replaced with the
/// byte it denotes. A `%` followed by fewer than two hex digits fails with
/// [`VfsError::MalformedEncoding`].
pub fn decode(encoded: &str) -> VfsResult<String> {
    if !encoded.contains('%') {
        return Ok(encoded.to_string());
    }

    let chars: Vec<char> = encoded.chars().collect();
    let mut out = String::with_capacity(encoded.len());
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        if ch != '%' {
            out.push(ch);
            index += 1;
            continue;
        }
        let value = decode_sequence(&chars, index)?;
        out.push(value);
        index += 3;
    }
    Ok(out)
}

/// Percent-decode a buffer in place.
pub fn decode_in_place(buffer: &mut String) -> VfsResult<()> {
    let decoded = decode(buffer)?;
    *buffer = decoded;
    Ok(())
}

/// Check that a URI contains only well-formed `%XX` sequences.
pub fn check_uri_encoding(uri: &str) -> VfsResult<()> {
    decode(uri).map(|_| ())
}

/// Decode the `%XX` sequence starting at `index`.
fn decode_sequence(chars: &[char], index: usize) -> VfsResult<char> {
    if index + 2 >= chars.len() {
        return Err(VfsError::MalformedEncoding {
            input: chars[index..].iter().collect(),
        });
    }
    let dig1 = chars[index + 1].to_digit(16);
    let dig2 = chars[index + 2].to_digit(16);
    match (dig1, dig2) {
        (Some(high), Some(low)) => Ok(char::from((high as u8) << 4 | low as u8)),
        _ => Err(VfsError::MalformedEncoding {
            input: chars[index..index + 3].iter().collect(),
        }),
    }
}

/// Percent-encode a string.
///
/// `%` itself and every character in `reserved` become `%XX` (uppercase
/// hex). Everything else passes through untouched.
pub fn encode(decoded: &str, reserved: &[char]) -> String {
    let mut out = String::with_capacity(decoded.len());
    for ch in decoded.chars() {
        if ch == '%' || reserved.contains(&ch) {
            push_encoded(&mut out, ch);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Append `unencoded` to `buffer`, percent-encoding reserved characters.
pub fn append_encoded(buffer: &mut String, unencoded: &str, reserved: &[char]) {
    buffer.push_str(&encode(unencoded, reserved));
}

fn push_encoded(out: &mut String, ch: char) {
    let value = ch as u32;
    out.push('%');
    out.push(HEX_DIGITS[(value >> 4 & 0xF) as usize] as char);
    out.push(HEX_DIGITS[(value & 0xF) as usize] as char);
}

/// Canonicalize the percent-encoding of a path buffer in place.
///
/// Every `%XX` sequence is decoded unless the decoded character is `%` or
/// `should_encode` reports it reserved within the scheme (then the encoded
/// form is kept verbatim). Bare characters the predicate reserves are
/// encoded. The result uses encoding exactly where the scheme requires it.
pub fn canonicalize_path(
    buffer: &mut String,
    should_encode: &dyn Fn(char) -> bool,
) -> VfsResult<()> {
    let chars: Vec<char> = buffer.chars().collect();
    let mut out = String::with_capacity(buffer.len());
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        if ch == '%' {
            let value = decode_sequence(&chars, index)?;
            if value == '%' || should_encode(value) {
                // Reserved within the scheme: keep the encoded form.
                out.push(chars[index]);
                out.push(chars[index + 1]);
                out.push(chars[index + 2]);
            } else {
                out.push(value);
            }
            index += 3;
        } else if should_encode(ch) {
            push_encoded(&mut out, ch);
            index += 1;
        } else {
            out.push(ch);
            index += 1;
        }
    }
    *buffer = out;
    Ok(())
}

// =============================================================================
// Buffer surgery
// =============================================================================

/// Split a buffer at the first `?`, truncating it and returning the query
/// string (without the `?`).
pub fn extract_query_string(name: &mut String) -> Option<String> {
    let pos = name.find('?')?;
    let query = name[pos + 1..].to_string();
    name.truncate(pos);
    Some(query)
}

/// Pop the first path element off a buffer, consuming the element and its
/// trailing separator. Returns `None` for an empty buffer.
pub fn extract_first_element(name: &mut String) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    let start = usize::from(name.starts_with(SEPARATOR_CHAR));
    match name[start..].find(SEPARATOR_CHAR) {
        Some(rel) => {
            let pos = start + rel;
            let elem = name[start..pos].to_string();
            name.replace_range(start..=pos, "");
            Some(elem)
        }
        None => {
            let elem = name[start..].to_string();
            name.clear();
            Some(elem)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn normalise(input: &str) -> VfsResult<(String, FileType)> {
        let mut path = input.to_string();
        let kind = normalise_path(&mut path, PathStyle::Native)?;
        Ok((path, kind))
    }

    #[test]
    fn test_normalise_plain() {
        let (path, kind) = normalise("/a/b/c.txt").unwrap();
        assert_eq!(path, "/a/b/c.txt");
        assert_eq!(kind, FileType::File);
    }

    #[test]
    fn test_normalise_trailing_separator_means_folder() {
        let (path, kind) = normalise("/a/b/").unwrap();
        assert_eq!(path, "/a/b");
        assert_eq!(kind, FileType::Folder);
    }

    #[test]
    fn test_normalise_url_style_keeps_trailing_separator() {
        let mut path = "/a/b/".to_string();
        let kind = normalise_path(&mut path, PathStyle::Url).unwrap();
        assert_eq!(path, "/a/b/");
        assert_eq!(kind, FileType::Folder);
    }

    #[test]
    fn test_normalise_removes_empty_and_dot_elements() {
        let (path, _) = normalise("/a//b/./c").unwrap();
        assert_eq!(path, "/a/b/c");
        let (path, _) = normalise("/./a/.").unwrap();
        assert_eq!(path, "/a");
    }

    #[test]
    fn test_normalise_dotdot_cancels_previous() {
        let (path, _) = normalise("/a/b/../c").unwrap();
        assert_eq!(path, "/a/c");
        let (path, _) = normalise("/a/b/..").unwrap();
        assert_eq!(path, "/a");
        let (path, _) = normalise("/a/..").unwrap();
        assert_eq!(path, "/");
    }

    #[test]
    fn test_normalise_dotdot_escaping_root_fails() {
        assert!(matches!(
            normalise("/../a"),
            Err(VfsError::MalformedPath { .. })
        ));
        assert!(matches!(
            normalise("/a/../../b"),
            Err(VfsError::MalformedPath { .. })
        ));
    }

    #[test]
    fn test_normalise_root() {
        let (path, kind) = normalise("/").unwrap();
        assert_eq!(path, "/");
        assert_eq!(kind, FileType::Folder);
    }

    #[test]
    fn test_extract_scheme() {
        let mut rest = String::new();
        let scheme = extract_scheme_with("ftp://host/a", Some(&mut rest), false);
        assert_eq!(scheme.as_deref(), Some("ftp"));
        assert_eq!(rest, "//host/a");

        assert_eq!(
            extract_scheme_with("svn+ssh:/x", None, false).as_deref(),
            Some("svn+ssh")
        );
        assert_eq!(extract_scheme_with("/no/scheme", None, false), None);
        assert_eq!(extract_scheme_with("no scheme", None, false), None);
    }

    #[test]
    fn test_extract_scheme_drive_letter_rule() {
        // With the drive-letter rule on, `c:` is a drive, not a scheme.
        assert_eq!(extract_scheme_with("c:/temp", None, true), None);
        assert_eq!(
            extract_scheme_with("c:/temp", None, false).as_deref(),
            Some("c")
        );
        // Multi-letter schemes are unaffected by the rule.
        assert_eq!(
            extract_scheme_with("mem:/a", None, true).as_deref(),
            Some("mem")
        );
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("%2Fa").unwrap(), "/a");
        assert_eq!(decode("%2f").unwrap(), "/");
        assert_eq!(decode("plain").unwrap(), "plain");
        assert_eq!(decode("a%20b").unwrap(), "a b");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode("%G1"),
            Err(VfsError::MalformedEncoding { .. })
        ));
        assert!(matches!(
            decode("abc%2"),
            Err(VfsError::MalformedEncoding { .. })
        ));
        assert!(matches!(decode("%"), Err(VfsError::MalformedEncoding { .. })));
    }

    #[test]
    fn test_encode_reserved() {
        assert_eq!(encode("a/b", &['/']), "a%2Fb");
        assert_eq!(encode("100%", &[]), "100%25");
        assert_eq!(encode("plain", &['#']), "plain");
    }

    #[test]
    fn test_decode_encode_round_trip() {
        let reserved = ['/', '#', ' '];
        for input in ["a b/c#d", "plain", "x y z"] {
            assert_eq!(decode(&encode(input, &reserved)).unwrap(), input);
        }
    }

    #[test]
    fn test_canonicalize_path() {
        // Unreserved sequences decode, reserved ones stay encoded.
        let mut buffer = "%61%2Fb".to_string();
        canonicalize_path(&mut buffer, &|ch| ch == '/').unwrap();
        assert_eq!(buffer, "a%2Fb");

        // Bare reserved characters get encoded.
        let mut buffer = "a b".to_string();
        canonicalize_path(&mut buffer, &|ch| ch == ' ').unwrap();
        assert_eq!(buffer, "a%20b");

        // `%` never decodes.
        let mut buffer = "%25x".to_string();
        canonicalize_path(&mut buffer, &|_| false).unwrap();
        assert_eq!(buffer, "%25x");
    }

    #[test]
    fn test_extract_query_string() {
        let mut name = "/a/b?x=1&y=2".to_string();
        assert_eq!(extract_query_string(&mut name).as_deref(), Some("x=1&y=2"));
        assert_eq!(name, "/a/b");

        let mut name = "/a/b".to_string();
        assert_eq!(extract_query_string(&mut name), None);
        assert_eq!(name, "/a/b");
    }

    #[test]
    fn test_extract_first_element() {
        let mut name = "/a/b/c".to_string();
        assert_eq!(extract_first_element(&mut name).as_deref(), Some("a"));
        assert_eq!(name, "/b/c");
        assert_eq!(extract_first_element(&mut name).as_deref(), Some("b"));
        assert_eq!(name, "/c");
        assert_eq!(extract_first_element(&mut name).as_deref(), Some("c"));
        assert_eq!(name, "");
        assert_eq!(extract_first_element(&mut name), None);
    }

    #[test]
    fn test_fix_separators() {
        let mut name = r"a\b\c".to_string();
        assert!(fix_separators(&mut name));
        assert_eq!(name, "a/b/c");

        let mut name = "a/b".to_string();
        assert!(!fix_separators(&mut name));
    }
}
