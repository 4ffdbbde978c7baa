//! Fragment filename encoding.
//!
//! A fragment holds the bytes of exactly one requested span and is named
//! `<basename>@bytes=<low>-<high>`, both bounds decimal and inclusive.

/// Marker separating the basename from the encoded span.
pub const FRAGMENT_MARKER: &str = "@bytes=";

/// Build the fragment filename for a span of `basename`.
pub fn fragment_name(basename: &str, low: u64, high: u64) -> String {
    format!("{}{}{}-{}", basename, FRAGMENT_MARKER, low, high)
}

/// Parse a fragment filename into its basename and inclusive span.
///
/// Returns `None` for names that do not carry a well-formed marker suffix.
pub fn parse_fragment_name(name: &str) -> Option<(&str, u64, u64)> {
    let (basename, span) = name.rsplit_once(FRAGMENT_MARKER)?;
    let (low, high) = span.rsplit_once('-')?;
    let low = low.parse().ok()?;
    let high = high.parse().ok()?;
    if low > high {
        return None;
    }
    Some((basename, low, high))
}

/// Strip the fragment marker suffix, recovering the original basename.
pub fn strip_fragment_marker(name: &str) -> &str {
    name.rsplit_once(FRAGMENT_MARKER)
        .map(|(basename, _)| basename)
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_name_round_trip() {
        let name = fragment_name("archive.bin", 3_000_001, 6_000_000);
        assert_eq!(name, "archive.bin@bytes=3000001-6000000");
        assert_eq!(
            parse_fragment_name(&name),
            Some(("archive.bin", 3_000_001, 6_000_000))
        );
    }

    #[test]
    fn test_whole_resource_fragment_name() {
        assert_eq!(fragment_name("name", 0, 500), "name@bytes=0-500");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert_eq!(parse_fragment_name("plain-file.bin"), None);
        assert_eq!(parse_fragment_name("x@bytes=abc-5"), None);
        assert_eq!(parse_fragment_name("x@bytes=10-5"), None);
    }

    #[test]
    fn test_strip_marker() {
        assert_eq!(strip_fragment_marker("archive.bin@bytes=0-100"), "archive.bin");
        assert_eq!(strip_fragment_marker("no-marker"), "no-marker");
    }
}
