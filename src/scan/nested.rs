//! Nested / encoded URL extraction.
//!
//! Proxies, redirectors and embed players often carry the real manifest
//! address percent-encoded inside a query parameter, sometimes several
//! layers deep:
//!
//! ```text
//! https://r.example.com/go?to=https%3A%2F%2Fp.example.com%2Fe%3Fsrc%3Dhttps%253A%252F%252Fcdn%252Fa.m3u8
//! ```
//!
//! [`extract_nested`] decodes, sweeps, and walks query values recursively.
//! Recursion is bounded by a depth cap and a per-call visited set, so
//! self-referential parameters cannot loop.
//!
//! Percent-decoding is lenient: a malformed escape such as `%ZZ` is kept
//! as literal text. Only input that decodes to invalid UTF-8 is rejected.

use std::collections::HashSet;

use tracing::trace;
use url::Url;

use super::Candidate;
use crate::classify::{find_stream_urls, is_stream_url, type_from_url};

/// Query values this short are never URLs worth following.
const MIN_PARAM_LEN: usize = 10;

/// Find stream URLs hidden inside `text`.
///
/// Emits `{source}-nested` for sweep matches in the decoded text and
/// `{source}-param` for query values that are streams themselves; other
/// long query values are walked again as `{source}-inner`.
pub fn extract_nested(text: &str, source: &str, max_depth: usize, out: &mut Vec<Candidate>) {
    let mut visited = HashSet::new();
    walk(text, source, 0, max_depth, &mut visited, out);
}

fn walk(
    text: &str,
    source: &str,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<String>,
    out: &mut Vec<Candidate>,
) {
    if text.is_empty() || depth > max_depth || !visited.insert(text.to_string()) {
        return;
    }

    let stripped = text.replace('\\', "");
    match urlencoding::decode(&stripped) {
        Ok(decoded) => {
            for url in find_stream_urls(&decoded) {
                if is_stream_url(url) {
                    out.push(Candidate::new(url, type_from_url(url), format!("{source}-nested")));
                }
            }
        }
        Err(e) => trace!("Undecodable nested candidate ({}), walking params only", e),
    }

    if !(text.contains("://") || text.contains("?url=")) {
        return;
    }

    let absolute = if text.starts_with("http") {
        text.to_string()
    } else {
        format!("http://dummy.com/{text}")
    };
    let parsed = match Url::parse(&absolute) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!("Nested candidate is not a URL: {}", e);
            return;
        }
    };

    for (_, value) in parsed.query_pairs() {
        if value.chars().count() <= MIN_PARAM_LEN {
            continue;
        }
        if is_stream_url(&value) {
            out.push(Candidate::new(&*value, type_from_url(&value), format!("{source}-param")));
        } else {
            walk(&value, &format!("{source}-inner"), depth + 1, max_depth, visited, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::StreamType;

    fn extract(text: &str) -> Vec<Candidate> {
        let mut out = Vec::new();
        extract_nested(text, "iframe", 8, &mut out);
        out
    }

    #[test]
    fn redirect_param_yields_decoded_manifest() {
        let found = extract("https://go.example.com/redirect?url=https%3A%2F%2Fcdn.example.com%2Fmaster.m3u8");
        let param = found
            .iter()
            .find(|c| c.source == "iframe-param")
            .expect("param candidate");
        assert_eq!(param.url, "https://cdn.example.com/master.m3u8");
        assert_eq!(param.stream_type, StreamType::Hls);
        assert!(found.iter().any(|c| c.source == "iframe-nested"));
    }

    #[test]
    fn double_encoded_params_are_walked() {
        let found = extract(
            "https://r.example.com/go?to=https%3A%2F%2Fp.example.com%2Fembed%3Fsrc%3Dhttps%253A%252F%252Fcdn.example.com%252Fa%252Empd",
        );
        assert!(found
            .iter()
            .any(|c| c.url == "https://cdn.example.com/a.mpd" && c.source == "iframe-inner-param"));
    }

    #[test]
    fn short_params_are_ignored() {
        let found = extract("https://example.com/embed?v=a.m3u8&id=42");
        assert!(found.iter().all(|c| !c.source.ends_with("-param")));
    }

    #[test]
    fn relative_url_param_form() {
        let found = extract("player?url=https%3A%2F%2Fcdn.example.com%2Fv.m3u8");
        assert!(found
            .iter()
            .any(|c| c.url == "https://cdn.example.com/v.m3u8" && c.source == "iframe-param"));
    }

    #[test]
    fn malformed_input_is_skipped() {
        assert!(extract("%E0%A4%A").is_empty());
        assert!(extract("http://[::1/broken?x=1").is_empty());
    }

    #[test]
    fn malformed_escapes_pass_through_decode() {
        let found = extract("https://cdn.example.com/a%ZZ/index.m3u8");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://cdn.example.com/a%ZZ/index.m3u8");
        assert_eq!(found[0].source, "iframe-nested");
    }

    #[test]
    fn deep_nesting_terminates() {
        // Each layer wraps the previous one; the depth cap stops the walk.
        let mut text = String::from("https://loop.example.com/a?next=start-value-x");
        for _ in 0..64 {
            text = format!(
                "https://loop.example.com/a?next={}",
                urlencoding::encode(&text)
            );
        }
        let mut out = Vec::new();
        extract_nested(&text, "iframe", 4, &mut out);
        assert!(out.is_empty());
    }
}
