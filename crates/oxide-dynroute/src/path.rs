//! Path pattern matching.
//!
//! Pattern syntax:
//! - `/users` - literal path
//! - `/users/:id` - named parameter, matches one segment
//! - `/files/*rest` - trailing wildcard, matches the remainder of the path
//!
//! Slashes only separate segments: leading, trailing and repeated slashes are
//! ignored on both sides.

use crate::request::PathParams;

/// Returns true if the pattern contains a parameter or wildcard segment.
pub fn is_parameterized(pattern: &str) -> bool {
    pattern.contains(':') || pattern.contains('*')
}

/// Collapses repeated slashes and strips the trailing one.
///
/// ```
/// use oxide_dynroute::normalize_path;
///
/// assert_eq!(normalize_path("//api///users/"), "/api/users");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn skip_slashes(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && s[i] == b'/' {
        i += 1;
    }
    i
}

fn segment_end(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && s[i] != b'/' {
        i += 1;
    }
    i
}

/// Matches a concrete request path against a route pattern.
///
/// Returns the extracted parameters on success. The scan is a single pass
/// over both strings with no backtracking. Duplicate parameter names keep
/// the last value.
///
/// ```
/// use oxide_dynroute::match_route;
///
/// let params = match_route("/posts/:id/comments/:cid", "/posts/1/comments/7").unwrap();
/// assert_eq!(params.get("id"), Some("1"));
/// assert_eq!(params.get("cid"), Some("7"));
/// assert!(match_route("/posts/:id", "/posts/1/extra").is_none());
/// ```
pub fn match_route(pattern: &str, path: &str) -> Option<PathParams> {
    let pat = pattern.as_bytes();
    let txt = path.as_bytes();
    let mut params = PathParams::new();

    let mut pi = skip_slashes(pat, 0);
    let mut ti = skip_slashes(txt, 0);

    while pi < pat.len() && ti < txt.len() {
        match pat[pi] {
            b':' => {
                let name_end = segment_end(pat, pi);
                let value_end = segment_end(txt, ti);
                params.insert(&pattern[pi + 1..name_end], &path[ti..value_end]);
                pi = name_end;
                ti = value_end;
            }
            b'*' => {
                pi += 1;
                if pi < pat.len() && pat[pi] == b'/' {
                    pi += 1;
                }
                params.insert(&pattern[pi..], &path[ti..]);
                pi = pat.len();
                ti = txt.len();
                break;
            }
            _ => {
                while pi < pat.len() && ti < txt.len() && pat[pi] != b'/' && txt[ti] != b'/' {
                    if pat[pi] != txt[ti] {
                        return None;
                    }
                    pi += 1;
                    ti += 1;
                }
                // A literal segment must end on both sides at once.
                if (pi < pat.len() && pat[pi] != b'/') || (ti < txt.len() && txt[ti] != b'/') {
                    return None;
                }
            }
        }
        pi = skip_slashes(pat, pi);
        ti = skip_slashes(txt, ti);
    }

    (pi == pat.len() && ti == txt.len()).then_some(params)
}
