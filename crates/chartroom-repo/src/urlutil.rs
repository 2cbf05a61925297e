//! URL helpers for chart resolution

use url::Url;

/// Compare two URLs after normalization
///
/// Scheme and host case, default ports, duplicate slashes and a trailing
/// slash do not affect equality. When `a` is not a URL both sides are
/// compared as cleaned paths.
pub fn equal(a: &str, b: &str) -> bool {
    let Ok(mut ua) = Url::parse(a) else {
        return clean_path(a) == clean_path(b);
    };
    let Ok(mut ub) = Url::parse(b) else {
        return false;
    };

    for u in [&mut ua, &mut ub] {
        if !u.cannot_be_a_base() {
            let cleaned = clean_path(u.path());
            u.set_path(&cleaned);
        }
    }
    ua.as_str() == ub.as_str()
}

/// Resolve a relative chart URL against a repository base URL
///
/// The base path always gets exactly one trailing slash so the last segment
/// is kept, and the base URL's query parameters replace whatever query the
/// resolved URL would otherwise carry.
pub fn resolve_relative(base: &Url, relative: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    let query: Vec<(String, String)> = base
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let path = format!("{}/", base.path().trim_end_matches('/'));
    base.set_path(&path);
    base.set_query(None);

    let mut resolved = base.join(relative)?;
    if query.is_empty() {
        resolved.set_query(None);
    } else {
        let mut sorted = query;
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
        resolved.query_pairs_mut().clear().extend_pairs(sorted);
    }
    Ok(resolved)
}

/// Last non-empty path segment, used as the local file name
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()?.filter(|s| !s.is_empty()).next_back()
}

/// Lexically clean a slash-separated path
fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
