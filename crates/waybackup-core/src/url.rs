//! URL splitting rules shared by the CDX query builder and the output-path
//! computation.

/// A URL decomposed into the three segments the output tree is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitUrl {
    pub domain: String,
    pub subdir: String,
    pub filename: String,
}

/// Split a URL into domain, subdir and filename.
///
/// The scheme, userinfo and port are dropped. The last path segment counts
/// as the filename when the path does not end in `/` or when it contains a
/// dot; otherwise the filename is empty, or `index.html` when
/// `default_index` is set.
///
/// On Windows, characters that are invalid in file names are percent-encoded
/// in the subdir and filename. A literal `%20` is restored to a space on all
/// platforms.
pub fn url_split(url: &str, default_index: bool) -> SplitUrl {
    let rest = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };

    let (host, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };

    // strip userinfo and port
    let domain = host
        .rsplit('@')
        .next()
        .unwrap_or(host)
        .split(':')
        .next()
        .unwrap_or(host)
        .to_string();

    let mut parts: Vec<&str> = if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    };

    let last = parts.last().copied().unwrap_or("");
    let filename = if (!path.ends_with('/') && !last.is_empty()) || last.contains('.') {
        parts.pop().unwrap_or("").to_string()
    } else if default_index {
        "index.html".to_string()
    } else {
        String::new()
    };

    let subdir = parts
        .join("/")
        .trim_matches('/')
        .to_string();

    let (subdir, filename) = sanitize_for_platform(subdir, filename);

    SplitUrl {
        domain,
        subdir,
        filename,
    }
}

#[cfg(windows)]
fn sanitize_for_platform(subdir: String, filename: String) -> (String, String) {
    const SPECIAL: [char; 9] = [':', '*', '?', '&', '=', '<', '>', '\\', '|'];

    let encode = |s: String| {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            if SPECIAL.contains(&c) {
                out.push_str(&format!("%{:02x}", c as u32));
            } else {
                out.push(c);
            }
        }
        out
    };

    let subdir = encode(subdir);
    let filename = encode(filename).replace("%20", " ");
    (subdir, filename)
}

#[cfg(not(windows))]
fn sanitize_for_platform(subdir: String, filename: String) -> (String, String) {
    (subdir, filename.replace("%20", " "))
}

/// Extract the 14-digit timestamp from a wayback machine URL
/// (`.../web/<timestamp>id_/<origin>`).
pub fn url_get_timestamp(url: &str) -> Option<String> {
    let before_marker = url.split("id_/").next()?;
    let candidate = before_marker.rsplit('/').next()?;
    if !candidate.is_empty() && candidate.bytes().all(|b| b.is_ascii_digit()) {
        Some(candidate.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_full_url() {
        let split = url_split("http://h.example/a/b/x.html", true);
        assert_eq!(split.domain, "h.example");
        assert_eq!(split.subdir, "a/b");
        assert_eq!(split.filename, "x.html");
    }

    #[test]
    fn trailing_slash_defaults_to_index() {
        let split = url_split("http://h.example/a/", true);
        assert_eq!(split.domain, "h.example");
        assert_eq!(split.subdir, "a");
        assert_eq!(split.filename, "index.html");
    }

    #[test]
    fn bare_host_defaults_to_index() {
        let split = url_split("http://h.example", true);
        assert_eq!(split.domain, "h.example");
        assert_eq!(split.subdir, "");
        assert_eq!(split.filename, "index.html");
    }

    #[test]
    fn no_default_yields_empty_filename() {
        let split = url_split("http://h.example/a/", false);
        assert_eq!(split.filename, "");
    }

    #[test]
    fn strips_port_and_userinfo() {
        let split = url_split("https://user@h.example:8080/a/x.css", true);
        assert_eq!(split.domain, "h.example");
        assert_eq!(split.subdir, "a");
        assert_eq!(split.filename, "x.css");
    }

    #[test]
    fn dotted_last_segment_is_filename_even_without_scheme() {
        let split = url_split("h.example/style.css", true);
        assert_eq!(split.domain, "h.example");
        assert_eq!(split.subdir, "");
        assert_eq!(split.filename, "style.css");
    }

    #[test]
    fn percent_twenty_restored_to_space() {
        let split = url_split("http://h.example/a/my%20file.html", true);
        assert_eq!(split.filename, "my file.html");
    }

    #[test]
    fn timestamp_from_archive_url() {
        assert_eq!(
            url_get_timestamp("https://web.archive.org/web/20200101000000id_/http://a/"),
            Some("20200101000000".to_string())
        );
        assert_eq!(url_get_timestamp("https://h.example/no-marker"), None);
    }
}
