//! Helpers for parsing and cleaning media filenames.
//!
//! Display titles keep everything up to and including the last `(YYYY)` year
//! group, cutting off release tags after it:
//! `"A.Bad.Moms.Christmas.(2017).Bluray-1080p.mkv"` becomes
//! `"A Bad Moms Christmas (2017)"`.

/// Returns the filename without its directory and extension.
fn stem(path: &str) -> &str {
    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match basename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => basename,
    }
}

/// Parses a file path into a display-friendly media title.
pub fn display_title(path: &str) -> String {
    if path.trim().is_empty() {
        return String::new();
    }

    let mut name: String = stem(path)
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();
    name = collapse_spaces(&name);

    // Keep everything up to the last (YYYY) group, if one exists.
    if let Some(end) = last_year_group_end(&name) {
        name.truncate(end);
        name = collapse_spaces(&name);
    }

    title_case(&name)
}

/// Byte offset just past the last `(19xx)` / `(20xx)` group, if any.
fn last_year_group_end(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut found = None;
    for i in 0..bytes.len() {
        if bytes[i] != b'(' || i + 5 >= bytes.len() || bytes[i + 5] != b')' {
            continue;
        }
        let digits = &bytes[i + 1..i + 5];
        if digits.iter().all(|b| b.is_ascii_digit())
            && (digits.starts_with(b"19") || digits.starts_with(b"20"))
        {
            found = Some(i + 6);
        }
    }
    found
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>()
                        + chars.as_str().to_lowercase().as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts a catalog id of the form `[PREFIX-<number>]` at the end of the
/// filename (before the extension).
///
/// Returns the id without brackets (e.g. `"ULT-20"`), or `None` if the
/// filename carries no valid trailing id.
pub fn catalog_id(path: &str) -> Option<String> {
    let stem = stem(path).trim_end();
    if !stem.ends_with(']') {
        return None;
    }

    let open = stem.rfind('[')?;
    let inner = &stem[open + 1..stem.len() - 1];
    let (prefix, number) = inner.split_once('-')?;

    let prefix_ok = !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_uppercase());
    let number_ok = !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit());
    if prefix_ok && number_ok {
        Some(inner.to_string())
    } else {
        None
    }
}
