//! Filename sanitization for downloaded media.
//!
//! Output names are served back under `/downloads/{id}/{name}`, so they are
//! reduced to ASCII alphanumerics, `_`, `-` and `.`.

use std::path::Path;

/// Stem used when nothing survives sanitization.
const FALLBACK_STEM: &str = "download";

/// Derive a storage-safe filename from a raw name produced by the extractor.
///
/// - `My Video!! (2024).mp4` → `My_Video_2024.mp4`
/// - `  clip  .webm` → `clip.webm`
/// - `My_Video_2024.mp4` → `My_Video_2024.mp4` (idempotent)
pub fn safe_filename(raw: &str) -> String {
    let path = Path::new(raw);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(raw);
    let ext = path.extension().and_then(|s| s.to_str());

    let mut stem = sanitize_component(stem);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }

    match ext.map(sanitize_component) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
        _ => stem,
    }
}

/// Append `_1`, `_2`, ... before the extension of `name`, returning the
/// first candidate for which `taken` is false.
pub fn dedupe_filename(name: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|s| s.to_str());

    let mut counter: u32 = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Replace unsafe characters with `_`, collapse runs of whitespace and
/// underscores into a single `_`, then trim `_` and `.` from both ends.
fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_run = false;

    for c in input.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') || c.is_whitespace() {
            c
        } else {
            '_'
        };

        if c == '_' || c.is_whitespace() {
            if !in_run {
                out.push('_');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }

    out.trim_matches(|c| c == '_' || c == '.').to_string()
}
