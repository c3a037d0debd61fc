//! JSON↔PO transforms.
//!
//! Catalogs export to gettext PO with the dot key path as `msgid` and
//! the leaf text as `msgstr`. The transforms are pure; malformed input
//! is a `SyncError::Format`.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{SyncError, SyncResult};

/// One message of a PO file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoEntry {
    /// Dot-joined catalog key path.
    pub msgid: String,
    /// Translated text; empty when untranslated.
    pub msgstr: String,
}

/// Render catalog entries as a PO document.
///
/// Emits a header block carrying the locale, then one entry per key in
/// the given order.
pub fn render_po(entries: &[PoEntry], locale: &str) -> String {
    let mut out = String::new();

    // Header: empty msgid with metadata in msgstr
    out.push_str("msgid \"\"\n");
    out.push_str("msgstr \"\"\n");
    out.push_str("\"Content-Type: text/plain; charset=UTF-8\\n\"\n");
    let _ = writeln!(out, "\"Language: {locale}\\n\"");

    for entry in entries {
        out.push('\n');
        let _ = writeln!(out, "msgid \"{}\"", escape(&entry.msgid));
        let _ = writeln!(out, "msgstr \"{}\"", escape(&entry.msgstr));
    }

    out
}

/// Parse a PO document into entries, dropping the header block.
///
/// Supports comment lines, multi-line string continuations, and the
/// usual backslash escapes. Anything else is malformed.
pub fn parse_po(content: &str, path: &Path) -> SyncResult<Vec<PoEntry>> {
    #[derive(PartialEq)]
    enum Field {
        None,
        Msgid,
        Msgstr,
    }

    let mut entries = Vec::new();
    let mut msgid: Option<String> = None;
    let mut msgstr = String::new();
    let mut field = Field::None;

    let mut finish =
        |msgid: &mut Option<String>, msgstr: &mut String, entries: &mut Vec<PoEntry>| {
            if let Some(id) = msgid.take() {
                // The header carries an empty msgid; skip it
                if !id.is_empty() {
                    entries.push(PoEntry {
                        msgid: id,
                        msgstr: std::mem::take(msgstr),
                    });
                } else {
                    msgstr.clear();
                }
            }
        };

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("msgid ") {
            finish(&mut msgid, &mut msgstr, &mut entries);
            msgid = Some(parse_string(rest, path, lineno + 1)?);
            field = Field::Msgid;
        } else if let Some(rest) = line.strip_prefix("msgstr ") {
            if msgid.is_none() {
                return Err(SyncError::format(
                    path,
                    format!("line {}: msgstr without msgid", lineno + 1),
                ));
            }
            msgstr = parse_string(rest, path, lineno + 1)?;
            field = Field::Msgstr;
        } else if line.starts_with('"') {
            // Continuation of the preceding field
            let fragment = parse_string(line, path, lineno + 1)?;
            match field {
                Field::Msgid => {
                    if let Some(id) = msgid.as_mut() {
                        id.push_str(&fragment);
                    }
                }
                Field::Msgstr => msgstr.push_str(&fragment),
                Field::None => {
                    return Err(SyncError::format(
                        path,
                        format!("line {}: stray string continuation", lineno + 1),
                    ));
                }
            }
        } else {
            return Err(SyncError::format(
                path,
                format!("line {}: unrecognized directive: {line}", lineno + 1),
            ));
        }
    }

    finish(&mut msgid, &mut msgstr, &mut entries);
    Ok(entries)
}

fn parse_string(token: &str, path: &Path, lineno: usize) -> SyncResult<String> {
    let token = token.trim();
    let inner = token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| {
            SyncError::format(path, format!("line {lineno}: expected quoted string"))
        })?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            other => {
                return Err(SyncError::format(
                    path,
                    format!("line {lineno}: bad escape \\{}", other.unwrap_or(' ')),
                ));
            }
        }
    }
    Ok(out)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
