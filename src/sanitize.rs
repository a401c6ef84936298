//! Identifier sanitizer.
//!
//! [`sanitize`] is the only path from untrusted text (CSV headers, table and
//! schema names given on the command line) to an identifier that gets
//! interpolated into DDL or DML. Output is uppercase, limited to
//! `[A-Z0-9_]`, never starts with a digit, never equals a reserved word, and
//! fits the configured length.
//!
//! Rules, each applied to the output of the previous one:
//!
//! 1. Trim surrounding whitespace and uppercase.
//! 2. Replace every character outside `[A-Z0-9_]` with `_`.
//! 3. Collapse runs of underscores.
//! 4. Trim leading and trailing underscores.
//! 5. Prefix `_` when the result starts with a digit.
//! 6. Append `_COL` to reserved words.
//! 7. Truncate to `max_len`, keeping a trailing `_COL` suffix intact.

use std::collections::HashSet;

use crate::{config::NamingRules, error::IngestError};

const RESERVED_SUFFIX: &str = "_COL";

pub fn sanitize(raw: &str, rules: &NamingRules) -> Result<String, IngestError> {
    let max_len = rules.max_len();
    if max_len < 1 {
        return Err(IngestError::invalid_identifier(
            raw,
            format!("max_len must be >= 1, got {max_len}"),
        ));
    }

    let replaced: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .map(|ch| match ch {
            'A'..='Z' | '0'..='9' | '_' => ch,
            _ => '_',
        })
        .collect();
    let mut result = collapse_underscores(&replaced).trim_matches('_').to_string();

    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    if result.is_empty() {
        return Err(IngestError::invalid_identifier(
            raw,
            "reduces to an empty string after sanitization",
        ));
    }

    if rules.is_reserved(&result) {
        result.push_str(RESERVED_SUFFIX);
    }

    if result.len() > max_len {
        result = truncate_identifier(&result, max_len);
        if rules.is_reserved(&result) {
            result = suffix_within(&result, max_len).ok_or_else(|| {
                IngestError::invalid_identifier(
                    raw,
                    format!("reserved word cannot carry the {RESERVED_SUFFIX} suffix within {max_len} characters"),
                )
            })?;
        }
    }

    if result.is_empty() {
        return Err(IngestError::invalid_identifier(
            raw,
            format!("empty after truncation to max_len={max_len}"),
        ));
    }
    if rules.is_reserved(&result) {
        return Err(IngestError::invalid_identifier(
            raw,
            format!("reserved word cannot carry the {RESERVED_SUFFIX} suffix within {max_len} characters"),
        ));
    }
    Ok(result)
}

fn collapse_underscores(value: &str) -> String {
    let mut collapsed = String::with_capacity(value.len());
    let mut previous_underscore = false;
    for ch in value.chars() {
        if ch == '_' {
            if previous_underscore {
                continue;
            }
            previous_underscore = true;
        } else {
            previous_underscore = false;
        }
        collapsed.push(ch);
    }
    collapsed
}

// `value` is ASCII by construction, so byte slicing is char slicing.
fn truncate_identifier(value: &str, max_len: usize) -> String {
    if value.ends_with(RESERVED_SUFFIX)
        && let Some(suffixed) = suffix_within(&value[..value.len() - RESERVED_SUFFIX.len()], max_len)
    {
        return suffixed;
    }
    value[..max_len].trim_end_matches('_').to_string()
}

fn suffix_within(base: &str, max_len: usize) -> Option<String> {
    let room = max_len.checked_sub(RESERVED_SUFFIX.len())?;
    let trimmed = base[..room.min(base.len())].trim_end_matches('_');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("{trimmed}{RESERVED_SUFFIX}"))
}

/// Hands out sanitized identifiers that are unique within one table.
///
/// A candidate that collides with an earlier one gets a numeric suffix
/// (`_2`, `_3`, ...), shortening the base so the whole name still fits.
#[derive(Debug)]
pub struct UniqueNames<'a> {
    rules: &'a NamingRules,
    taken: HashSet<String>,
}

impl<'a> UniqueNames<'a> {
    pub fn new(rules: &'a NamingRules) -> Self {
        Self {
            rules,
            taken: HashSet::new(),
        }
    }

    pub fn assign(&mut self, raw: &str) -> Result<String, IngestError> {
        let candidate = sanitize(raw, self.rules)?;
        if self.taken.insert(candidate.clone()) {
            return Ok(candidate);
        }
        let max_len = self.rules.max_len();
        for counter in 2usize.. {
            let suffix = format!("_{counter}");
            let Some(room) = max_len.checked_sub(suffix.len()).filter(|room| *room > 0) else {
                break;
            };
            let base = candidate[..room.min(candidate.len())].trim_end_matches('_');
            if base.is_empty() {
                break;
            }
            let name = format!("{base}{suffix}");
            if self.taken.insert(name.clone()) {
                return Ok(name);
            }
        }
        Err(IngestError::invalid_identifier(
            raw,
            format!("no unique identifier fits within {max_len} characters"),
        ))
    }
}
