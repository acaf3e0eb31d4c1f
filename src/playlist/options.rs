//! Per-file player option strings.
//!
//! Options are comma separated `key=value` pairs. A value that itself holds
//! a comma is written length-prefixed as `%N%value`, where `N` is the byte
//! length of the value:
//!
//! ```text
//! force-media-title=%9%Song, One,length=180,vid=no
//! ```

use std::fmt;

/// Keys whose values are always written with a length prefix.
const ALWAYS_PREFIXED: &[&str] = &["force-media-title"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerOptions(Vec<(String, String)>);

impl PlayerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenise an option string. Never fails; malformed length prefixes are
    /// read as plain values.
    pub fn parse(input: &str) -> Self {
        let mut pairs = Vec::new();
        let mut rest = input;

        while !rest.is_empty() {
            rest = rest.trim_start_matches(',');
            if rest.is_empty() {
                break;
            }

            let key_end = rest.find(['=', ',']).unwrap_or(rest.len());
            let key = rest[..key_end].trim().to_string();
            rest = &rest[key_end..];

            let value = match rest.strip_prefix('=') {
                Some(after) => {
                    let (value, remaining) = split_value(after);
                    rest = remaining;
                    value
                }
                None => String::new(),
            };

            if !key.is_empty() {
                pairs.push((key, value));
            }
        }

        Self(pairs)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, replacing an earlier value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Read one value, honouring a `%N%` prefix. Returns the value and whatever
/// follows its terminating comma.
fn split_value(input: &str) -> (String, &str) {
    if let Some(after_pct) = input.strip_prefix('%') {
        if let Some(len_end) = after_pct.find('%') {
            if let Ok(len) = after_pct[..len_end].parse::<usize>() {
                let body = &after_pct[len_end + 1..];
                if let Some(value) = body.get(..len) {
                    let remaining = &body[len..];
                    let remaining = remaining.strip_prefix(',').unwrap_or(remaining);
                    return (value.to_string(), remaining);
                }
            }
        }
    }

    match input.find(',') {
        Some(comma) => (input[..comma].to_string(), &input[comma + 1..]),
        None => (input.to_string(), ""),
    }
}

impl fmt::Display for PlayerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if ALWAYS_PREFIXED.contains(&key.as_str()) || value.contains([',', '%']) {
                write!(f, "{}=%{}%{}", key, value.len(), value)?;
            } else if value.is_empty() {
                f.write_str(key)?;
            } else {
                write!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PlayerOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (k, v) in iter {
            options.set(k, v);
        }
        options
    }
}
