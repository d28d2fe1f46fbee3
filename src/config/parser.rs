// Parser for redis.conf-style configuration files

use super::ConfigError;

/// Parses `key value` lines.
///
/// Blank lines and lines starting with `#` are skipped. Keys are
/// case-insensitive. Values may be wrapped in single or double quotes;
/// double-quoted values understand `\"`, `\\`, `\n` and `\t`.
pub struct ConfigParser<'a> {
    content: &'a str,
}

impl<'a> ConfigParser<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { content }
    }

    /// Returns `(key, value)` pairs in file order
    pub fn parse(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let mut entries = Vec::new();

        for (index, raw) in self.content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, rest) = match line.split_once(char::is_whitespace) {
                Some((key, rest)) => (key, rest.trim()),
                None => {
                    return Err(ConfigError::Parse {
                        line: line_no,
                        message: format!("missing value for '{}'", line),
                    })
                }
            };
            if rest.is_empty() {
                return Err(ConfigError::Parse {
                    line: line_no,
                    message: format!("missing value for '{}'", key),
                });
            }

            let value = unquote(rest).map_err(|message| ConfigError::Parse {
                line: line_no,
                message,
            })?;
            entries.push((key.to_ascii_lowercase(), value));
        }

        Ok(entries)
    }
}

fn unquote(value: &str) -> Result<String, String> {
    let mut chars = value.chars();
    match chars.next() {
        Some('\'') => {
            let inner = value[1..]
                .strip_suffix('\'')
                .ok_or_else(|| "unbalanced quotes".to_string())?;
            Ok(inner.to_string())
        }
        Some('"') => {
            let inner = value[1..]
                .strip_suffix('"')
                .ok_or_else(|| "unbalanced quotes".to_string())?;
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
                    Some(other) => out.push(other),
                    None => return Err("dangling escape".to_string()),
                }
            }
            Ok(out)
        }
        _ => Ok(value.to_string()),
    }
}
