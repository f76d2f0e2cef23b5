use super::PatternError;
use crate::types::SourceArtifact;
use regex::Regex;

/// Matcher used by override rules.
///
/// A pattern containing `/` is matched against the full project-relative path.
/// Without `/` it names an artifact and is matched against the file name, and
/// also against the file stem when the pattern carries no extension, so `Token`
/// and `Token.sol` both select `contracts/Token.sol`.
///
/// Globs: `*` stays within one path segment, `**` crosses segments, `?` is one
/// character.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    scope: Scope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Path,
    Name { match_stem: bool },
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let normalized = pattern.trim().replace('\\', "/");
        let normalized = normalized.strip_prefix("./").unwrap_or(&normalized).to_string();

        if normalized.is_empty() {
            return Err(PatternError {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let scope = if normalized.contains('/') {
            Scope::Path
        } else {
            Scope::Name {
                match_stem: !normalized.contains('.'),
            }
        };

        let regex = Regex::new(&glob_to_regex(&normalized)).map_err(|e| PatternError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            scope,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, artifact: &SourceArtifact) -> bool {
        match self.scope {
            Scope::Path => self.regex.is_match(&artifact.path),
            Scope::Name { match_stem } => {
                self.regex.is_match(artifact.file_name())
                    || (match_stem && self.regex.is_match(artifact.file_stem()))
            }
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() * 2);
    regex.push('^');

    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    // `**/` also matches zero directories
                    regex.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    regex.push('$');
    regex
}
