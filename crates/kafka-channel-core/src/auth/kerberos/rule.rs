//! A single `auth_to_local` rule.
//!
//! # Rule Syntax
//!
//! - `DEFAULT` - strip the realm when it equals the default realm
//! - `RULE:[n:format](match)s/from/to/g/L` - where everything after
//!   `[n:format]` is optional
//!
//! `n` is the number of name components the rule applies to. `format` builds
//! the base string: `$0` is the realm, `$1` the first component and `$2` the
//! second. `(match)` must match the whole base. `s/from/to/` replaces the first
//! occurrence of `from` (every occurrence with `g`). A trailing `L` or `U` folds
//! the result to lower or upper case.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::ShortNameError;

fn rule_parser() -> &'static Regex {
    static PARSER: OnceLock<Regex> = OnceLock::new();
    PARSER.get_or_init(|| {
        Regex::new(
            r"^((DEFAULT)|(RULE:\[(\d*):([^\]]*)\](\(([^)]*)\))?(s/([^/]*)/([^/]*)/(g)?)?/?(L|U)?))",
        )
        .expect("valid regex")
    })
}

/// Case folding applied to a rule's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    /// Convert to lowercase.
    Lower,
    /// Convert to uppercase.
    Upper,
}

#[derive(Debug, Clone)]
struct Substitution {
    from: Regex,
    to: String,
    global: bool,
}

#[derive(Debug, Clone)]
enum RuleKind {
    Default,
    Pattern {
        num_components: usize,
        format: String,
        match_pattern: Option<Regex>,
        substitution: Option<Substitution>,
    },
}

/// A compiled principal mapping rule.
#[derive(Debug, Clone)]
pub struct KerberosRule {
    text: String,
    default_realm: String,
    kind: RuleKind,
    case_transform: Option<CaseTransform>,
}

impl KerberosRule {
    /// The `DEFAULT` rule for the given realm.
    #[must_use]
    pub fn default_rule(default_realm: &str) -> Self {
        Self {
            text: "DEFAULT".to_string(),
            default_realm: default_realm.to_string(),
            kind: RuleKind::Default,
            case_transform: None,
        }
    }

    /// Parse one rule string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleSyntax` naming the rule if it does not follow the
    /// grammar, has trailing text, or embeds an invalid regex.
    pub fn parse(default_realm: &str, rule: &str) -> Result<Self, ShortNameError> {
        let text = rule.trim();
        let invalid = |reason: String| ShortNameError::InvalidRuleSyntax {
            rule: text.to_string(),
            reason,
        };

        let caps = rule_parser()
            .captures(text)
            .ok_or_else(|| invalid("expected DEFAULT or RULE:[n:format]...".to_string()))?;

        let matched_len = caps.get(0).map_or(0, |m| m.end());
        if matched_len != text.len() {
            return Err(invalid(format!(
                "unmatched substring `{}`",
                &text[matched_len..]
            )));
        }

        if caps.get(2).is_some() {
            return Ok(Self::default_rule(default_realm));
        }

        let num_components: usize = caps[4]
            .parse()
            .map_err(|_| invalid(format!("bad component count `{}`", &caps[4])))?;

        let match_pattern = caps
            .get(7)
            .map(|m| {
                Regex::new(&format!("^(?:{})$", m.as_str()))
                    .map_err(|e| invalid(format!("bad match pattern: {e}")))
            })
            .transpose()?;

        let substitution = match (caps.get(8), caps.get(9), caps.get(10)) {
            (Some(_), Some(from), Some(to)) => Some(Substitution {
                from: Regex::new(from.as_str())
                    .map_err(|e| invalid(format!("bad substitution pattern: {e}")))?,
                to: rust_replacement(to.as_str()),
                global: caps.get(11).is_some(),
            }),
            _ => None,
        };

        let case_transform = match caps.get(12).map(|m| m.as_str()) {
            Some("L") => Some(CaseTransform::Lower),
            Some("U") => Some(CaseTransform::Upper),
            _ => None,
        };

        Ok(Self {
            text: text.to_string(),
            default_realm: default_realm.to_string(),
            kind: RuleKind::Pattern {
                num_components,
                format: caps[5].to_string(),
                match_pattern,
                substitution,
            },
            case_transform,
        })
    }

    /// Whether this is the `DEFAULT` rule.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self.kind, RuleKind::Default)
    }

    /// Apply the rule to `[realm, component1, component2?]`.
    ///
    /// Returns `Ok(None)` when the rule does not apply.
    ///
    /// # Errors
    ///
    /// Returns `BadFormatString` for out-of-range `$n` references and
    /// `NonSimpleName` when the result still contains `/` or `@`.
    pub fn apply(&self, params: &[&str]) -> Result<Option<String>, ShortNameError> {
        let result = match &self.kind {
            RuleKind::Default => (params.first() == Some(&self.default_realm.as_str()))
                .then(|| params.get(1).map(|s| (*s).to_string()))
                .flatten(),
            RuleKind::Pattern {
                num_components,
                format,
                match_pattern,
                substitution,
            } => {
                if params.len().saturating_sub(1) != *num_components {
                    return Ok(None);
                }
                let base = replace_parameters(format, params)?;
                if match_pattern.as_ref().map_or(true, |re| re.is_match(&base)) {
                    Some(match substitution {
                        Some(sub) if sub.global => {
                            sub.from.replace_all(&base, sub.to.as_str()).into_owned()
                        }
                        Some(sub) => sub.from.replacen(&base, 1, sub.to.as_str()).into_owned(),
                        None => base,
                    })
                } else {
                    None
                }
            }
        };

        let Some(result) = result else {
            return Ok(None);
        };

        if result.contains('/') || result.contains('@') {
            return Err(ShortNameError::NonSimpleName {
                name: result,
                rule: self.text.clone(),
            });
        }

        Ok(Some(match self.case_transform {
            Some(CaseTransform::Lower) => result.to_lowercase(),
            Some(CaseTransform::Upper) => result.to_uppercase(),
            None => result,
        }))
    }
}

impl fmt::Display for KerberosRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Expand `$n` references in a rule format.
fn replace_parameters(format: &str, params: &[&str]) -> Result<String, ShortNameError> {
    let mut result = String::with_capacity(format.len());
    let mut chars = format.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let start = pos + 1;
        let mut end = start;
        while let Some(&(i, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = i + d.len_utf8();
            chars.next();
        }

        let digits = &format[start..end];
        let index: usize = digits
            .parse()
            .map_err(|_| ShortNameError::BadFormatString(format!("`${digits}` in {format}")))?;
        let param = params.get(index).ok_or_else(|| {
            ShortNameError::BadFormatString(format!(
                "index {index} from {format} is outside of the valid range 0 to {}",
                params.len().saturating_sub(1)
            ))
        })?;
        result.push_str(param);
    }

    Ok(result)
}

/// Rewrite an `s/from/to/` replacement so `$1x` means group 1 followed by `x`.
fn rust_replacement(to: &str) -> String {
    let mut out = String::with_capacity(to.len() + 4);
    let mut chars = to.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('$') => out.push_str("$$"),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                out.push_str("${");
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    out.push(d);
                    chars.next();
                }
                out.push('}');
            }
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }

    out
}
