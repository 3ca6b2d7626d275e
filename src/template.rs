use std::collections::BTreeMap;

use lazy_regex::{regex, Captures};

use crate::error::ExecError;

#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: BTreeMap<&'static str, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.vars.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Replaces `{name}` placeholders. `{{` and `}}` produce literal braces.
pub fn substitute(template: &str, ctx: &Context) -> Result<String, ExecError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in regex!(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        match caps.get(1) {
            Some(name) => {
                let value = ctx
                    .get(name.as_str())
                    .ok_or_else(|| ExecError::UnknownVariable(name.as_str().to_string()))?;
                out.push_str(value);
            }
            None => out.push_str(&whole.as_str()[..1]),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Expands `${VAR}`, `$VAR` and `%VAR%`; unset variables stay as written.
pub fn expand_env(s: &str) -> String {
    regex!(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)|%([A-Za-z_][A-Za-z0-9_]*)%")
        .replace_all(s, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Whitespace split that keeps single- or double-quoted runs together.
pub fn split_args(s: &str) -> Result<Vec<String>, ExecError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    for ch in s.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err(ExecError::UnbalancedQuote(s.to_string()));
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}

pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|part| {
            if part.is_empty() || part.chars().any(char::is_whitespace) {
                format!("\"{}\"", part)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
