use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

impl SelectorAttrCondition {
    pub(crate) fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        match self {
            Self::Exists { key } => attrs.contains_key(key),
            Self::Eq { key, value } => attrs.get(key).map(String::as_str) == Some(value.as_str()),
            Self::StartsWith { key, value } => {
                attrs.get(key).is_some_and(|v| v.starts_with(value))
            }
            Self::EndsWith { key, value } => attrs.get(key).is_some_and(|v| v.ends_with(value)),
            Self::Contains { key, value } => attrs.get(key).is_some_and(|v| v.contains(value)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let mut groups = Vec::new();
    for part in split_selector_groups(selector)? {
        groups.push(parse_selector_chain(&part)?);
    }
    Ok(groups)
}

pub(crate) fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let tokens = tokenize_selector(selector)?;
    let mut parts: Vec<SelectorPart> = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokens {
        if token == ">" {
            if pending_combinator.is_some() || parts.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(SelectorCombinator::Child);
            continue;
        }
        if token == "+" || token == "~" {
            return Err(Error::UnsupportedSelector(selector.into()));
        }

        let step = parse_selector_step(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(
                pending_combinator
                    .take()
                    .unwrap_or(SelectorCombinator::Descendant),
            )
        };
        parts.push(SelectorPart { step, combinator });
    }

    if pending_combinator.is_some() || parts.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(parts)
}

fn split_selector_groups(selector: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        match ch {
            '\'' | '"' if in_brackets => {
                if quote == Some(ch) {
                    quote = None;
                } else if quote.is_none() {
                    quote = Some(ch);
                }
                current.push(ch);
            }
            '[' if quote.is_none() => {
                if in_brackets {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                in_brackets = true;
                current.push(ch);
            }
            ']' if quote.is_none() => {
                in_brackets = false;
                current.push(ch);
            }
            ',' if !in_brackets && quote.is_none() => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    out.push(current);

    if out.iter().any(|part| part.trim().is_empty()) {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(out)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' if in_brackets => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                if in_brackets {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                in_brackets = true;
                current.push(ch);
            }
            ']' => {
                if !in_brackets {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                in_brackets = false;
                current.push(ch);
            }
            c if c.is_whitespace() && !in_brackets => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '>' | '+' | '~' if !in_brackets => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
            _ => current.push(ch),
        }
    }

    if in_brackets || quote.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}

fn parse_selector_step(token: &str) -> Result<SelectorStep> {
    let mut step = SelectorStep::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0usize;

    if chars.first() == Some(&'*') {
        step.universal = true;
        i += 1;
    } else if chars.first().is_some_and(|c| is_ident_char(*c)) {
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        step.tag = Some(
            chars[start..i]
                .iter()
                .collect::<String>()
                .to_ascii_lowercase(),
        );
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                if start == i {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                step.id = Some(chars[start..i].iter().collect());
            }
            '.' => {
                i += 1;
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                if start == i {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                step.classes.push(chars[start..i].iter().collect());
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| Error::UnsupportedSelector(token.into()))?;
                let body: String = chars[i + 1..end].iter().collect();
                step.attrs.push(parse_attr_condition(&body, token)?);
                i = end + 1;
            }
            _ => return Err(Error::UnsupportedSelector(token.into())),
        }
    }

    if step.is_empty() {
        return Err(Error::UnsupportedSelector(token.into()));
    }
    Ok(step)
}

fn parse_attr_condition(body: &str, token: &str) -> Result<SelectorAttrCondition> {
    let body = body.trim();
    let Some(eq_at) = body.find('=') else {
        let key = body.trim();
        if key.is_empty() || !key.chars().all(is_ident_char) {
            return Err(Error::UnsupportedSelector(token.into()));
        }
        return Ok(SelectorAttrCondition::Exists { key: key.into() });
    };

    let (raw_key, raw_value) = body.split_at(eq_at);
    let raw_value = &raw_value[1..];
    let (key, op) = match raw_key.strip_suffix(['^', '$', '*']) {
        Some(key) => (key.trim(), raw_key.chars().next_back()),
        None => (raw_key.trim(), None),
    };
    if key.is_empty() || !key.chars().all(is_ident_char) {
        return Err(Error::UnsupportedSelector(token.into()));
    }

    let value = unquote_attr_value(raw_value.trim(), token)?;
    let key = key.to_string();
    Ok(match op {
        Some('^') => SelectorAttrCondition::StartsWith { key, value },
        Some('$') => SelectorAttrCondition::EndsWith { key, value },
        Some('*') => SelectorAttrCondition::Contains { key, value },
        _ => SelectorAttrCondition::Eq { key, value },
    })
}

fn unquote_attr_value(raw: &str, token: &str) -> Result<String> {
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            let inner = rest
                .strip_suffix(quote)
                .ok_or_else(|| Error::UnsupportedSelector(token.into()))?;
            return Ok(inner.to_string());
        }
    }
    Ok(raw.to_string())
}
