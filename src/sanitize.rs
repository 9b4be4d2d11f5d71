/// Removes every `<...>` delimited span from `value`, keeping the text in
/// between. Unterminated tags are dropped through to the end of the input,
/// matching the greedy-removal behavior callers rely on for free-text fields.
pub fn strip_tags(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for c in value.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Strips tags and collapses the result to `None` when nothing is left.
/// Optional notification fields are only stored when non-empty.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| strip_tags(&v)).filter(|v| !v.is_empty())
}
