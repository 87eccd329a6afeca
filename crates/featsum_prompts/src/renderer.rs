//! Placeholder substitution.

/// Replace the first occurrence of each `{name}` token in `template`.
///
/// Positions are resolved against the original template, so the result does
/// not depend on the order of `values`, and inserted text is never searched
/// for further tokens. Tokens missing from the template are ignored; tokens
/// in the template without a value are left as-is.
pub fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    let mut hits: Vec<(usize, usize, &str)> = values
        .iter()
        .filter_map(|(name, value)| {
            let token = format!("{{{}}}", name);
            template.find(&token).map(|pos| (pos, token.len(), *value))
        })
        .collect();
    hits.sort_by_key(|(pos, _, _)| *pos);

    let extra: usize = hits.iter().map(|(_, _, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut cursor = 0;

    for (pos, len, value) in hits {
        if pos < cursor {
            continue;
        }
        out.push_str(&template[cursor..pos]);
        out.push_str(value);
        cursor = pos + len;
    }
    out.push_str(&template[cursor..]);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_first_occurrence_only() {
        let rendered = substitute("{topic} / {topic}", &[("topic", "Wellbeing")]);
        assert_eq!(rendered, "Wellbeing / {topic}");
    }

    #[test]
    fn test_substitute_is_order_independent() {
        let template = "Тема: {topic}\nДанные:\n{data}";
        let a = substitute(template, &[("topic", "Звук"), ("data", "row {topic}")]);
        let b = substitute(template, &[("data", "row {topic}"), ("topic", "Звук")]);
        assert_eq!(a, b);
        assert_eq!(a, "Тема: Звук\nДанные:\nrow {topic}");
    }

    #[test]
    fn test_substitute_unknown_and_missing_tokens() {
        let rendered = substitute("{a} {b}", &[("a", "1"), ("c", "3")]);
        assert_eq!(rendered, "1 {b}");
    }
}
