//! Chat formatting helpers

/// Discord's message length limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Wraps text in a code block.
pub fn boxed(text: &str) -> String {
    format!("```\n{}\n```", text)
}

/// Splits text into pages no longer than `page_len` characters, preferring
/// to break on newlines.
pub fn pagify(text: &str, page_len: usize) -> Vec<String> {
    let page_len = page_len.max(1);
    let mut pages = Vec::new();
    let mut rest = text;

    while rest.chars().count() > page_len {
        let limit = rest
            .char_indices()
            .nth(page_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = match rest[..limit].rfind('\n') {
            Some(i) if i > 0 => i,
            _ => limit,
        };
        let (page, tail) = rest.split_at(cut);
        if !page.trim().is_empty() {
            pages.push(page.to_string());
        }
        rest = tail.strip_prefix('\n').unwrap_or(tail);
    }
    if !rest.trim().is_empty() {
        pages.push(rest.to_string());
    }
    pages
}

/// `+5` / `-3`, or `N/A`
pub fn signed_or_na(value: Option<i64>) -> String {
    match value {
        Some(v) => format!("{:+}", v),
        None => "N/A".to_string(),
    }
}
