/// Removes markdown code fences from model output.
///
/// Every ```` ``` ```` marker is dropped wherever it appears, together with a
/// language tag (`json`, `JSON`, `javascript`, ...) that directly follows an
/// opening fence. The tag must end at whitespace or end of text, or run
/// straight into the `{`/`[` that opens the body. The result is trimmed.
/// Running it twice gives the same result as running it once.
///
/// No JSON repair happens here.
pub fn sanitize(raw: &str) -> String {
    strip_fences(raw).trim().to_string()
}

const FENCE: &str = "```";

fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = skip_language_tag(&rest[pos + FENCE.len()..]);
    }
    out.push_str(rest);
    out
}

fn skip_language_tag(after_fence: &str) -> &str {
    let tag_len = after_fence
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')))
        .unwrap_or(after_fence.len());
    if tag_len == 0 {
        return after_fence;
    }

    let tail = &after_fence[tag_len..];
    match tail.chars().next() {
        None => tail,
        Some(c) if c.is_whitespace() || matches!(c, '{' | '[') => tail,
        Some(_) => after_fence,
    }
}
