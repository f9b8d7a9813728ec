//! Fenced-code-block extraction from model replies.

use std::sync::OnceLock;

use regex::Regex;

/// First fence tagged as TypeScript.
fn tagged_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:typescript|ts)[ \t]*\n(.*?)```").unwrap())
}

/// First fence of any kind (tagged or not).
fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\n(.*?)```").unwrap())
}

/// Pull the first usable code block out of a model reply.
///
/// Prefers the first fence tagged `typescript`/`ts`; falls back to the
/// first fence of any kind. Matching is non-greedy, so the first closing
/// fence wins and nested fences are not supported. Returns `None` when no
/// fence exists or the block is empty after trimming.
pub fn extract_code(response: &str) -> Option<String> {
    let block = tagged_fence()
        .captures(response)
        .or_else(|| any_fence().captures(response))
        .map(|caps| caps[1].trim().to_string())?;
    if block.is_empty() { None } else { Some(block) }
}
