//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Keep at most `max` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  let head = truncate_chars(s, max);
  if head.len() == s.len() { s.to_string() } else { format!("{}… ({} bytes total)", head, s.len()) }
}

/// History title derived from the source text when the caller gives none.
pub fn derive_title(explicit: Option<&str>, text: &str, prefix: &str) -> String {
  if let Some(t) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
    return t.to_string();
  }
  let first_line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
  let head = truncate_chars(first_line, 50);
  if head.is_empty() {
    prefix.to_string()
  } else if head.len() < first_line.len() {
    format!("{prefix}: {head}…")
  } else {
    format!("{prefix}: {head}")
  }
}
