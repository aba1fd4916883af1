//! Prompt template substitution
//!
//! Templates reference the result context with `{name}` or `{name.output}`
//! tokens. The `.output` suffix is cosmetic and stripped before lookup, so
//! `{summary.output}` and `{summary}` resolve to the same entry.

use crate::models::ResultContext;
use crate::{FlowError, Result};
use tracing::debug;

/// Substitute every placeholder in `template` using the result context.
///
/// Substitution is a single pass over the placeholders found in the original
/// template: placeholders appearing inside a substituted value are left as
/// literal text, which prevents runaway expansion.
///
/// # Errors
///
/// Returns [`FlowError::Template`] naming the missing key when a placeholder
/// has no context entry. No partial or default value is ever substituted.
pub fn render(template: &str, context: &ResultContext) -> Result<String> {
    let placeholder = regex::Regex::new(r"\{([^{}]+)\}")
        .map_err(|e| FlowError::Config(format!("invalid placeholder pattern: {e}")))?;

    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for cap in placeholder.captures_iter(template) {
        let token = match cap.get(0) {
            Some(m) => m,
            None => continue,
        };
        let name = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        let key = name.strip_suffix(".output").unwrap_or(name);

        let value = context.get(key).ok_or_else(|| FlowError::Template {
            placeholder: key.to_string(),
        })?;

        out.push_str(&template[last..token.start()]);
        out.push_str(value);
        last = token.end();
    }
    out.push_str(&template[last..]);

    debug!(
        template_len = template.len(),
        resolved_len = out.len(),
        "Resolved prompt template"
    );

    Ok(out)
}
