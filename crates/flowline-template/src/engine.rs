//! Variable discovery and substitution — the template engine's core.
//!
//! Both syntactic forms, `{name}` and `{{name}}`, are accepted. The two
//! are modeled as separate alternatives (rather than optional braces)
//! so an unbalanced sequence like `{{name}` never matches either branch
//! and is left verbatim in the rendered output.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::registry::{RenderContext, VariableRegistry};

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_.]+)\}\}|\{([A-Za-z0-9_.]+)\}").expect("valid variable regex")
});

fn captured_name(caps: &Captures<'_>) -> &str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .expect("one alternative always matches")
}

/// Scans `content` + `system_prompt` for distinct variable names referenced
/// via either brace syntax. Order is not significant; callers persist the
/// resulting set as `TemplateVariableUsage` rows.
pub fn discover_variables(content: &str, system_prompt: Option<&str>) -> Vec<String> {
    let mut names = BTreeSet::new();
    for text in [Some(content), system_prompt].into_iter().flatten() {
        for caps in VARIABLE_RE.captures_iter(text) {
            names.insert(captured_name(&caps).to_string());
        }
    }
    names.into_iter().collect()
}

/// Literal, non-recursive substitution: each reference is replaced exactly
/// once with the provider's resolved value, or `[Missing: name]` if the
/// provider is unregistered or itself errors. Rendering is pure and never
/// fails the caller.
pub fn render_text(text: &str, ctx: &RenderContext, registry: &VariableRegistry) -> String {
    VARIABLE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let name = captured_name(caps);
            match registry.resolve(name, ctx) {
                Ok(value) => value,
                Err(_) => format!("[Missing: {name}]"),
            }
        })
        .into_owned()
}

/// Renders a template's `content` and `system_prompt` against `ctx`.
pub fn render(
    content: &str,
    system_prompt: Option<&str>,
    ctx: &RenderContext,
    registry: &VariableRegistry,
) -> (String, Option<String>) {
    let rendered_content = render_text(content, ctx, registry);
    let rendered_system = system_prompt.map(|s| render_text(s, ctx, registry));
    (rendered_content, rendered_system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VariableRegistry;
    use std::sync::Arc;

    fn test_ctx() -> RenderContext {
        RenderContext::bare()
    }

    #[test]
    fn discovers_both_brace_forms() {
        let names = discover_variables("Hi {user_name}, welcome to {{business_name}}!", None);
        assert_eq!(names, vec!["business_name".to_string(), "user_name".to_string()]);
    }

    #[test]
    fn discovers_across_content_and_system_prompt() {
        let names = discover_variables("{a}", Some("{{b}}"));
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn leaves_unbalanced_braces_verbatim() {
        let names = discover_variables("{{oops} and {also_oops}}", None);
        // `{also_oops}` is a balanced single-brace match inside the noise;
        // the stray braces around it are not part of any match.
        assert_eq!(names, vec!["also_oops".to_string()]);
    }

    #[test]
    fn substitutes_known_variable() {
        let mut registry = VariableRegistry::empty();
        registry.register("thing", Arc::new(|_ctx: &RenderContext| Ok("world".to_string())));
        let ctx = test_ctx();
        assert_eq!(render_text("hello {thing}", &ctx, &registry), "hello world");
        assert_eq!(render_text("hello {{thing}}", &ctx, &registry), "hello world");
    }

    #[test]
    fn missing_variable_yields_placeholder() {
        let registry = VariableRegistry::empty();
        let ctx = test_ctx();
        assert_eq!(render_text("hello {zzz}", &ctx, &registry), "hello [Missing: zzz]");
    }

    #[test]
    fn render_covers_system_prompt_too() {
        let mut registry = VariableRegistry::empty();
        registry.register("name", Arc::new(|_ctx: &RenderContext| Ok("Acme".to_string())));
        let ctx = test_ctx();
        let (content, system) = render("hi {name}", Some("sys {name}"), &ctx, &registry);
        assert_eq!(content, "hi Acme");
        assert_eq!(system.as_deref(), Some("sys Acme"));
    }
}
