//! Prompt templates for the three stages.
//!
//! Templates are Handlebars strings rendered without HTML escaping, so
//! embedded JSON reaches the model untouched and equal inputs always give
//! byte-identical prompts.

use handlebars::{no_escape, Handlebars, RenderError};
use serde::Serialize;
use std::sync::LazyLock;

/// Strategist template.
pub const STRATEGIST_TEMPLATE: &str = "\
You plan social media content. Be brief and concrete.

Topic: {{topic}}

Work out:
1. The main topic, restated in one sentence.
2. The target audience, described in one sentence.
3. Exactly {{angle_count}} distinct angles worth posting about.

Avoid generic advice.";

/// Creator template.
pub const CREATOR_TEMPLATE: &str = "\
You write short social media posts. Write exactly {{item_count}} posts.

Topic: {{topic}}

Content plan:
{{strategy}}

Each post must:
- be at most {{max_chars}} characters long
- open with a hook that stops the scroll
- give the reader something useful
- be tagged as educational, inspirational or entertaining

Mix the tags across the batch. Keep the wording tight.";

/// Optimizer template.
pub const OPTIMIZER_TEMPLATE: &str = "\
You edit social media posts before they go live.

Topic: {{topic}}

Draft posts:
{{items}}

Rewrite each draft so it has a sharper hook, cleaner formatting and no \
filler. Keep each post at most {{max_chars}} characters and keep its tag \
unless another tag clearly fits better. Return exactly {{item_count}} posts, \
then one paragraph of practical posting and engagement tips for the batch.";

static PROMPTS: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(no_escape);
    registry.set_strict_mode(true);
    registry
});

/// Renders `template` with `data`.
///
/// Strict mode: a placeholder without a matching value is an error rather
/// than an empty string.
pub fn render<T: Serialize>(template: &str, data: &T) -> Result<String, RenderError> {
    PROMPTS.render_template(template, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_does_not_escape_json() {
        let out = render(
            "Plan:\n{{strategy}}",
            &json!({"strategy": "{\n  \"audience\": \"owners & <staff>\"\n}"}),
        )
        .unwrap();
        assert_eq!(out, "Plan:\n{\n  \"audience\": \"owners & <staff>\"\n}");
    }

    #[test]
    fn test_render_missing_value_fails() {
        assert!(render(STRATEGIST_TEMPLATE, &json!({"topic": "AI"})).is_err());
    }

    #[test]
    fn test_values_are_not_rendered_as_templates() {
        let out = render("{{a}} {{b}}", &json!({"a": "{{b}}", "b": "y"})).unwrap();
        assert_eq!(out, "{{b}} y");
    }
}
