pub mod engine;
pub mod error;
pub mod registry;

pub use engine::{discover_variables, render, render_text};
pub use error::{ProviderError, ProviderResult, Result, TemplateError};
pub use registry::{Provider, RenderContext, VariableRegistry, BUILTIN_NAMES};

use flowline_store::{Store, Template};

/// Thin façade over `Store` + the free `engine` functions: discovers a
/// template's variables and persists `TemplateVariableUsage` in the same
/// transaction as the template write, discovery contract.
pub struct TemplateEngine {
    store: Store,
}

impl TemplateEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates a template, discovering and recording its variable usage.
    pub fn create_template(&self, template: &Template) -> Result<()> {
        let names = discover_variables(&template.content, template.system_prompt.as_deref());
        self.store.create_template(template, &names)?;
        Ok(())
    }

    /// Updates a template, rebuilding its variable usage from the new text.
    pub fn update_template(&self, template: &Template) -> Result<()> {
        let names = discover_variables(&template.content, template.system_prompt.as_deref());
        self.store.update_template(template, &names)?;
        Ok(())
    }

    /// Renders a template's content + system prompt against `ctx` using
    /// `registry`. Never fails — unresolvable variables become
    /// `[Missing: name]`.
    pub fn render(
        &self,
        template: &Template,
        ctx: &RenderContext,
        registry: &VariableRegistry,
    ) -> (String, Option<String>) {
        engine::render(&template.content, template.system_prompt.as_deref(), ctx, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowline_core::ids::{BusinessId, TemplateId, UserId};
    use flowline_store::{Business, TemplateType};

    fn store_with_business() -> (Store, BusinessId) {
        let store = Store::open(":memory:", 4, 1_000).unwrap();
        let business_id = BusinessId::new();
        store
            .create_business(&Business {
                business_id: business_id.clone(),
                business_name: "Acme".into(),
                owner_id: UserId::new(),
                internal_api_key: "key".into(),
                business_description: None,
                address: None,
                phone_number: None,
                website: None,
                fallback_reply: None,
                created_at: Utc::now(),
            })
            .unwrap();
        (store, business_id)
    }

    #[test]
    fn create_then_render_round_trips() {
        let (store, business_id) = store_with_business();
        let engine = TemplateEngine::new(store);
        let template = Template {
            template_id: TemplateId::new(),
            business_id,
            template_name: "Greeting".into(),
            template_type: TemplateType::ResponseGeneration,
            content: "Hello {user_name}, welcome to {{business_name}}!".into(),
            system_prompt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        engine.create_template(&template).unwrap();

        let registry = VariableRegistry::seeded();
        let mut ctx = RenderContext::bare();
        ctx.user_name = Some("Ana".to_string());
        ctx.business_name = "Acme".to_string();

        let (content, _system) = engine.render(&template, &ctx, &registry);
        assert_eq!(content, "Hello Ana, welcome to Acme!");
        assert!(!content.contains('{'));
    }
}
