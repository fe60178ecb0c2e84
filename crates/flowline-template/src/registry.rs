//! VariableRegistry — a process-wide, read-only-after-startup table of
//! `name -> Provider(ctx) -> (value, err)`, seeded with the built-in
//! providers.
//!
//! A static-table-plus-lookup shape, but providers here are closures over
//! live `RenderContext` data rather than `&'static` records, since the
//! values they compute (stage list, recent messages, current time) aren't
//! known until render time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flowline_core::ids::{BusinessId, ConversationId, UserId};
use flowline_store::{Message, SenderType, Stage};

use crate::error::{ProviderError, ProviderResult};

/// A variable provider: computes one variable's value from the render
/// context. Boxed as `Arc<dyn Fn>` so the registry can be built once at
/// startup and shared read-only .
pub type Provider = Arc<dyn Fn(&RenderContext) -> ProviderResult + Send + Sync>;

/// Everything a provider might need to compute its value. Populated by the
/// orchestrator's Phase 0 context load before any template is rendered —
/// providers never reach back into the store themselves, keeping rendering
/// pure.
#[derive(Clone)]
pub struct RenderContext {
    pub business_id: BusinessId,
    pub business_name: String,
    pub business_info: String,
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub conversation_id: ConversationId,
    pub current_stage: Option<Stage>,
    pub stages: Vec<Stage>,
    pub recent_messages: Vec<Message>,
    pub user_message: String,
    pub agent_type: Option<String>,
    pub fields: Vec<String>,
    pub now: DateTime<Utc>,
    pub summary_of_last_conversations: Option<String>,
    /// Extracted-data fields merged in under their own names for Phase 3
    /// rendering, as extracted data is merged into the context
    /// under their field names". Checked after named providers so a
    /// business-defined field can never shadow a built-in.
    pub extra: HashMap<String, String>,
}

impl RenderContext {
    /// A minimal context with no populated fields, for unit tests that only
    /// exercise custom providers.
    pub fn bare() -> Self {
        Self {
            business_id: BusinessId::new(),
            business_name: String::new(),
            business_info: String::new(),
            user_id: UserId::new(),
            user_name: None,
            conversation_id: ConversationId::new(),
            current_stage: None,
            stages: Vec::new(),
            recent_messages: Vec::new(),
            user_message: String::new(),
            agent_type: None,
            fields: Vec::new(),
            now: Utc::now(),
            summary_of_last_conversations: None,
            extra: HashMap::new(),
        }
    }
}

/// The registry itself: a plain `HashMap` built at startup via `seeded()`
/// and then handed out by shared reference. `register` exists for startup
/// wiring only; nothing in this crate mutates a registry once it's behind
/// an `Arc`.
pub struct VariableRegistry {
    providers: HashMap<String, Provider>,
}

impl VariableRegistry {
    /// Empty registry with no providers — useful for focused unit tests.
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry seeded with every built-in provider. `Register(name,
    /// provider)` duplicates replace prior registration, so callers may
    /// still override a built-in before the registry is shared.
    pub fn seeded() -> Self {
        let mut registry = Self::empty();
        for (name, provider) in builtin_providers() {
            registry.providers.insert(name.to_string(), provider);
        }
        registry
    }

    /// Adds or replaces a provider. Intended for startup wiring only — see
    /// read-only-after-startup requirement.
    pub fn register(&mut self, name: &str, provider: Provider) {
        self.providers.insert(name.to_string(), provider);
    }

    /// Resolves `name` against `ctx`. Falls back to the dynamic
    /// `last_N_messages` family when no
    /// exact registration exists.
    pub fn resolve(&self, name: &str, ctx: &RenderContext) -> ProviderResult {
        if let Some(provider) = self.providers.get(name) {
            return provider(ctx);
        }
        if let Some(value) = ctx.extra.get(name) {
            return Ok(value.clone());
        }
        if let Some(n) = parse_last_n_messages(name) {
            return Ok(last_n_messages(ctx, n));
        }
        Err(ProviderError::Unknown(name.to_string()))
    }
}

fn parse_last_n_messages(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("last_")?.strip_suffix("_messages")?;
    digits.parse().ok()
}

fn last_n_messages(ctx: &RenderContext, n: usize) -> String {
    ctx.recent_messages
        .iter()
        .rev()
        .take(n)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(format_message)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_message(m: &Message) -> String {
    let speaker = match m.sender_type {
        SenderType::User => "User",
        SenderType::Assistant | SenderType::Ai => "Assistant",
        SenderType::Staff => "Staff",
    };
    format!("{speaker}: {}", m.message_content)
}

fn stage_names_json(stages: &[Stage]) -> String {
    let names: Vec<String> = stages.iter().map(|s| format!("\"{}\"", s.stage_name)).collect();
    format!("[{}]", names.join(", "))
}

fn available_stages(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|s| {
            let description = s.stage_description.as_deref().unwrap_or("");
            format!("{}: {}", s.stage_name, description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn conversation_history(messages: &[Message]) -> String {
    messages.iter().map(format_message).collect::<Vec<_>>().join("\n")
}

fn user_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.sender_type == SenderType::User)
        .map(|m| m.message_content.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Names seeded by `builtin_providers` — used by callers that need to tell
/// a template-discovered variable apart from a built-in one (e.g. Phase 2's
/// "fields" list, which should list only the extraction fields a template
/// author defined, not the ambient context variables).
pub const BUILTIN_NAMES: &[&str] = &[
    "stage_list",
    "available_stages",
    "conversation_history",
    "summary_of_last_conversations",
    "last_10_messages",
    "user_name",
    "business_name",
    "business_info",
    "current_time",
    "current_date",
    "user_message",
    "message_content",
    "user_messages",
    "fields",
    "current_stage",
    "agent_type",
];

/// Every built-in provider, as `(name, provider)` pairs.
fn builtin_providers() -> Vec<(&'static str, Provider)> {
    vec![
        (
            "stage_list",
            arc_provider(|ctx| Ok(stage_names_json(&ctx.stages))),
        ),
        (
            "available_stages",
            arc_provider(|ctx| Ok(available_stages(&ctx.stages))),
        ),
        (
            "conversation_history",
            arc_provider(|ctx| Ok(conversation_history(&ctx.recent_messages))),
        ),
        (
            "summary_of_last_conversations",
            arc_provider(|ctx| {
                Ok(ctx
                    .summary_of_last_conversations
                    .clone()
                    .unwrap_or_else(|| conversation_history(&ctx.recent_messages)))
            }),
        ),
        (
            "last_10_messages",
            arc_provider(|ctx| Ok(last_n_messages(ctx, 10))),
        ),
        (
            "user_name",
            arc_provider(|ctx| Ok(ctx.user_name.clone().unwrap_or_else(|| "Guest".to_string()))),
        ),
        ("business_name", arc_provider(|ctx| Ok(ctx.business_name.clone()))),
        ("business_info", arc_provider(|ctx| Ok(ctx.business_info.clone()))),
        (
            "current_time",
            arc_provider(|ctx| Ok(ctx.now.format("%H:%M:%S UTC").to_string())),
        ),
        (
            "current_date",
            arc_provider(|ctx| Ok(ctx.now.format("%Y-%m-%d").to_string())),
        ),
        ("user_message", arc_provider(|ctx| Ok(ctx.user_message.clone()))),
        ("message_content", arc_provider(|ctx| Ok(ctx.user_message.clone()))),
        (
            "user_messages",
            arc_provider(|ctx| Ok(user_messages(&ctx.recent_messages))),
        ),
        (
            "fields",
            arc_provider(|ctx| Ok(format!("[{}]", ctx.fields.join(", ")))),
        ),
        (
            "current_stage",
            arc_provider(|ctx| {
                Ok(ctx
                    .current_stage
                    .as_ref()
                    .map(|s| s.stage_name.clone())
                    .unwrap_or_default())
            }),
        ),
        (
            "agent_type",
            arc_provider(|ctx| Ok(ctx.agent_type.clone().unwrap_or_default())),
        ),
    ]
}

fn arc_provider<F>(f: F) -> Provider
where
    F: Fn(&RenderContext) -> ProviderResult + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_name_falls_back_to_guest() {
        let registry = VariableRegistry::seeded();
        let ctx = RenderContext::bare();
        assert_eq!(registry.resolve("user_name", &ctx).unwrap(), "Guest");
    }

    #[test]
    fn dynamic_last_n_messages() {
        let registry = VariableRegistry::seeded();
        let mut ctx = RenderContext::bare();
        ctx.recent_messages = vec![
            Message {
                message_id: flowline_core::ids::MessageId::new(),
                conversation_id: ctx.conversation_id.clone(),
                message_content: "hi".to_string(),
                sender_type: SenderType::User,
                created_at: ctx.now,
            },
            Message {
                message_id: flowline_core::ids::MessageId::new(),
                conversation_id: ctx.conversation_id.clone(),
                message_content: "hello!".to_string(),
                sender_type: SenderType::Assistant,
                created_at: ctx.now,
            },
        ];
        let rendered = registry.resolve("last_5_messages", &ctx).unwrap();
        assert_eq!(rendered, "User: hi\nAssistant: hello!");
    }

    #[test]
    fn register_overrides_builtin() {
        let mut registry = VariableRegistry::seeded();
        registry.register("business_name", arc_provider(|_| Ok("Overridden".to_string())));
        let ctx = RenderContext::bare();
        assert_eq!(registry.resolve("business_name", &ctx).unwrap(), "Overridden");
    }

    #[test]
    fn unknown_variable_errors() {
        let registry = VariableRegistry::seeded();
        let ctx = RenderContext::bare();
        assert!(matches!(
            registry.resolve("totally_unknown", &ctx),
            Err(ProviderError::Unknown(_))
        ));
    }
}
