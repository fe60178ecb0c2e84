//! WebhookAdapters — thin per-platform translators: verify signature,
//! normalize to `InboundMessage`, hand off to the orchestrator, translate
//! the reply back. One trait per platform, since each channel here is a
//! stateless webhook request/response rather than a long-lived connection.

use flowline_store::Business;

use crate::error::Result;
use crate::types::NormalizedEvent;

pub trait WebhookAdapter: Send + Sync {
    /// Stable lowercase platform identifier, e.g. `"messenger"`.
    fn platform(&self) -> &'static str;

    /// Verifies the shared-secret HMAC-SHA256 signature over the raw body.
    /// Verification happens before any parsing, per the auth crate's
    /// "verify before parse" invariant.
    fn verify(&self, secret: &str, body: &[u8], signature_header: Option<&str>) -> Result<()>;

    /// Parses the raw body into the fields the core reads.
    fn parse_event(&self, body: &[u8]) -> Result<NormalizedEvent>;

    /// Resolves which business owns this event's recipient id.
    fn resolve_business(&self, store: &flowline_store::Store, event: &NormalizedEvent) -> Result<Business>;

    /// Handles the platform's `GET` verification challenge, if any.
    fn verification_challenge(&self, query: &std::collections::HashMap<String, String>) -> Option<String>;

    /// Builds the request body the platform's Send API expects. Sending it
    /// over HTTP is left to the deployment's own outbound client — the
    /// platform APIs themselves are treated as pluggable, external
    /// collaborators per the interface boundary.
    fn build_reply_payload(&self, recipient_platform_id: &str, reply: &str) -> serde_json::Value;
}
