use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use flowline_core::ids::BusinessId;
use flowline_store::Store;

use crate::error::{AuthError, Result};
use crate::master::verify_master_key;
use crate::rate_limit::RateLimiter;
use crate::tenant::TenantContext;

/// Aggregates everything needed to authenticate and rate-limit a request:
/// the store (for per-business key lookup), the master key, and the three
/// independent counters from the resource model (admin writes, message
/// ingress, global daily cap).
pub struct AuthGuard {
    store: Store,
    master_key: String,
    admin_writes: RateLimiter,
    message_ingress: RateLimiter,
    global_daily: RateLimiter,
}

impl AuthGuard {
    pub fn new(
        store: Store,
        master_key: String,
        admin_writes_per_min: usize,
        message_ingress_per_min: usize,
        global_per_day: usize,
    ) -> Self {
        Self {
            store,
            master_key,
            admin_writes: RateLimiter::new(admin_writes_per_min, Duration::from_secs(60)),
            message_ingress: RateLimiter::new(message_ingress_per_min, Duration::from_secs(60)),
            global_daily: RateLimiter::new(global_per_day, Duration::from_secs(86_400)),
        }
    }

    /// Admin surface: accepts the master key (header) or a business's own
    /// key, the latter scoped to that business only.
    pub fn authenticate_admin(&self, headers: &HeaderMap) -> Result<TenantContext> {
        let presented = bearer_or_api_key_header(headers).ok_or(AuthError::Unauthorized)?;

        if verify_master_key(&presented, &self.master_key) {
            return Ok(TenantContext::master());
        }

        let business = self
            .store
            .find_business_by_api_key(&presented)?
            .ok_or(AuthError::Unauthorized)?;
        Ok(TenantContext::business(business.business_id))
    }

    /// Like `authenticate_admin` but also accepts the `businessApiKey` cookie
    /// used by the web-chat widget, and folds in the admin-write rate limit.
    pub fn authenticate_admin_write(&self, headers: &HeaderMap) -> Result<TenantContext> {
        let ctx = self.authenticate_from_header_or_cookie(headers)?;
        let key = match &ctx.business_id {
            Some(id) => id.to_string(),
            None => "master".to_string(),
        };
        self.admin_writes.check(&key)?;
        Ok(ctx)
    }

    pub fn authenticate_from_header_or_cookie(&self, headers: &HeaderMap) -> Result<TenantContext> {
        if let Some(presented) = bearer_or_api_key_header(headers) {
            if verify_master_key(&presented, &self.master_key) {
                return Ok(TenantContext::master());
            }
            if let Some(business) = self.store.find_business_by_api_key(&presented)? {
                return Ok(TenantContext::business(business.business_id));
            }
        }
        if let Some(cookie_key) = cookie_value(headers, "businessApiKey") {
            if let Some(business) = self.store.find_business_by_api_key(&cookie_key)? {
                return Ok(TenantContext::business(business.business_id));
            }
        }
        Err(AuthError::Unauthorized)
    }

    /// Message ingress: the per-business ingress rate limit plus the global
    /// daily cap, the latter keyed by caller IP rather than shared across
    /// every caller.
    pub fn check_message_ingress(&self, business_id: &BusinessId, caller_ip: &str) -> Result<()> {
        self.message_ingress.check(&business_id.to_string())?;
        self.global_daily.check(caller_ip)?;
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

fn bearer_or_api_key_header(headers: &HeaderMap) -> Option<String> {
    if let Some(v) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = v.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let pair = pair.trim();
        let (k, v) = pair.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// axum middleware: authenticates the admin surface and attaches
/// `TenantContext` to request extensions for handlers to read.
pub async fn require_admin(
    State(guard): State<Arc<AuthGuard>>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, flowline_core::FlowlineError> {
    let ctx = guard.authenticate_from_header_or_cookie(req.headers())?;
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// axum middleware for mutating admin endpoints — same as `require_admin`
/// plus the admin-write rate limit.
pub async fn require_admin_write(
    State(guard): State<Arc<AuthGuard>>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, flowline_core::FlowlineError> {
    let ctx = guard.authenticate_admin_write(req.headers())?;
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// axum middleware for `POST /message` — business-scoped auth plus the
/// message-ingress rate limit, enforced before any Store or LLM work.
pub async fn require_message_ingress(
    State(guard): State<Arc<AuthGuard>>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, flowline_core::FlowlineError> {
    let caller_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let ctx = guard.authenticate_from_header_or_cookie(req.headers())?;
    if let Some(business_id) = &ctx.business_id {
        guard.check_message_ingress(business_id, &caller_ip)?;
    }
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
