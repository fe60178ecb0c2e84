use flowline_core::ids::BusinessId;

/// Which credential authenticated the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// The master key — scoped to every business.
    Master,
    /// A single business's `internal_api_key`.
    Business,
}

/// Resolved identity of the caller, attached to the request by the auth
/// middleware and read by downstream handlers.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub business_id: Option<BusinessId>,
    pub auth_mode: AuthMode,
}

impl TenantContext {
    pub fn master() -> Self {
        Self {
            business_id: None,
            auth_mode: AuthMode::Master,
        }
    }

    pub fn business(business_id: BusinessId) -> Self {
        Self {
            business_id: Some(business_id),
            auth_mode: AuthMode::Business,
        }
    }

    /// True if this context may act on behalf of `target`. The master key
    /// may act for any business; a business key only for its own.
    pub fn may_act_for(&self, target: &BusinessId) -> bool {
        match self.auth_mode {
            AuthMode::Master => true,
            AuthMode::Business => self.business_id.as_ref() == Some(target),
        }
    }
}
