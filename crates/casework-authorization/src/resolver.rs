//! Capability resolution.
//!
//! Inputs, highest precedence first:
//!
//! 1. scopes from an external token authority (`admin:all` short-circuits),
//! 2. the active role, when the user picked one of their assigned roles,
//! 3. the union of every assigned role, expanded through the hierarchy.
//!
//! Role grants only apply when the deployment has no external authority.
//! With one, a failed or still-pending scope fetch yields no capabilities.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use casework_core::config::AuthorizationConfig;
use casework_core::effects::AbortSignal;
use casework_core::errors::CaseworkError;
use casework_core::reactive::{Dynamic, Subscription};
use casework_sync::{FetchOutcome, RequestSlot, ResourceKey, SyncContext};

use crate::active_role::ActiveRoleStore;
use crate::capabilities::Capabilities;
use crate::role::SystemRole;
use crate::scope::{decode_scopes, PermissionScope};

// ============================================================================
// Pure Derivation
// ============================================================================

/// Where the scope list stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScopeState {
    /// No external authority; roles decide
    #[default]
    NotConfigured,
    /// Authority configured, scopes not fetched yet
    Pending,
    /// Scopes as returned by the authority
    Loaded(Vec<PermissionScope>),
    /// The scope fetch failed
    Failed(String),
}

/// Deployment switches that change derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverPolicy {
    /// An authority answering with no scopes falls back to roles
    pub empty_scopes_use_roles: bool,
}

impl From<&AuthorizationConfig> for ResolverPolicy {
    fn from(config: &AuthorizationConfig) -> Self {
        Self {
            empty_scopes_use_roles: config.empty_scopes_use_roles,
        }
    }
}

/// Role-based grants. An active role that is not assigned is ignored.
pub fn role_capabilities(roles: &[SystemRole], active: Option<SystemRole>) -> Capabilities {
    match active.filter(|role| roles.contains(role)) {
        Some(role) => Capabilities::for_role_expanded(role),
        None => roles
            .iter()
            .map(|role| Capabilities::for_role_expanded(*role))
            .fold(Capabilities::none(), Capabilities::merge),
    }
}

/// Capabilities for one set of inputs. No side effects.
pub fn derive_capabilities(
    scopes: &ScopeState,
    roles: &[SystemRole],
    active: Option<SystemRole>,
    policy: ResolverPolicy,
) -> Capabilities {
    match scopes {
        ScopeState::NotConfigured => role_capabilities(roles, active),
        ScopeState::Pending | ScopeState::Failed(_) => Capabilities::none(),
        ScopeState::Loaded(list) if list.is_empty() => {
            if policy.empty_scopes_use_roles {
                role_capabilities(roles, active)
            } else {
                Capabilities::none()
            }
        }
        ScopeState::Loaded(list) => {
            if list.iter().any(PermissionScope::is_admin) {
                return Capabilities::all();
            }
            list.iter()
                .map(PermissionScope::grants)
                .fold(Capabilities::none(), Capabilities::merge)
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoKey {
    scopes: ScopeState,
    roles: Vec<SystemRole>,
    active: Option<SystemRole>,
}

#[derive(Debug, Default)]
struct Inputs {
    scopes: ScopeState,
    roles: Vec<SystemRole>,
}

/// Owns the resolver inputs and publishes the derived capabilities.
pub struct CapabilityResolver {
    external_authority: bool,
    policy: ResolverPolicy,
    inputs: Mutex<Inputs>,
    active: ActiveRoleStore,
    active_seen: Mutex<Subscription<Option<SystemRole>>>,
    memo: Mutex<Option<(MemoKey, Capabilities)>>,
    recomputes: AtomicU64,
    published: Dynamic<Capabilities>,
    scope_error: Dynamic<Option<CaseworkError>>,
    slot: Arc<RequestSlot>,
}

impl std::fmt::Debug for CapabilityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityResolver")
            .field("external_authority", &self.external_authority)
            .field("policy", &self.policy)
            .field("inputs", &*self.inputs.lock())
            .field("recomputes", &self.recompute_count())
            .finish_non_exhaustive()
    }
}

impl CapabilityResolver {
    /// Resolver for `roles`, watching `active`.
    pub fn new(
        config: &AuthorizationConfig,
        active: ActiveRoleStore,
        roles: Vec<SystemRole>,
    ) -> Self {
        let scopes = if config.external_authority {
            ScopeState::Pending
        } else {
            ScopeState::NotConfigured
        };
        let resolver = Self {
            external_authority: config.external_authority,
            policy: ResolverPolicy::from(config),
            inputs: Mutex::new(Inputs { scopes, roles }),
            active_seen: Mutex::new(active.subscribe()),
            active,
            memo: Mutex::new(None),
            recomputes: AtomicU64::new(0),
            published: Dynamic::new(Capabilities::none()),
            scope_error: Dynamic::new(None),
            slot: Arc::new(RequestSlot::new("scopes")),
        };
        resolver.capabilities();
        resolver
    }

    /// Current capabilities, recomputed only when an input changed.
    pub fn capabilities(&self) -> Capabilities {
        let key = {
            let inputs = self.inputs.lock();
            let mut roles = inputs.roles.clone();
            roles.sort();
            roles.dedup();
            MemoKey {
                scopes: inputs.scopes.clone(),
                roles,
                active: self.active.current(),
            }
        };

        let mut memo = self.memo.lock();
        if let Some((cached_key, caps)) = memo.as_ref() {
            if *cached_key == key {
                return *caps;
            }
        }

        let caps = derive_capabilities(&key.scopes, &key.roles, key.active, self.policy);
        let count = self.recomputes.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            recompute = count,
            active_role = ?key.active,
            roles = key.roles.len(),
            granted = caps.granted().len(),
            "capabilities recomputed"
        );
        *memo = Some((key, caps));
        drop(memo);

        self.published.set_if_changed(caps);
        caps
    }

    /// Replace the assigned roles.
    pub fn set_roles(&self, roles: Vec<SystemRole>) {
        self.inputs.lock().roles = roles;
        self.capabilities();
    }

    fn set_scopes(&self, scopes: ScopeState) {
        self.inputs.lock().scopes = scopes;
        self.capabilities();
    }

    /// Fetch scopes from the authority.
    ///
    /// `Skipped` when no authority is configured. A failure leaves every
    /// capability off and is exposed through [`scope_error`](Self::scope_error).
    pub async fn load_scopes(&self, ctx: &SyncContext) -> FetchOutcome {
        if !self.external_authority {
            return FetchOutcome::Skipped;
        }
        let ticket = self.slot.begin(ResourceKey::new("scopes"));
        let path = ctx.paths().scopes();
        let result = ctx
            .fetch(&path, ticket.signal(), "Failed to fetch permissions")
            .await
            .and_then(decode_scopes);

        if !self.slot.finish(&ticket) {
            return FetchOutcome::Superseded;
        }
        match result {
            Ok(scopes) => {
                tracing::info!(count = scopes.len(), "permission scopes loaded");
                self.scope_error.set_if_changed(None);
                self.set_scopes(ScopeState::Loaded(scopes));
                FetchOutcome::Landed
            }
            Err(err) if err.is_cancellation() => FetchOutcome::Superseded,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "permission scope fetch failed, capabilities fail closed"
                );
                self.set_scopes(ScopeState::Failed(err.message().to_string()));
                self.scope_error.set(Some(err));
                FetchOutcome::Failed
            }
        }
    }

    /// Abort an in-flight scope fetch. Scopes stay as they were.
    pub fn cancel_scopes(&self) {
        self.slot.cancel();
    }

    /// Recompute if the active role changed since the last check.
    pub fn sync_active_role(&self) -> bool {
        let changed = self.active_seen.lock().poll().is_some();
        if changed {
            self.capabilities();
        }
        changed
    }

    /// Follow active-role changes until `signal` aborts.
    pub async fn watch_active_role(&self, signal: AbortSignal) {
        let mut changes = self.active.subscribe();
        while let Some(role) = signal.run(changes.changed()).await {
            tracing::debug!(active_role = ?role, "active role changed");
            self.active_seen.lock().poll();
            self.capabilities();
        }
    }

    // ─── State ───────────────────────────────────────────────

    /// Outcome of the last scope load.
    pub fn scope_state(&self) -> ScopeState {
        self.inputs.lock().scopes.clone()
    }

    /// Transport error behind a failed scope load.
    pub fn scope_error(&self) -> Option<CaseworkError> {
        self.scope_error.get()
    }

    /// Assigned roles, as last set.
    pub fn roles(&self) -> Vec<SystemRole> {
        self.inputs.lock().roles.clone()
    }

    /// The role selection this resolver reads.
    pub fn active_roles(&self) -> &ActiveRoleStore {
        &self.active
    }

    /// Number of times capabilities were actually derived.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }

    /// Subscribe to recomputed capabilities.
    pub fn subscribe(&self) -> Subscription<Capabilities> {
        self.published.subscribe()
    }
}
