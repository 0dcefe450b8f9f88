use crate::events::{EventLog, GovernanceEvent};
use crate::types::Role;
use crate::{GovernanceError, Result};
use grant_types::Principal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Role assignments and the global pause flag.
///
/// Only a SuperAdmin grants or revokes roles. The Executor role has a
/// single holder: granting it replaces the previous one.
pub struct AccessControlRegistry {
    roles: Arc<RwLock<HashMap<Role, BTreeSet<Principal>>>>,
    paused: Arc<RwLock<bool>>,
    events: Arc<EventLog>,
}

impl AccessControlRegistry {
    pub fn new(super_admin: Principal, events: Arc<EventLog>) -> Result<Self> {
        if super_admin.is_zero() {
            return Err(GovernanceError::NullPrincipal);
        }
        let mut roles = HashMap::new();
        roles.insert(Role::SuperAdmin, BTreeSet::from([super_admin]));

        info!(super_admin = %super_admin.short(), "🔐 Access control initialized");

        Ok(Self {
            roles: Arc::new(RwLock::new(roles)),
            paused: Arc::new(RwLock::new(false)),
            events,
        })
    }

    pub async fn has_role(&self, role: Role, who: &Principal) -> bool {
        self.roles
            .read()
            .await
            .get(&role)
            .map(|holders| holders.contains(who))
            .unwrap_or(false)
    }

    pub async fn require_role(&self, role: Role, who: &Principal) -> Result<()> {
        if self.has_role(role, who).await {
            Ok(())
        } else {
            warn!(principal = %who.short(), ?role, "⛔ Missing role");
            Err(GovernanceError::MissingRole {
                principal: *who,
                role,
            })
        }
    }

    pub async fn holders(&self, role: Role) -> Vec<Principal> {
        self.roles
            .read()
            .await
            .get(&role)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Principal currently trusted to trigger disbursement
    pub async fn executor(&self) -> Option<Principal> {
        self.roles
            .read()
            .await
            .get(&Role::Executor)
            .and_then(|holders| holders.iter().next().copied())
    }

    /// Returns false when `account` already held the role.
    pub async fn grant_role(
        &self,
        caller: &Principal,
        role: Role,
        account: Principal,
    ) -> Result<bool> {
        self.require_role(Role::SuperAdmin, caller).await?;
        if account.is_zero() {
            return Err(GovernanceError::NullPrincipal);
        }

        let mut roles = self.roles.write().await;
        let holders = roles.entry(role).or_default();
        if holders.contains(&account) {
            return Ok(false);
        }
        let replaced: Vec<Principal> = if role == Role::Executor {
            std::mem::take(holders).into_iter().collect()
        } else {
            Vec::new()
        };
        holders.insert(account);
        drop(roles);

        for previous in replaced {
            self.events
                .emit(GovernanceEvent::RoleRevoked {
                    role,
                    account: previous,
                    revoked_by: *caller,
                })
                .await;
            warn!(previous = %previous.short(), "🔄 Executor replaced");
        }
        self.events
            .emit(GovernanceEvent::RoleGranted {
                role,
                account,
                granted_by: *caller,
            })
            .await;

        info!(?role, account = %account.short(), by = %caller.short(), "🔑 Role granted");
        Ok(true)
    }

    /// Returns false when `account` did not hold the role.
    pub async fn revoke_role(
        &self,
        caller: &Principal,
        role: Role,
        account: Principal,
    ) -> Result<bool> {
        self.require_role(Role::SuperAdmin, caller).await?;

        let removed = self
            .roles
            .write()
            .await
            .get_mut(&role)
            .map(|holders| holders.remove(&account))
            .unwrap_or(false);
        if !removed {
            return Ok(false);
        }

        self.events
            .emit(GovernanceEvent::RoleRevoked {
                role,
                account,
                revoked_by: *caller,
            })
            .await;

        info!(?role, account = %account.short(), by = %caller.short(), "🔒 Role revoked");
        Ok(true)
    }

    pub async fn is_paused(&self) -> bool {
        *self.paused.read().await
    }

    pub async fn ensure_not_paused(&self) -> Result<()> {
        if self.is_paused().await {
            Err(GovernanceError::Paused)
        } else {
            Ok(())
        }
    }

    pub async fn pause(&self, caller: &Principal) -> Result<()> {
        self.set_paused(caller, true).await
    }

    pub async fn unpause(&self, caller: &Principal) -> Result<()> {
        self.set_paused(caller, false).await
    }

    async fn set_paused(&self, caller: &Principal, value: bool) -> Result<()> {
        self.require_role(Role::Admin, caller).await?;

        let mut paused = self.paused.write().await;
        if *paused == value {
            return Err(GovernanceError::PauseUnchanged(value));
        }
        *paused = value;
        drop(paused);

        let event = if value {
            GovernanceEvent::Paused { by: *caller }
        } else {
            GovernanceEvent::Unpaused { by: *caller }
        };
        self.events.emit(event).await;

        if value {
            warn!(by = %caller.short(), "⏸️ Governance paused");
        } else {
            info!(by = %caller.short(), "▶️ Governance resumed");
        }
        Ok(())
    }
}
