//! Idempotent bootstrap data: builtin permissions, the two builtin roles and
//! an optional administrator account.

use thiserror::Error;
use tracing::instrument;

use roster_auth::permissions::{ATTENDANCE_VIEW, BUILTIN};
use roster_auth::{
    hash_password, NewPermission, NewRole, NewUser, PasswordError, Permission, Role, RoleKind,
};

use crate::config::SeedAdmin;
use crate::store::{RbacStore, StoreError, Stores, UserStore};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Bring the stores up to the builtin baseline. Safe to run on every start.
#[instrument(skip_all, err)]
pub async fn seed(stores: &Stores, admin: Option<&SeedAdmin>) -> Result<(), SeedError> {
    let rbac = stores.rbac.as_ref();

    let mut builtin = Vec::with_capacity(BUILTIN.len());
    for (code, name, description) in BUILTIN {
        builtin.push(ensure_permission(rbac, code, name, description).await?);
    }

    let admin_role = ensure_role(rbac, RoleKind::Admin, "Full access").await?;
    for permission in &builtin {
        ensure_attached(rbac, &admin_role, permission).await?;
    }

    let user_role = ensure_role(rbac, RoleKind::User, "Regular staff member").await?;
    if let Some(view) = builtin.iter().find(|p| p.code == ATTENDANCE_VIEW) {
        ensure_attached(rbac, &user_role, view).await?;
    }

    if let Some(admin) = admin {
        ensure_admin(stores.users.as_ref(), admin).await?;
    }

    Ok(())
}

async fn ensure_permission(
    rbac: &dyn RbacStore,
    code: roster_auth::PermissionCode,
    name: &str,
    description: &str,
) -> Result<Permission, StoreError> {
    if let Some(existing) = rbac.find_permission_by_code(code.as_str()).await? {
        return Ok(existing);
    }
    tracing::info!(%code, "seeding permission");
    rbac.create_permission(NewPermission {
        code,
        name: name.to_string(),
        description: Some(description.to_string()),
    })
    .await
}

async fn ensure_role(
    rbac: &dyn RbacStore,
    kind: RoleKind,
    description: &str,
) -> Result<Role, StoreError> {
    if let Some(existing) = rbac.find_role_by_name(kind.as_str()).await? {
        return Ok(existing);
    }
    tracing::info!(role = %kind, "seeding role");
    rbac.create_role(NewRole {
        name: kind.as_str().to_string(),
        description: Some(description.to_string()),
    })
    .await
}

async fn ensure_attached(
    rbac: &dyn RbacStore,
    role: &Role,
    permission: &Permission,
) -> Result<(), StoreError> {
    match rbac.attach_permission(role.id, permission.id).await {
        Ok(()) | Err(StoreError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

async fn ensure_admin(users: &dyn UserStore, admin: &SeedAdmin) -> Result<(), SeedError> {
    if users.find_by_username(&admin.username).await?.is_some() {
        return Ok(());
    }
    tracing::info!(username = %admin.username, "seeding admin user");
    users
        .create(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password)?,
            role: RoleKind::Admin,
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_auth::permissions::{ATTENDANCE_MANAGE, ROLE_MANAGE};
    use roster_auth::{resolve, verify_password};
    use roster_core::Page;

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let stores = Stores::in_memory();
        let admin = SeedAdmin {
            username: "root".into(),
            email: "root@example.com".into(),
            password: "rootpass".into(),
        };

        seed(&stores, Some(&admin)).await.unwrap();
        seed(&stores, Some(&admin)).await.unwrap();

        let permissions = stores.rbac.list_permissions(Page::default()).await.unwrap();
        assert_eq!(permissions.len(), 3);
        let roles = stores.rbac.list_roles(Page::default()).await.unwrap();
        assert_eq!(roles.len(), 2);
        let users = stores.users.list(Page::default()).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin());
        assert!(verify_password("rootpass", &users[0].password_hash));
    }

    #[tokio::test]
    async fn builtin_roles_resolve_to_expected_codes() {
        let stores = Stores::in_memory();
        seed(&stores, None).await.unwrap();

        let admin = resolve(stores.rbac.as_ref(), "admin").await.unwrap();
        assert_eq!(admin.len(), 3);
        assert!(admin.contains(&ROLE_MANAGE));
        assert!(admin.contains(&ATTENDANCE_MANAGE));

        let user = resolve(stores.rbac.as_ref(), "user").await.unwrap();
        assert_eq!(user.codes(), vec!["attendance:view"]);

        let unknown = resolve(stores.rbac.as_ref(), "nonexistent-role").await.unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn resolving_through_a_borrowed_store_is_send() {
        let stores = Stores::in_memory();
        seed(&stores, None).await.unwrap();

        // Spawning demands a `Send` future over a non-'static borrow of the store.
        let handle = tokio::spawn(async move {
            let rbac = stores.rbac.clone();
            roster_auth::resolve_kind(rbac.as_ref(), Some(roster_auth::RoleKind::User)).await
        });
        let set = handle.await.unwrap().unwrap();
        assert_eq!(set.codes(), vec!["attendance:view"]);
    }
}
