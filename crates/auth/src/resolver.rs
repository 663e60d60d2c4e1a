//! Role → permission resolution.

use async_trait::async_trait;

use crate::{PermissionCode, PermissionSet, RoleKind};

/// Source of role→permission associations (typically the role tables).
#[async_trait]
pub trait RolePermissionSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Codes attached to the role named exactly `role_name`, or `None` when no
    /// such role exists. Duplicates are tolerated.
    async fn permission_codes(
        &self,
        role_name: &str,
    ) -> Result<Option<Vec<PermissionCode>>, Self::Error>;
}

/// Resolve a role label to its permission set.
///
/// An unknown role resolves to the empty set; it is not an error.
pub async fn resolve<S>(source: &S, role_label: &str) -> Result<PermissionSet, S::Error>
where
    S: RolePermissionSource + ?Sized,
{
    let codes = source.permission_codes(role_label).await?;
    Ok(codes.unwrap_or_default().into_iter().collect())
}

/// Resolve a parsed role; an unparseable role (`None`) holds nothing.
pub async fn resolve_kind<S>(source: &S, role: Option<RoleKind>) -> Result<PermissionSet, S::Error>
where
    S: RolePermissionSource + ?Sized,
{
    match role {
        Some(kind) => resolve(source, kind.as_str()).await,
        None => Ok(PermissionSet::new()),
    }
}
