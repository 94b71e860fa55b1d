use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::{AppError, AppResult};

/// Administrative capability resolved for a user.
///
/// How credentials are issued is out of scope; the core only checks the
/// resolved capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    None,
    Admin,
    SiteAdmin,
}

impl Capability {
    pub fn is_admin(&self) -> bool {
        matches!(self, Capability::Admin | Capability::SiteAdmin)
    }
}

/// Authorization collaborator consumed by the moderation workflow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn capability(&self, user_id: i64) -> AppResult<Capability>;
}

/// Resolves the capability and rejects non-admins with an Unauthorized error
pub async fn require_admin(authorizer: &dyn Authorizer, user_id: i64) -> AppResult<Capability> {
    let capability = authorizer.capability(user_id).await?;
    if capability.is_admin() {
        Ok(capability)
    } else {
        Err(AppError::Unauthorized(
            "Administrator access required".to_string(),
        ))
    }
}

/// Capability lookup against the users table
pub struct PgAuthorizer {
    pool: PgPool,
}

impl PgAuthorizer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Authorizer for PgAuthorizer {
    async fn capability(&self, user_id: i64) -> AppResult<Capability> {
        let row = sqlx::query("SELECT is_admin, is_site_admin FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let capability = match row {
            Some(row) => {
                if row.try_get::<bool, _>("is_site_admin")? {
                    Capability::SiteAdmin
                } else if row.try_get::<bool, _>("is_admin")? {
                    Capability::Admin
                } else {
                    Capability::None
                }
            }
            // Unknown users hold no capability; the caller decides whether
            // that is an authorization failure or a 404.
            None => Capability::None,
        };

        Ok(capability)
    }
}

/// Fixed capability table for tests and local runs without a users table
#[derive(Default)]
pub struct StaticAuthorizer {
    admins: HashSet<i64>,
    site_admins: HashSet<i64>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, user_id: i64) -> Self {
        self.admins.insert(user_id);
        self
    }

    pub fn with_site_admin(mut self, user_id: i64) -> Self {
        self.site_admins.insert(user_id);
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn capability(&self, user_id: i64) -> AppResult<Capability> {
        if self.site_admins.contains(&user_id) {
            Ok(Capability::SiteAdmin)
        } else if self.admins.contains(&user_id) {
            Ok(Capability::Admin)
        } else {
            Ok(Capability::None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_require_admin_accepts_both_admin_tiers() {
        let authorizer = StaticAuthorizer::new().with_admin(1).with_site_admin(2);

        assert_eq!(require_admin(&authorizer, 1).await.unwrap(), Capability::Admin);
        assert_eq!(
            require_admin(&authorizer, 2).await.unwrap(),
            Capability::SiteAdmin
        );
    }

    #[tokio::test]
    async fn test_require_admin_rejects_regular_user() {
        let authorizer = StaticAuthorizer::new().with_admin(1);
        let result = require_admin(&authorizer, 99).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
