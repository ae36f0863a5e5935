use anyhow::Result;
use parking_lot::RwLock;

use std::collections::HashSet;
use std::sync::Arc;

use crate::bot_options::BotOptions;
use crate::database::{BotDatabase, UserRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

/// Role and ban checks backed by the database, with in-memory caches in front of it.
///
/// Permission refusals are reported as `Ok(false)`; `Err` is reserved for storage failures.
pub struct AuthManager {
    db: Arc<BotDatabase>,
    super_admin_id: i64,
    configured_admins: Vec<i64>,
    admin_cache: RwLock<HashSet<i64>>,
    banned_cache: RwLock<HashSet<i64>>,
}

impl AuthManager {
    pub fn new(options: &BotOptions, db: Arc<BotDatabase>) -> AuthManager {
        let mut options = options.clone();
        options.ensure_super_admin_listed();
        let configured_admins = options.admin_user_ids;

        AuthManager {
            db,
            super_admin_id: options.super_admin_id,
            admin_cache: RwLock::new(configured_admins.iter().copied().collect()),
            banned_cache: RwLock::new(HashSet::new()),
            configured_admins,
        }
    }

    pub fn is_configured_admin(&self, user_id: i64) -> bool {
        self.configured_admins.contains(&user_id)
    }

    pub async fn role(&self, user_id: i64) -> Role {
        if self.is_super_admin(user_id) {
            Role::SuperAdmin
        }
        else if self.is_admin(user_id).await {
            Role::Admin
        }
        else {
            Role::User
        }
    }

    pub fn is_super_admin(&self, user_id: i64) -> bool {
        self.super_admin_id != 0 && user_id == self.super_admin_id
    }

    pub async fn is_admin(&self, user_id: i64) -> bool {
        if self.is_super_admin(user_id) || cache_contains(&self.admin_cache, user_id) {
            return true;
        }

        match self.db.get_user(user_id).await {
            Some(user) if user.is_admin => {
                cache_insert(&self.admin_cache, user_id);
                true
            }
            _ => false,
        }
    }

    /// `false` when the user is banned.
    pub async fn is_user_allowed(&self, user_id: i64) -> bool {
        if cache_contains(&self.banned_cache, user_id) {
            return false;
        }

        match self.db.get_user(user_id).await {
            Some(user) if user.is_banned => {
                cache_insert(&self.banned_cache, user_id);
                false
            }
            _ => true,
        }
    }

    pub async fn ban_user(&self, user_id: i64, admin_id: i64) -> Result<bool> {
        if !self.is_admin(admin_id).await {
            tracing::warn!("user {} tried to ban {} without admin rights", admin_id, user_id);
            return Ok(false);
        }

        if self.is_super_admin(user_id) {
            tracing::warn!("admin {} tried to ban the super admin", admin_id);
            return Ok(false);
        }

        self.db.set_banned(user_id, true).await?;
        cache_insert(&self.banned_cache, user_id);

        tracing::info!("user {} banned by admin {}", user_id, admin_id);
        Ok(true)
    }

    pub async fn unban_user(&self, user_id: i64, admin_id: i64) -> Result<bool> {
        if !self.is_admin(admin_id).await {
            tracing::warn!("user {} tried to unban {} without admin rights", admin_id, user_id);
            return Ok(false);
        }

        self.db.set_banned(user_id, false).await?;
        cache_remove(&self.banned_cache, user_id);

        tracing::info!("user {} unbanned by admin {}", user_id, admin_id);
        Ok(true)
    }

    pub async fn promote_admin(&self, user_id: i64, super_admin_id: i64) -> Result<bool> {
        if !self.is_super_admin(super_admin_id) {
            tracing::warn!("user {} tried to promote {} without super admin rights", super_admin_id, user_id);
            return Ok(false);
        }

        self.db.set_admin(user_id, true).await?;
        cache_insert(&self.admin_cache, user_id);

        tracing::info!("user {} promoted to admin by super admin {}", user_id, super_admin_id);
        Ok(true)
    }

    pub async fn demote_admin(&self, user_id: i64, super_admin_id: i64) -> Result<bool> {
        if !self.is_super_admin(super_admin_id) {
            tracing::warn!("user {} tried to demote {} without super admin rights", super_admin_id, user_id);
            return Ok(false);
        }

        if self.is_super_admin(user_id) {
            return Ok(false);
        }

        self.db.set_admin(user_id, false).await?;
        cache_remove(&self.admin_cache, user_id);

        tracing::info!("user {} demoted from admin by super admin {}", user_id, super_admin_id);
        Ok(true)
    }

    pub async fn get_user_info(&self, user_id: i64) -> Option<UserRecord> {
        self.db.get_user(user_id).await
    }

    pub async fn get_all_admins(&self) -> Vec<UserRecord> {
        self.db.admins().await
    }

    pub async fn get_banned_users(&self) -> Vec<UserRecord> {
        self.db.banned_users().await
    }

    pub fn clear_cache(&self) {
        *self.admin_cache.write() =
            self.configured_admins.iter().copied().collect();
        self.banned_cache.write().clear();

        tracing::info!("authentication cache cleared");
    }
}

fn cache_contains(cache: &RwLock<HashSet<i64>>, user_id: i64) -> bool {
    cache.read().contains(&user_id)
}

fn cache_insert(cache: &RwLock<HashSet<i64>>, user_id: i64) {
    cache.write().insert(user_id);
}

fn cache_remove(cache: &RwLock<HashSet<i64>>, user_id: i64) {
    cache.write().remove(&user_id);
}

#[cfg(test)]
mod auth_tests {
    use super::*;
    use crate::database::UserProfile;

    const SUPER: i64 = 1;
    const ADMIN: i64 = 2;
    const USER: i64 = 3;
    const OTHER: i64 = 4;

    fn setup() -> (AuthManager, Arc<BotDatabase>) {
        let options = BotOptions {
            admin_user_ids: vec![ADMIN],
            super_admin_id: SUPER,
            ..BotOptions::default()
        };
        let db = Arc::new(BotDatabase::in_memory());

        (AuthManager::new(&options, Arc::clone(&db)), db)
    }

    #[tokio::test]
    async fn test_roles() {
        let (auth, _db) = setup();

        assert_eq!(Role::SuperAdmin, auth.role(SUPER).await);
        assert_eq!(Role::Admin, auth.role(ADMIN).await);
        assert_eq!(Role::User, auth.role(USER).await);
        assert!(auth.is_admin(SUPER).await);
        assert!(auth.is_configured_admin(SUPER));
    }

    #[tokio::test]
    async fn test_super_admin_is_configured_admin_without_listing() {
        let options = BotOptions { super_admin_id: SUPER, ..BotOptions::default() };
        let auth = AuthManager::new(&options, Arc::new(BotDatabase::in_memory()));

        assert!(auth.is_configured_admin(SUPER));
        assert!(!auth.is_configured_admin(ADMIN));
        assert!(auth.get_all_admins().await.is_empty(), "configured admins live outside the database");
    }

    #[tokio::test]
    async fn test_admin_flag_in_database_counts() {
        let (auth, db) = setup();
        db.register_user(&UserProfile::with_id(OTHER), true).await.unwrap();

        assert!(auth.is_admin(OTHER).await);
    }

    #[tokio::test]
    async fn test_ban_and_unban() {
        let (auth, _db) = setup();

        assert!(auth.is_user_allowed(USER).await);
        assert!(auth.ban_user(USER, ADMIN).await.unwrap());
        assert!(!auth.is_user_allowed(USER).await);
        assert_eq!(vec![USER], auth.get_banned_users().await.iter().map(|u| u.id).collect::<Vec<_>>());

        assert!(auth.unban_user(USER, ADMIN).await.unwrap());
        assert!(auth.is_user_allowed(USER).await);
    }

    #[tokio::test]
    async fn test_ban_requires_admin() {
        let (auth, _db) = setup();

        assert!(!auth.ban_user(OTHER, USER).await.unwrap());
        assert!(auth.is_user_allowed(OTHER).await);
        assert!(!auth.unban_user(OTHER, USER).await.unwrap());
    }

    #[tokio::test]
    async fn test_super_admin_cannot_be_banned() {
        let (auth, _db) = setup();

        assert!(!auth.ban_user(SUPER, ADMIN).await.unwrap());
        assert!(auth.is_user_allowed(SUPER).await);
    }

    #[tokio::test]
    async fn test_promote_and_demote() {
        let (auth, _db) = setup();

        assert!(!auth.promote_admin(USER, ADMIN).await.unwrap(), "only the super admin promotes");
        assert!(auth.promote_admin(USER, SUPER).await.unwrap());
        assert!(auth.is_admin(USER).await);

        assert!(!auth.demote_admin(USER, ADMIN).await.unwrap());
        assert!(auth.demote_admin(USER, SUPER).await.unwrap());
        assert!(!auth.is_admin(USER).await);
    }

    #[tokio::test]
    async fn test_super_admin_cannot_be_demoted() {
        let (auth, _db) = setup();

        assert!(!auth.demote_admin(SUPER, SUPER).await.unwrap());
        assert_eq!(Role::SuperAdmin, auth.role(SUPER).await);
    }

    #[tokio::test]
    async fn test_clear_cache_restores_configured_admins() {
        let (auth, _db) = setup();

        auth.promote_admin(USER, SUPER).await.unwrap();
        auth.demote_admin(ADMIN, SUPER).await.unwrap();
        auth.clear_cache();

        assert!(auth.is_admin(ADMIN).await, "configured admins come back after a cache reset");
        assert!(auth.is_admin(USER).await, "promoted admins are still found through the database");
    }
}
