use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use thiserror::Error;
use tracing::debug;

use super::repo_types::{NewRegisteredUser, ProfileUpdate, RegisteredUser, UnregisteredUser};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field (`email` or `username`) is already owned by another record.
    #[error("{0} already taken")]
    Conflict(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for registered and provisional users.
///
/// Uniqueness of `users.email`, `users.username` and
/// `unregistered_users.email` is enforced by the implementation, never by
/// callers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_registered_by_username(&self, username: &str) -> StoreResult<Option<RegisteredUser>>;
    async fn find_registered_by_email(&self, email: &str) -> StoreResult<Option<RegisteredUser>>;
    async fn list_registered_except(&self, username: &str) -> StoreResult<Vec<RegisteredUser>>;
    /// Applies `update` to the user's profile. `update.username` is ignored.
    async fn update_registered(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<RegisteredUser>>;

    async fn find_unregistered_by_email(&self, email: &str) -> StoreResult<Option<UnregisteredUser>>;
    /// Returns the provisional record for `email`, creating it if absent.
    /// An existing record is returned untouched.
    async fn ensure_unregistered(
        &self,
        email: &str,
        name: Option<&str>,
        picture: Option<&str>,
    ) -> StoreResult<UnregisteredUser>;
    async fn upsert_unregistered(&self, email: &str, update: &ProfileUpdate) -> StoreResult<UnregisteredUser>;

    /// Creates the registered user and removes every provisional record for
    /// the same email as one atomic step.
    async fn finalize_registration(&self, user: NewRegisteredUser) -> StoreResult<RegisteredUser>;
}

const REGISTERED_COLUMNS: &str = "id, username, email, name, password_hash, picture, linkedin_link, \
     github_link, portfolio_link, skills_proficient_at, skills_to_learn, education, bio, projects, \
     created_at";

const UNREGISTERED_COLUMNS: &str = "id, email, name, username, picture, linkedin_link, github_link, \
     portfolio_link, skills_proficient_at, skills_to_learn, education, bio, projects, created_at, \
     updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique(e: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("username") => "username",
                _ => "email",
            };
            return StoreError::Conflict(field);
        }
    }
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_registered_by_username(&self, username: &str) -> StoreResult<Option<RegisteredUser>> {
        let user = sqlx::query_as::<_, RegisteredUser>(&format!(
            "SELECT {REGISTERED_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn find_registered_by_email(&self, email: &str) -> StoreResult<Option<RegisteredUser>> {
        let user = sqlx::query_as::<_, RegisteredUser>(&format!(
            "SELECT {REGISTERED_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn list_registered_except(&self, username: &str) -> StoreResult<Vec<RegisteredUser>> {
        let users = sqlx::query_as::<_, RegisteredUser>(&format!(
            "SELECT {REGISTERED_COLUMNS} FROM users WHERE username <> $1"
        ))
        .bind(username)
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn update_registered(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<RegisteredUser>> {
        let user = sqlx::query_as::<_, RegisteredUser>(&format!(
            r#"
            UPDATE users SET
                name                 = COALESCE($2, name),
                picture              = COALESCE($3, picture),
                linkedin_link        = COALESCE($4, linkedin_link),
                github_link          = COALESCE($5, github_link),
                portfolio_link       = COALESCE($6, portfolio_link),
                skills_proficient_at = COALESCE($7, skills_proficient_at),
                skills_to_learn      = COALESCE($8, skills_to_learn),
                education            = COALESCE($9, education),
                bio                  = COALESCE($10, bio),
                projects             = COALESCE($11, projects)
            WHERE username = $1
            RETURNING {REGISTERED_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(&update.name)
        .bind(&update.picture)
        .bind(&update.linkedin_link)
        .bind(&update.github_link)
        .bind(&update.portfolio_link)
        .bind(&update.skills_proficient_at)
        .bind(&update.skills_to_learn)
        .bind(update.education.clone().map(Json))
        .bind(&update.bio)
        .bind(update.projects.clone().map(Json))
        .fetch_optional(&self.db)
        .await
        .context("update user profile")?;
        Ok(user)
    }

    async fn find_unregistered_by_email(&self, email: &str) -> StoreResult<Option<UnregisteredUser>> {
        let user = sqlx::query_as::<_, UnregisteredUser>(&format!(
            "SELECT {UNREGISTERED_COLUMNS} FROM unregistered_users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.db)
        .await
        .context("find unregistered user by email")?;
        Ok(user)
    }

    async fn ensure_unregistered(
        &self,
        email: &str,
        name: Option<&str>,
        picture: Option<&str>,
    ) -> StoreResult<UnregisteredUser> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let user = sqlx::query_as::<_, UnregisteredUser>(&format!(
            r#"
            INSERT INTO unregistered_users (email, name, picture)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET email = unregistered_users.email
            RETURNING {UNREGISTERED_COLUMNS}
            "#
        ))
        .bind(email.to_lowercase())
        .bind(name)
        .bind(picture)
        .fetch_one(&self.db)
        .await
        .context("ensure unregistered user")?;
        Ok(user)
    }

    async fn upsert_unregistered(&self, email: &str, update: &ProfileUpdate) -> StoreResult<UnregisteredUser> {
        let user = sqlx::query_as::<_, UnregisteredUser>(&format!(
            r#"
            INSERT INTO unregistered_users (
                email, name, username, picture, linkedin_link, github_link, portfolio_link,
                skills_proficient_at, skills_to_learn, education, bio, projects
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                COALESCE($8::text[], '{{}}'), COALESCE($9::text[], '{{}}'),
                COALESCE($10::jsonb, '[]'::jsonb), $11, COALESCE($12::jsonb, '[]'::jsonb)
            )
            ON CONFLICT (email) DO UPDATE SET
                name                 = COALESCE($2, unregistered_users.name),
                username             = COALESCE($3, unregistered_users.username),
                picture              = COALESCE($4, unregistered_users.picture),
                linkedin_link        = COALESCE($5, unregistered_users.linkedin_link),
                github_link          = COALESCE($6, unregistered_users.github_link),
                portfolio_link       = COALESCE($7, unregistered_users.portfolio_link),
                skills_proficient_at = COALESCE($8::text[], unregistered_users.skills_proficient_at),
                skills_to_learn      = COALESCE($9::text[], unregistered_users.skills_to_learn),
                education            = COALESCE($10::jsonb, unregistered_users.education),
                bio                  = COALESCE($11, unregistered_users.bio),
                projects             = COALESCE($12::jsonb, unregistered_users.projects),
                updated_at           = now()
            RETURNING {UNREGISTERED_COLUMNS}
            "#
        ))
        .bind(email.to_lowercase())
        .bind(&update.name)
        .bind(&update.username)
        .bind(&update.picture)
        .bind(&update.linkedin_link)
        .bind(&update.github_link)
        .bind(&update.portfolio_link)
        .bind(&update.skills_proficient_at)
        .bind(&update.skills_to_learn)
        .bind(update.education.clone().map(Json))
        .bind(&update.bio)
        .bind(update.projects.clone().map(Json))
        .fetch_one(&self.db)
        .await
        .context("upsert unregistered user")?;
        Ok(user)
    }

    async fn finalize_registration(&self, user: NewRegisteredUser) -> StoreResult<RegisteredUser> {
        let email = user.email.to_lowercase();
        let mut tx = self.db.begin().await.context("begin tx")?;

        let created = sqlx::query_as::<_, RegisteredUser>(&format!(
            r#"
            INSERT INTO users (
                username, email, name, password_hash, picture, linkedin_link, github_link,
                portfolio_link, skills_proficient_at, skills_to_learn, education, bio, projects
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {REGISTERED_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.picture)
        .bind(&user.linkedin_link)
        .bind(&user.github_link)
        .bind(&user.portfolio_link)
        .bind(&user.skills_proficient_at)
        .bind(&user.skills_to_learn)
        .bind(Json(&user.education))
        .bind(&user.bio)
        .bind(Json(&user.projects))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "insert user"))?;

        let removed = sqlx::query("DELETE FROM unregistered_users WHERE email = $1")
            .bind(&email)
            .execute(&mut *tx)
            .await
            .context("delete unregistered user")?
            .rows_affected();

        tx.commit().await.context("commit tx")?;
        debug!(user_id = %created.id, removed, "registration finalized");
        Ok(created)
    }
}
