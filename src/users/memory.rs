//! In-process `UserStore` for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repo::{StoreError, StoreResult, UserStore};
use super::repo_types::{NewRegisteredUser, ProfileUpdate, RegisteredUser, UnregisteredUser};

#[derive(Default)]
struct Tables {
    registered: Vec<RegisteredUser>,
    unregistered: HashMap<String, UnregisteredUser>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    tables: Mutex<Tables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn unregistered_count(&self, email: &str) -> usize {
        let t = self.tables.lock().await;
        usize::from(t.unregistered.contains_key(&email.to_lowercase()))
    }

    pub async fn registered_count(&self, email: &str) -> usize {
        let email = email.to_lowercase();
        let t = self.tables.lock().await;
        t.registered.iter().filter(|u| u.email == email).count()
    }
}

fn blank_unregistered(email: &str) -> UnregisteredUser {
    let now = OffsetDateTime::now_utc();
    UnregisteredUser {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: None,
        username: None,
        picture: None,
        linkedin_link: None,
        github_link: None,
        portfolio_link: None,
        skills_proficient_at: Vec::new(),
        skills_to_learn: Vec::new(),
        education: Json(Vec::new()),
        bio: None,
        projects: Json(Vec::new()),
        created_at: now,
        updated_at: now,
    }
}

fn keep_or<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

fn keep_or_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *slot = value.clone();
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_registered_by_username(&self, username: &str) -> StoreResult<Option<RegisteredUser>> {
        let t = self.tables.lock().await;
        Ok(t.registered.iter().find(|u| u.username == username).cloned())
    }

    async fn find_registered_by_email(&self, email: &str) -> StoreResult<Option<RegisteredUser>> {
        let email = email.to_lowercase();
        let t = self.tables.lock().await;
        Ok(t.registered.iter().find(|u| u.email == email).cloned())
    }

    async fn list_registered_except(&self, username: &str) -> StoreResult<Vec<RegisteredUser>> {
        let t = self.tables.lock().await;
        Ok(t.registered.iter().filter(|u| u.username != username).cloned().collect())
    }

    async fn update_registered(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<RegisteredUser>> {
        let mut t = self.tables.lock().await;
        let Some(u) = t.registered.iter_mut().find(|u| u.username == username) else {
            return Ok(None);
        };
        keep_or(&mut u.name, &update.name);
        keep_or_opt(&mut u.picture, &update.picture);
        keep_or_opt(&mut u.linkedin_link, &update.linkedin_link);
        keep_or_opt(&mut u.github_link, &update.github_link);
        keep_or_opt(&mut u.portfolio_link, &update.portfolio_link);
        keep_or(&mut u.skills_proficient_at, &update.skills_proficient_at);
        keep_or(&mut u.skills_to_learn, &update.skills_to_learn);
        keep_or(&mut u.education.0, &update.education);
        keep_or_opt(&mut u.bio, &update.bio);
        keep_or(&mut u.projects.0, &update.projects);
        Ok(Some(u.clone()))
    }

    async fn find_unregistered_by_email(&self, email: &str) -> StoreResult<Option<UnregisteredUser>> {
        let t = self.tables.lock().await;
        Ok(t.unregistered.get(&email.to_lowercase()).cloned())
    }

    async fn ensure_unregistered(
        &self,
        email: &str,
        name: Option<&str>,
        picture: Option<&str>,
    ) -> StoreResult<UnregisteredUser> {
        let email = email.to_lowercase();
        let mut t = self.tables.lock().await;
        let user = t.unregistered.entry(email.clone()).or_insert_with(|| {
            let mut u = blank_unregistered(&email);
            u.name = name.map(str::to_string);
            u.picture = picture.map(str::to_string);
            u
        });
        Ok(user.clone())
    }

    async fn upsert_unregistered(&self, email: &str, update: &ProfileUpdate) -> StoreResult<UnregisteredUser> {
        let email = email.to_lowercase();
        let mut t = self.tables.lock().await;
        let u = t
            .unregistered
            .entry(email.clone())
            .or_insert_with(|| blank_unregistered(&email));
        keep_or_opt(&mut u.name, &update.name);
        keep_or_opt(&mut u.username, &update.username);
        keep_or_opt(&mut u.picture, &update.picture);
        keep_or_opt(&mut u.linkedin_link, &update.linkedin_link);
        keep_or_opt(&mut u.github_link, &update.github_link);
        keep_or_opt(&mut u.portfolio_link, &update.portfolio_link);
        keep_or(&mut u.skills_proficient_at, &update.skills_proficient_at);
        keep_or(&mut u.skills_to_learn, &update.skills_to_learn);
        keep_or(&mut u.education.0, &update.education);
        keep_or_opt(&mut u.bio, &update.bio);
        keep_or(&mut u.projects.0, &update.projects);
        u.updated_at = OffsetDateTime::now_utc();
        Ok(u.clone())
    }

    async fn finalize_registration(&self, user: NewRegisteredUser) -> StoreResult<RegisteredUser> {
        let email = user.email.to_lowercase();
        let mut t = self.tables.lock().await;
        if t.registered.iter().any(|u| u.email == email) {
            return Err(StoreError::Conflict("email"));
        }
        if t.registered.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username"));
        }
        let created = RegisteredUser {
            id: Uuid::new_v4(),
            username: user.username,
            email: email.clone(),
            name: user.name,
            password_hash: user.password_hash,
            picture: user.picture,
            linkedin_link: user.linkedin_link,
            github_link: user.github_link,
            portfolio_link: user.portfolio_link,
            skills_proficient_at: user.skills_proficient_at,
            skills_to_learn: user.skills_to_learn,
            education: Json(user.education),
            bio: user.bio,
            projects: Json(user.projects),
            created_at: OffsetDateTime::now_utc(),
        };
        t.registered.push(created.clone());
        t.unregistered.remove(&email);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finalization_moves_the_email_across_stores() {
        let store = MemoryUserStore::new();
        store
            .ensure_unregistered("B@y.com", Some("Bea"), None)
            .await
            .unwrap();
        assert_eq!(store.unregistered_count("b@y.com").await, 1);

        store
            .finalize_registration(NewRegisteredUser::basic("bea", "b@y.com", "Bea"))
            .await
            .unwrap();

        assert_eq!(store.unregistered_count("b@y.com").await, 0);
        assert_eq!(store.registered_count("b@y.com").await, 1);
    }

    #[tokio::test]
    async fn second_finalization_conflicts_and_changes_nothing() {
        let store = MemoryUserStore::new();
        store
            .finalize_registration(NewRegisteredUser::basic("bea", "b@y.com", "Bea"))
            .await
            .unwrap();
        store.ensure_unregistered("b@y.com", None, None).await.unwrap();

        let err = store
            .finalize_registration(NewRegisteredUser::basic("bea2", "b@y.com", "Bea"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict("email")));
        assert_eq!(store.registered_count("b@y.com").await, 1);
        assert_eq!(store.unregistered_count("b@y.com").await, 1);

        let err = store
            .finalize_registration(NewRegisteredUser::basic("bea", "other@y.com", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict("username")));
    }

    #[tokio::test]
    async fn ensure_keeps_existing_record() {
        let store = MemoryUserStore::new();
        let first = store
            .ensure_unregistered("c@z.com", Some("Cy"), Some("https://pic/1"))
            .await
            .unwrap();
        let again = store
            .ensure_unregistered("c@z.com", Some("Other"), None)
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.name.as_deref(), Some("Cy"));
        assert_eq!(again.picture.as_deref(), Some("https://pic/1"));
    }

    #[tokio::test]
    async fn upsert_merges_steps() {
        let store = MemoryUserStore::new();
        store
            .upsert_unregistered(
                "d@w.com",
                &ProfileUpdate {
                    name: Some("Dee".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let u = store
            .upsert_unregistered(
                "d@w.com",
                &ProfileUpdate {
                    bio: Some("hi".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(u.name.as_deref(), Some("Dee"));
        assert_eq!(u.bio.as_deref(), Some("hi"));
    }
}
