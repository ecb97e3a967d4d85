use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub start_date: Option<String>, // YYYY-MM-DD
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

/// Fully registered account, addressable by username.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String, // lowercase
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // argon2, absent for Google-only accounts
    pub picture: Option<String>,
    pub linkedin_link: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub skills_proficient_at: Vec<String>,
    pub skills_to_learn: Vec<String>,
    pub education: Json<Vec<Education>>,
    pub bio: Option<String>,
    pub projects: Json<Vec<Project>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Provisional record collected by the onboarding wizard, keyed by email.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UnregisteredUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub picture: Option<String>,
    pub linkedin_link: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub skills_proficient_at: Vec<String>,
    pub skills_to_learn: Vec<String>,
    pub education: Json<Vec<Education>>,
    pub bio: Option<String>,
    pub projects: Json<Vec<Project>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Partial profile write. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub picture: Option<String>,
    pub linkedin_link: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub skills_proficient_at: Option<Vec<String>>,
    pub skills_to_learn: Option<Vec<String>>,
    pub education: Option<Vec<Education>>,
    pub bio: Option<String>,
    pub projects: Option<Vec<Project>>,
}

#[derive(Debug, Clone)]
pub struct NewRegisteredUser {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub picture: Option<String>,
    pub linkedin_link: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub skills_proficient_at: Vec<String>,
    pub skills_to_learn: Vec<String>,
    pub education: Vec<Education>,
    pub bio: Option<String>,
    pub projects: Vec<Project>,
}

impl NewRegisteredUser {
    /// Minimal account: identity fields only, empty profile.
    pub fn basic(username: &str, email: &str, name: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_lowercase(),
            name: name.to_string(),
            password_hash: None,
            picture: None,
            linkedin_link: None,
            github_link: None,
            portfolio_link: None,
            skills_proficient_at: Vec::new(),
            skills_to_learn: Vec::new(),
            education: Vec::new(),
            bio: None,
            projects: Vec::new(),
        }
    }
}
