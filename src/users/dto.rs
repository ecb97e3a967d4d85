use serde::Deserialize;

use super::repo_types::{Education, Project};

/// First wizard step: identity, links and skills.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegDetailsRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub picture: Option<String>,
    pub linkedin_link: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub skills_proficient_at: Option<Vec<String>>,
    pub skills_to_learn: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EduDetailsRequest {
    pub education: Vec<Education>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddDetailsRequest {
    pub bio: Option<String>,
    pub projects: Option<Vec<Project>>,
}

/// Registration finalization. Absent fields fall back to what the wizard stored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterUserRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub linkedin_link: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub skills_proficient_at: Option<Vec<String>>,
    pub skills_to_learn: Option<Vec<String>>,
    pub education: Option<Vec<Education>>,
    pub bio: Option<String>,
    pub projects: Option<Vec<Project>>,
}
