use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date};
use tracing::info;

use super::{
    dto::{AddDetailsRequest, EduDetailsRequest, RegDetailsRequest, RegisterUserRequest},
    repo::UserStore,
    repo_types::{Education, NewRegisteredUser, ProfileUpdate, Project, RegisteredUser},
};
use crate::{
    auth::{extractors::UnregisteredIdentity, services::is_valid_username},
    error::ApiError,
};

lazy_static! {
    static ref GITHUB_RE: Regex =
        Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/[a-zA-Z0-9_-]+/?$").unwrap();
    static ref LINKEDIN_RE: Regex =
        Regex::new(r"^(?:https?://)?(?:www\.)?linkedin\.com/in/[a-zA-Z0-9_-]+/?$").unwrap();
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn validate_links(linkedin: Option<&str>, github: Option<&str>) -> Result<(), ApiError> {
    let bad_linkedin = linkedin.is_some_and(|l| !LINKEDIN_RE.is_match(l));
    let bad_github = github.is_some_and(|g| !GITHUB_RE.is_match(g));
    if bad_linkedin || bad_github {
        return Err(ApiError::Validation("Invalid GitHub or LinkedIn link".into()));
    }
    Ok(())
}

fn parse_date(raw: &str) -> Result<Date, ApiError> {
    // Accept full timestamps by looking at the date part only.
    let day = raw.get(..10).unwrap_or(raw);
    Date::parse(day, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::Validation(format!("Invalid date: {raw}")))
}

pub fn validate_education(entries: &[Education]) -> Result<(), ApiError> {
    for edu in entries {
        if edu.institution.trim().is_empty() || edu.degree.trim().is_empty() {
            return Err(ApiError::Validation("Missing education details".into()));
        }
        if let (Some(start), Some(end)) = (edu.start_date.as_deref(), edu.end_date.as_deref()) {
            if parse_date(start)? > parse_date(end)? {
                return Err(ApiError::Validation("Invalid education dates".into()));
            }
        }
    }
    Ok(())
}

fn validate_projects(projects: &[Project]) -> Result<(), ApiError> {
    if projects.iter().any(|p| p.title.trim().is_empty()) {
        return Err(ApiError::Validation("Project title is required".into()));
    }
    Ok(())
}

/// Converts the identity/links/skills step into a profile write.
pub fn reg_details_update(req: RegDetailsRequest) -> Result<ProfileUpdate, ApiError> {
    let update = ProfileUpdate {
        name: trimmed(req.name),
        username: trimmed(req.username),
        picture: trimmed(req.picture),
        linkedin_link: trimmed(req.linkedin_link),
        github_link: trimmed(req.github_link),
        portfolio_link: trimmed(req.portfolio_link),
        skills_proficient_at: req.skills_proficient_at,
        skills_to_learn: req.skills_to_learn,
        ..Default::default()
    };
    validate_links(update.linkedin_link.as_deref(), update.github_link.as_deref())?;
    if let Some(username) = update.username.as_deref() {
        if !is_valid_username(username) {
            return Err(ApiError::Validation(
                "Username must be 3-30 letters, digits, '.', '_' or '-'".into(),
            ));
        }
    }
    Ok(update)
}

pub fn edu_details_update(req: EduDetailsRequest, required: bool) -> Result<ProfileUpdate, ApiError> {
    if required && req.education.is_empty() {
        return Err(ApiError::Validation("Education is required".into()));
    }
    validate_education(&req.education)?;
    Ok(ProfileUpdate {
        education: Some(req.education),
        ..Default::default()
    })
}

pub fn add_details_update(req: AddDetailsRequest) -> Result<ProfileUpdate, ApiError> {
    let Some(bio) = trimmed(req.bio) else {
        return Err(ApiError::Validation("Bio is required".into()));
    };
    if let Some(projects) = req.projects.as_deref() {
        validate_projects(projects)?;
    }
    Ok(ProfileUpdate {
        bio: Some(bio),
        projects: req.projects,
        ..Default::default()
    })
}

/// Promotes the caller's provisional record into a registered account.
///
/// Request fields win over what the wizard stored; the email always comes
/// from the caller's token.
pub async fn finalize_registration(
    users: &dyn UserStore,
    caller: &UnregisteredIdentity,
    req: RegisterUserRequest,
) -> Result<RegisteredUser, ApiError> {
    let email = caller.email.to_lowercase();
    let stored = users
        .find_unregistered_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredential)?;

    let username = trimmed(req.username)
        .or(stored.username)
        .ok_or_else(|| ApiError::Validation("Please provide name, email, and username".into()))?;
    let name = trimmed(req.name)
        .or(stored.name)
        .ok_or_else(|| ApiError::Validation("Please provide name, email, and username".into()))?;
    if !is_valid_username(&username) {
        return Err(ApiError::Validation(
            "Username must be 3-30 letters, digits, '.', '_' or '-'".into(),
        ));
    }

    let linkedin_link = trimmed(req.linkedin_link).or(stored.linkedin_link);
    let github_link = trimmed(req.github_link).or(stored.github_link);
    validate_links(linkedin_link.as_deref(), github_link.as_deref())?;

    let education = req.education.unwrap_or(stored.education.0);
    validate_education(&education)?;
    let projects = req.projects.unwrap_or(stored.projects.0);
    validate_projects(&projects)?;

    if users.find_registered_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("User already registered".into()));
    }
    if users.find_registered_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    let new_user = NewRegisteredUser {
        username,
        email,
        name,
        password_hash: None,
        picture: stored.picture,
        linkedin_link,
        github_link,
        portfolio_link: trimmed(req.portfolio_link).or(stored.portfolio_link),
        skills_proficient_at: req.skills_proficient_at.unwrap_or(stored.skills_proficient_at),
        skills_to_learn: req.skills_to_learn.unwrap_or(stored.skills_to_learn),
        education,
        bio: trimmed(req.bio).or(stored.bio),
        projects,
    };

    let user = users.finalize_registration(new_user).await?;
    info!(user_id = %user.id, username = %user.username, "registration finalized");
    Ok(user)
}
