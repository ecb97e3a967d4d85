use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload. Exactly one of `username` / `email` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>, // registered subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>, // unregistered subject
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// Which store a token must be resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Registered { id: Uuid, username: String },
    Unregistered { id: Uuid, email: String },
}

impl Claims {
    /// `None` when the payload carries both subject claims or neither.
    pub fn subject(&self) -> Option<Subject> {
        match (&self.username, &self.email) {
            (Some(username), None) => Some(Subject::Registered {
                id: self.id,
                username: username.clone(),
            }),
            (None, Some(email)) => Some(Subject::Unregistered {
                id: self.id,
                email: email.clone(),
            }),
            _ => None,
        }
    }
}
