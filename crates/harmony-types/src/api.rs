use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Claims carried by tokens issued by the external auth provider. The gateway
/// only verifies them; it never mints tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: usize,
}

// -- Identity --

/// The signed-in user, injected into every component call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name shown next to posts, comments and chat messages: display name,
    /// else the local part of the email, else the raw id.
    pub fn author_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        if let Some(local) = self
            .email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|l| !l.is_empty())
        {
            return local.to_string();
        }
        self.id.clone()
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            display_name: claims.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_name_prefers_display_name() {
        let user = CurrentUser::new("u1")
            .with_email("sam@example.com")
            .with_display_name("Sam");
        assert_eq!(user.author_name(), "Sam");
    }

    #[test]
    fn author_name_falls_back_to_email_then_id() {
        assert_eq!(CurrentUser::new("u1").with_email("sam@example.com").author_name(), "sam");
        assert_eq!(CurrentUser::new("u1").with_display_name("  ").author_name(), "u1");
    }
}
