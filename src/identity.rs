use crate::config::Config;
use crate::util::initials;

/// Signed-in runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub email: Option<String>,
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl User {
    pub fn demo() -> Self {
        Self {
            id: "demo_user".to_string(),
            full_name: Some("Demo User".to_string()),
            first_name: Some("Demo".to_string()),
            email: Some("demo@strinex.app".to_string()),
        }
    }

    /// Full name, then first name, then "You"
    pub fn display_name(&self) -> &str {
        non_blank(&self.full_name)
            .or_else(|| non_blank(&self.first_name))
            .unwrap_or("You")
    }

    /// Header label; falls back to the e-mail address before "Runner"
    pub fn nav_label(&self) -> &str {
        non_blank(&self.full_name)
            .or_else(|| non_blank(&self.first_name))
            .or_else(|| non_blank(&self.email))
            .unwrap_or("Runner")
    }

    pub fn initials(&self) -> String {
        initials(self.nav_label())
    }
}

pub trait IdentityProvider {
    fn current_user(&self) -> Option<&User>;
    fn sign_out(&mut self);
}

/// Profile taken from the local config; the demo profile when none is set
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    user: Option<User>,
}

impl LocalIdentity {
    pub fn new(user: Option<User>) -> Self {
        Self { user }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let name = non_blank(&cfg.display_name).map(str::to_string);
        let email = non_blank(&cfg.email).map(str::to_string);

        if name.is_none() && email.is_none() {
            tracing::info!("no profile configured, using demo user");
            return Self::new(Some(User::demo()));
        }

        let first_name = name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
            .map(str::to_string);
        let id = email
            .clone()
            .or_else(|| name.as_deref().map(|n| n.to_lowercase().replace(' ', "_")))
            .unwrap_or_default();

        Self::new(Some(User {
            id,
            full_name: name,
            first_name,
            email,
        }))
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            tracing::info!(user = %user.id, "signed out");
        }
    }
}
