use serde::{Deserialize, Serialize};

use super::{Role, Status};

/// A registered account, as stored by user administration.
///
/// Data only: the voting service never loads accounts and does not check
/// role or status. Callers that do hold a `User` turn it into a [`Voter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub role: Role,
    pub status: Status,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: Role::User,
            status: Status::Active,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_banned(&self) -> bool {
        self.status == Status::Banned
    }
}

/// Identity of the caller as seen by the voting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Voter {
    email: String,
}

impl Voter {
    /// Emails are compared case-insensitively, so the identity is stored lowercased.
    pub fn new(email: &str) -> Self {
        Self {
            email: email.trim().to_lowercase(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<&User> for Voter {
    fn from(user: &User) -> Self {
        Voter::new(&user.email)
    }
}

impl std::fmt::Display for Voter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new("a@x.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, Status::Active);
        assert!(!user.is_admin());
        assert!(!user.is_banned());
    }

    #[test]
    fn test_voter_normalizes_email() {
        let voter = Voter::new("  A@X.Com ");
        assert_eq!(voter.email(), "a@x.com");
        assert_eq!(voter, Voter::from(&User::new("a@x.com")));
    }
}
