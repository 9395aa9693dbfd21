use async_trait::async_trait;

use crate::model::UserId;

/// A resolved caller, as handed to the engine. Registration, password
/// hashing, admin approval and activation codes all live outside this
/// process; the engine only consumes the resolved fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user: UserId,
    pub authorized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Unauthenticated,
    Known(UserIdentity),
}

impl Caller {
    /// The user id, if this caller is authenticated and authorized.
    pub fn authorized_user(&self) -> Option<&UserId> {
        match self {
            Caller::Known(id) if id.authorized => Some(&id.user),
            _ => None,
        }
    }
}

/// Where identities come from. The wire layer consults this on AUTH.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn resolve(&self, user: &str, password: &str) -> Option<UserIdentity>;
}

/// Single shared password for the whole club; any name that presents it is
/// an authorized identity.
#[derive(Debug)]
pub struct SharedSecretIdentity {
    password: String,
}

impl SharedSecretIdentity {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl IdentitySource for SharedSecretIdentity {
    async fn resolve(&self, user: &str, password: &str) -> Option<UserIdentity> {
        if user.is_empty() || password != self.password {
            return None;
        }
        Some(UserIdentity {
            user: user.to_string(),
            authorized: true,
        })
    }
}
