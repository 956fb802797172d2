// User Provisioning
// Resolves an authenticated identity to its local user row, creating it on first sight

use std::sync::Arc;
use tracing::{debug, info};

use super::error::AuthError;
use super::security::redact_id;
use crate::user_repository::{BandMembership, LocalUser, UserRepositoryError, UserStore};

#[derive(Clone)]
pub struct UserProvisioner {
    store: Arc<dyn UserStore>,
}

impl UserProvisioner {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Find the user for `subject_id`, inserting one with the given email when
    /// absent. Losing an insert race to a concurrent first login re-reads and
    /// returns the winner's row.
    pub async fn resolve(
        &self,
        subject_id: &str,
        email: Option<&str>,
    ) -> Result<LocalUser, AuthError> {
        if let Some(user) = self.store.find_by_subject(subject_id).await? {
            debug!(user_id = %user.id, "Found existing user");
            return Ok(user);
        }

        match self.store.insert_user(subject_id, email).await {
            Ok(user) => {
                info!(
                    user_id = %user.id,
                    subject = %redact_id(subject_id),
                    "Provisioned new user"
                );
                Ok(user)
            }
            Err(UserRepositoryError::Conflict(_)) => {
                debug!(
                    subject = %redact_id(subject_id),
                    "User created concurrently, re-reading"
                );
                self.store
                    .find_by_subject(subject_id)
                    .await?
                    .ok_or_else(|| {
                        AuthError::Provisioning(UserRepositoryError::UserNotFound(redact_id(
                            subject_id,
                        )))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn active_memberships(
        &self,
        user: &LocalUser,
    ) -> Result<Vec<BandMembership>, AuthError> {
        Ok(self.store.active_memberships(user.id).await?)
    }
}
