//! Profile view state.
//!
//! Loads the signed-in citizen's profile for display and submits edits,
//! reloading on success. Failures leave the last successfully loaded
//! profile in place.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use nagrik_backend::{BackendError, ProfileStore};
use nagrik_core::models::{Profile, ProfileUpdate};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Invalid profile: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Backend failure: {0}")]
    Backend(#[from] BackendError),

    #[error("No profile exists for this account")]
    Missing,
}

pub struct ProfileView {
    store: Arc<dyn ProfileStore>,
    user_id: Uuid,
    profile: Option<Profile>,
}

impl ProfileView {
    pub fn new(store: Arc<dyn ProfileStore>, user_id: Uuid) -> Self {
        Self {
            store,
            user_id,
            profile: None,
        }
    }

    pub async fn load(&mut self) -> Result<&Profile, ProfileError> {
        let profile = self
            .store
            .get(self.user_id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %self.user_id, error = %e, "Profile load failed");
                e
            })?
            .ok_or(ProfileError::Missing)?;
        Ok(&*self.profile.insert(profile))
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Validate and submit an edit, then reload so the view reflects what
    /// the backend actually stored.
    pub async fn submit(&mut self, update: ProfileUpdate) -> Result<&Profile, ProfileError> {
        update.validate()?;
        self.store
            .update(self.user_id, update)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %self.user_id, error = %e, "Profile update failed");
                e
            })?;
        self.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nagrik_backend::{AuthApi, MemoryBackend};
    use nagrik_core::models::PreferredLanguage;

    #[tokio::test]
    async fn test_load_and_submit_round_trip() {
        let backend = MemoryBackend::new();
        let user = backend.sign_up("asha@example.org", "secret").await.unwrap();

        let mut view = ProfileView::new(backend.clone(), user.id);
        let profile = view.load().await.unwrap();
        assert_eq!(profile.full_name, None);

        let updated = view
            .submit(ProfileUpdate {
                full_name: Some("Asha Rao".to_string()),
                phone_number: Some("+91 98765 43210".to_string()),
                preferred_language: PreferredLanguage::Te,
            })
            .await
            .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Asha Rao"));
        assert_eq!(updated.preferred_language, PreferredLanguage::Te);
    }

    #[tokio::test]
    async fn test_invalid_update_never_reaches_store() {
        let backend = MemoryBackend::new();
        let user = backend.sign_up("asha@example.org", "secret").await.unwrap();

        let mut view = ProfileView::new(backend.clone(), user.id);
        view.load().await.unwrap();

        let err = view
            .submit(ProfileUpdate {
                full_name: Some("x".repeat(300)),
                phone_number: None,
                preferred_language: PreferredLanguage::En,
            })
            .await;
        assert!(matches!(err, Err(ProfileError::Validation(_))));

        // The stored profile is untouched.
        let stored = backend.get(user.id).await.unwrap().unwrap();
        assert_eq!(stored.full_name, None);
    }

    #[tokio::test]
    async fn test_missing_profile_is_reported() {
        let backend = MemoryBackend::new();
        let mut view = ProfileView::new(backend, Uuid::new_v4());
        assert!(matches!(view.load().await, Err(ProfileError::Missing)));
        assert!(view.profile().is_none());
    }
}
