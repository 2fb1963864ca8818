use std::sync::Arc;

use log::info;
use turfcore::{OnboardingForm, UserProfile};

use crate::error::{AppError, AppResult};
use crate::store::RemoteStore;

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn RemoteStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Validate a finished onboarding form and store the profile.
    pub fn register(&self, uid: &str, form: OnboardingForm) -> AppResult<UserProfile> {
        let profile = form.into_profile(uid)?;
        self.store.save_user(&profile)?;
        info!("[UserRepository] Registered {}", uid);
        Ok(profile)
    }

    pub fn get(&self, uid: &str) -> AppResult<Option<UserProfile>> {
        self.store.get_user(uid)
    }

    pub fn require(&self, uid: &str) -> AppResult<UserProfile> {
        self.get(uid)?.ok_or_else(|| AppError::not_found("User", uid))
    }

    pub fn update(&self, profile: &UserProfile) -> AppResult<()> {
        self.store.save_user(profile)
    }

    /// Display name, falling back to the uid for unknown users.
    pub fn display_name(&self, uid: &str) -> AppResult<String> {
        Ok(self
            .get(uid)?
            .map_or_else(|| uid.to_string(), |p| p.display_name))
    }
}
