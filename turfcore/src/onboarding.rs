//! Onboarding steps and field validation.
//!
//! The flow is linear: Welcome, Email, Password, Name, Profile, Done.
//! Each step has a guard; [`OnboardingForm::next`] only advances when the
//! guard for the current step holds.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TurfError};

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 40;

const HEIGHT_RANGE_CM: (f64, f64) = (50.0, 272.0);
const WEIGHT_RANGE_KG: (f64, f64) = (20.0, 400.0);
const WEEKLY_GOAL_RANGE_KM: (f64, f64) = (0.0, 500.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OnboardingStep {
    #[default]
    Welcome,
    Email,
    Password,
    Name,
    Profile,
    Done,
}

impl OnboardingStep {
    pub fn next(self) -> Self {
        match self {
            OnboardingStep::Welcome => OnboardingStep::Email,
            OnboardingStep::Email => OnboardingStep::Password,
            OnboardingStep::Password => OnboardingStep::Name,
            OnboardingStep::Name => OnboardingStep::Profile,
            OnboardingStep::Profile | OnboardingStep::Done => OnboardingStep::Done,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            OnboardingStep::Welcome | OnboardingStep::Email => OnboardingStep::Welcome,
            OnboardingStep::Password => OnboardingStep::Email,
            OnboardingStep::Name => OnboardingStep::Password,
            OnboardingStep::Profile => OnboardingStep::Name,
            OnboardingStep::Done => OnboardingStep::Profile,
        }
    }
}

/// The profile created at the end of onboarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub weekly_goal_km: Option<f64>,
}

/// Trimmed value has one `@`, a local part, and a dotted domain.
pub fn can_proceed_from_email(email: &str) -> bool {
    let email = email.trim();
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Password and confirmation match and the password is not blank.
pub fn can_proceed_from_password(password: &str, confirmation: &str) -> bool {
    password == confirmation && !password.trim().is_empty()
}

pub fn can_proceed_from_name(name: &str) -> bool {
    let count = name.trim().chars().count();
    (MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&count)
}

fn check_range(field: &str, value: Option<f64>, (min, max): (f64, f64)) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < min || v > max => Err(TurfError::validation(
            field,
            format!("must be between {} and {}", min, max),
        )),
        _ => Ok(()),
    }
}

/// Accumulated onboarding input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    pub step: OnboardingStep,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub display_name: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub weekly_goal_km: Option<f64>,
}

impl OnboardingForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn profile_is_valid(&self) -> bool {
        self.validate_profile().is_ok()
    }

    fn validate_profile(&self) -> Result<()> {
        check_range("height", self.height_cm, HEIGHT_RANGE_CM)?;
        check_range("weight", self.weight_kg, WEIGHT_RANGE_KG)?;
        check_range("weekly goal", self.weekly_goal_km, WEEKLY_GOAL_RANGE_KM)
    }

    /// Whether the guard for the current step holds.
    pub fn can_proceed(&self) -> bool {
        match self.step {
            OnboardingStep::Welcome => true,
            OnboardingStep::Email => can_proceed_from_email(&self.email),
            OnboardingStep::Password => {
                can_proceed_from_password(&self.password, &self.password_confirmation)
            }
            OnboardingStep::Name => can_proceed_from_name(&self.display_name),
            OnboardingStep::Profile => self.profile_is_valid(),
            OnboardingStep::Done => false,
        }
    }

    /// Advance one step if allowed. Returns the resulting step.
    pub fn next(&mut self) -> OnboardingStep {
        if self.can_proceed() {
            self.step = self.step.next();
        }
        self.step
    }

    pub fn back(&mut self) -> OnboardingStep {
        self.step = self.step.previous();
        self.step
    }

    pub fn is_complete(&self) -> bool {
        self.step == OnboardingStep::Done
    }

    /// Validate every field and build the profile.
    pub fn into_profile(self, uid: impl Into<String>) -> Result<UserProfile> {
        if !can_proceed_from_email(&self.email) {
            return Err(TurfError::validation("email", "not a valid address"));
        }
        if !can_proceed_from_password(&self.password, &self.password_confirmation) {
            return Err(TurfError::validation(
                "password",
                "must be non-blank and match the confirmation",
            ));
        }
        if !can_proceed_from_name(&self.display_name) {
            return Err(TurfError::validation(
                "name",
                format!("must be {}-{} characters", MIN_NAME_CHARS, MAX_NAME_CHARS),
            ));
        }
        self.validate_profile()?;

        Ok(UserProfile {
            uid: uid.into(),
            display_name: self.display_name.trim().to_string(),
            email: self.email.trim().to_string(),
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            weekly_goal_km: self.weekly_goal_km,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_truth_table() {
        assert!(can_proceed_from_password("hunter2", "hunter2"));
        assert!(!can_proceed_from_password("hunter2", "hunter3"));
        assert!(!can_proceed_from_password("", ""));
        assert!(!can_proceed_from_password("   ", "   "));
        assert!(!can_proceed_from_password("abc", ""));
        assert!(!can_proceed_from_password("", "abc"));
    }

    #[test]
    fn test_email_guard() {
        assert!(can_proceed_from_email("runner@example.com"));
        assert!(can_proceed_from_email("  runner@mail.example.org "));
        assert!(!can_proceed_from_email("runner@example"));
        assert!(!can_proceed_from_email("@example.com"));
        assert!(!can_proceed_from_email("runner@@example.com"));
        assert!(!can_proceed_from_email("run ner@example.com"));
        assert!(!can_proceed_from_email("runner@.com"));
        assert!(!can_proceed_from_email(""));
    }

    #[test]
    fn test_name_guard() {
        assert!(can_proceed_from_name("Al"));
        assert!(can_proceed_from_name("  Zoë  "));
        assert!(!can_proceed_from_name("A"));
        assert!(!can_proceed_from_name("   "));
        assert!(!can_proceed_from_name(&"x".repeat(41)));
        assert!(can_proceed_from_name(&"x".repeat(40)));
    }

    #[test]
    fn test_form_advances_only_when_guard_holds() {
        let mut form = OnboardingForm::new();
        assert_eq!(form.next(), OnboardingStep::Email);

        form.email = "nope".to_string();
        assert_eq!(form.next(), OnboardingStep::Email);
        form.email = "runner@example.com".to_string();
        assert_eq!(form.next(), OnboardingStep::Password);

        form.password = "secret".to_string();
        form.password_confirmation = "secret!".to_string();
        assert_eq!(form.next(), OnboardingStep::Password);
        form.password_confirmation = "secret".to_string();
        assert_eq!(form.next(), OnboardingStep::Name);

        form.display_name = "Sam".to_string();
        assert_eq!(form.next(), OnboardingStep::Profile);

        form.height_cm = Some(400.0);
        assert_eq!(form.next(), OnboardingStep::Profile);
        form.height_cm = Some(172.0);
        assert_eq!(form.next(), OnboardingStep::Done);
        assert!(form.is_complete());

        assert_eq!(form.back(), OnboardingStep::Profile);
    }

    #[test]
    fn test_into_profile() {
        let form = OnboardingForm {
            step: OnboardingStep::Done,
            email: " runner@example.com".to_string(),
            password: "secret".to_string(),
            password_confirmation: "secret".to_string(),
            display_name: " Sam ".to_string(),
            height_cm: Some(172.0),
            weight_kg: None,
            weekly_goal_km: Some(25.0),
        };
        let profile = form.into_profile("uid-1").unwrap();
        assert_eq!(profile.uid, "uid-1");
        assert_eq!(profile.display_name, "Sam");
        assert_eq!(profile.email, "runner@example.com");
        assert_eq!(profile.weekly_goal_km, Some(25.0));
    }

    #[test]
    fn test_into_profile_rejects_bad_weight() {
        let form = OnboardingForm {
            email: "runner@example.com".to_string(),
            password: "secret".to_string(),
            password_confirmation: "secret".to_string(),
            display_name: "Sam".to_string(),
            weight_kg: Some(5.0),
            ..Default::default()
        };
        let err = form.into_profile("uid-1").unwrap_err();
        assert!(
            matches!(err, TurfError::Validation { ref field, .. } if field == "weight")
        );
    }
}
