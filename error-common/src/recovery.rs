use serde::{Deserialize, Serialize};

/// A recovery affordance offered to the user alongside a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Re-run the guarded operation (explicit, user-triggered)
    Retry,
    /// Navigate back to the previous view
    GoBack,
    /// Navigate to a view every authenticated user may see
    GoToSafeDefault { path: String },
    /// Sign in, then return to the attempted location
    SignIn { login_url: String },
}

impl RecoveryAction {
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryAction::Retry => "Try again",
            RecoveryAction::GoBack => "Go back",
            RecoveryAction::GoToSafeDefault { .. } => "Go to dashboard",
            RecoveryAction::SignIn { .. } => "Sign in",
        }
    }
}
