pub mod credentials;
pub mod validation;

pub use credentials::CredentialStore;
pub use validation::{PasswordStrength, SignupForm, Validation};
