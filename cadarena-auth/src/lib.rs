//! CadArena authentication core: password and credential lifecycle, JWT
//! issuance/validation, brute-force lockout, and the expiring-token flows
//! (email verification, password reset, refresh rotation). Transport and
//! persistent storage are collaborators; see [`store::AuthStore`].

pub mod config;
pub mod models;
pub mod services;
pub mod store;

pub use config::AuthConfig;
pub use services::auth_service::{AuthService, SignupRequest};
