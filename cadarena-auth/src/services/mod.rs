pub mod auth_service;
pub mod ephemeral;
pub mod lockout;
pub mod password;
pub mod token_service;
