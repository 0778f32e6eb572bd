pub mod auth;

pub use auth::{bearer_session, session_auth_middleware, SessionClaims};
