pub mod client;
pub mod error;
pub mod identity;
pub mod session;
pub mod storage;

pub use client::AuthClient;
pub use error::AuthError;
pub use identity::Identity;
pub use session::{AuthSession, AuthState};
pub use storage::{Session, SessionStorage};
