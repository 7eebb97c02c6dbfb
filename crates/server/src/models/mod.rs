mod campaign;
mod chat;
mod file;
mod note;
mod user;
mod whiteboard;

pub use campaign::*;
pub use chat::*;
pub use file::*;
pub use note::*;
pub use user::*;
pub use whiteboard::*;

use tabletop_shared::constants::USER_ROLE_ADMIN;

/// The signed-in user, resolved from the session token on each request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == USER_ROLE_ADMIN
    }
}
