use crate::{error::AppError, middleware::auth::AuthUser};

/// Capabilities checked at the endpoint layer. The order core itself carries
/// no role awareness; it trusts the identity handed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PlaceOrder,
    ViewOwnOrders,
    ViewAllOrders,
    ManageCatalog,
}

pub fn allows(role: &str, action: Action) -> bool {
    match action {
        Action::PlaceOrder => role == "buyer",
        Action::ViewOwnOrders => role == "buyer" || role == "admin",
        Action::ViewAllOrders | Action::ManageCatalog => role == "admin",
    }
}

pub fn authorize(user: &AuthUser, action: Action) -> Result<(), AppError> {
    if allows(&user.role, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
