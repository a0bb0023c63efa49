use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::models::User;

fn validate_role(role: &str) -> Result<(), ValidationError> {
    if role == "buyer" || role == "admin" {
        Ok(())
    } else {
        Err(ValidationError::new("role").with_message("role must be buyer or admin".into()))
    }
}

#[derive(Deserialize, Debug, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

#[derive(Deserialize, Debug, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_roles() {
        assert!(validate_role("buyer").is_ok());
        assert!(validate_role("admin").is_ok());
        assert!(validate_role("seller").is_err());
        assert!(validate_role("").is_err());
    }

    #[test]
    fn register_request_requires_valid_email() {
        let req = RegisterRequest {
            name: "Naufal".into(),
            email: "not-an-email".into(),
            password: "password123".into(),
            role: "buyer".into(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }
}
