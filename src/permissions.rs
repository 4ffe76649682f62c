//! Role and capability checks.
//!
//! Roles are a closed enum and `can` is a pure lookup, so authorization is
//! testable without any request context.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageCourses,
    ManageSections,
    ManageLessons,
    ManageProducts,
    ViewAllPurchases,
    RefundPurchases,
    ViewStats,
    Checkout,
    ViewOwnPurchases,
}

pub fn can(role: Role, action: Action) -> bool {
    match action {
        Action::ManageCourses
        | Action::ManageSections
        | Action::ManageLessons
        | Action::ManageProducts
        | Action::ViewAllPurchases
        | Action::RefundPurchases
        | Action::ViewStats => role == Role::Admin,
        Action::Checkout | Action::ViewOwnPurchases => true,
    }
}

pub fn ensure_can(role: Role, action: Action) -> Result<(), AppError> {
    if can(role, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_every_capability() {
        for action in [
            Action::ManageCourses,
            Action::ManageSections,
            Action::ManageLessons,
            Action::ManageProducts,
            Action::ViewAllPurchases,
            Action::RefundPurchases,
            Action::ViewStats,
            Action::Checkout,
            Action::ViewOwnPurchases,
        ] {
            assert!(can(Role::Admin, action), "{action:?}");
        }
    }

    #[test]
    fn user_is_limited_to_consumer_actions() {
        assert!(can(Role::User, Action::Checkout));
        assert!(can(Role::User, Action::ViewOwnPurchases));
        assert!(!can(Role::User, Action::ManageSections));
        assert!(!can(Role::User, Action::RefundPurchases));
        assert!(!can(Role::User, Action::ViewStats));
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse(Role::Admin.as_str()), Some(Role::Admin));
    }
}
