//! Status enums returned by the backend.

use serde::{Deserialize, Serialize};

use super::error::ParseError;

/// Role of the calling identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access to catalog, homepage and payment administration.
    Admin,
    /// Signed-in customer.
    User,
    /// Anonymous caller.
    #[default]
    Guest,
}

impl UserRole {
    /// Whether the role grants admin-panel access.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            _ => Err(ParseError::UnknownRole(s.to_string())),
        }
    }
}

/// Result of looking up a payment-processor session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StripeSessionStatus {
    /// Payment completed. `response` is the processor's raw session payload.
    Completed {
        #[serde(
            rename = "userPrincipal",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        user_principal: Option<String>,
        response: String,
    },
    /// Payment failed or the session could not be retrieved.
    Failed { error: String },
}

impl StripeSessionStatus {
    /// Whether the payment went through.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [UserRole::Admin, UserRole::User, UserRole::Guest] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert!("owner".parse::<UserRole>().is_err());
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::default().is_admin());
    }

    #[test]
    fn test_session_status_wire_format() {
        let status: StripeSessionStatus =
            serde_json::from_str(r#"{"completed":{"userPrincipal":"abc","response":"{}"}}"#)
                .unwrap();
        assert!(status.is_completed());

        let status: StripeSessionStatus =
            serde_json::from_str(r#"{"failed":{"error":"card declined"}}"#).unwrap();
        assert_eq!(
            status,
            StripeSessionStatus::Failed {
                error: "card declined".to_string()
            }
        );
    }
}
