pub mod booking;
pub mod flight;
pub mod gateway;
pub mod notification;
pub mod payment;
pub mod repository;
pub mod user;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment gateway {0} is not configured")]
    GatewayUnavailable(String),
    #[error("Payment gateway {gateway} failed: {message}")]
    GatewayError { gateway: String, message: String },
    #[error("Webhook signature verification failed: {0}")]
    SignatureInvalid(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Generates the `enum <-> snake_case string` plumbing shared by every status column.
#[macro_export]
macro_rules! string_enum {
    ($name:ident, $label:expr, { $($variant:ident => $text:expr),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => {
                        let valid: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        Err($crate::CoreError::ValidationError(format!(
                            "Invalid {} '{}'. Valid values: {}",
                            $label,
                            other,
                            valid.join(", ")
                        )))
                    }
                }
            }
        }
    };
}
