use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile owned by the identity service; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}
