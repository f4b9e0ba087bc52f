use serde::{Deserialize, Serialize};

/// A home: the root of device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    pub id: i64,
    pub name: String,
}
