use serde::{Deserialize, Serialize};

/// JWT payload carried by an admin session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,          // user ID
    pub username: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,    // claim at issuance; never trusted for authorization
    pub iat: usize,        // issued at (unix timestamp)
    pub exp: usize,        // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

/// Who a verified token says the caller is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self {
            id: c.sub,
            username: c.username,
            is_admin: c.is_admin,
        }
    }
}
