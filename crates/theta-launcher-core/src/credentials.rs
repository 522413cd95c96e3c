use serde::{Deserialize, Serialize};

/// ThetaData account credentials passed to the terminal on its command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// True when either field is missing; the terminal rejects such logins
    pub fn is_incomplete(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_credentials() {
        assert!(Credentials::default().is_incomplete());
        assert!(Credentials::new("user", "").is_incomplete());
        assert!(Credentials::new("", "pass").is_incomplete());
        assert!(!Credentials::new("user", "pass").is_incomplete());
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let creds: Credentials = serde_json::from_str("{}").unwrap();
        assert!(creds.is_incomplete());

        let creds: Credentials = serde_json::from_str(r#"{"username":"u"}"#).unwrap();
        assert_eq!(creds.username, "u");
        assert!(creds.password.is_empty());
    }
}
