use secrecy::SecretString;

/// Container for global runtime arguments shared with the store client.
#[derive(Clone)]
pub struct GlobalArgs {
    /// Platform project the document store belongs to.
    pub project: String,
    /// Base URL of the platform's document-store endpoint.
    pub store_url: String,
    /// Bearer token for store calls; empty for emulator-style deployments.
    pub store_token: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(project: String, store_url: String) -> Self {
        Self {
            project,
            store_url,
            store_token: SecretString::default(),
        }
    }

    pub fn set_store_token(&mut self, token: SecretString) {
        self.store_token = token;
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("project", &self.project)
            .field("store_url", &self.store_url)
            .field("store_token", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            "atacama".to_string(),
            "https://firestore.googleapis.com".to_string(),
        );
        assert_eq!(args.project, "atacama");
        assert_eq!(args.store_url, "https://firestore.googleapis.com");
        assert_eq!(args.store_token.expose_secret(), "");
    }

    #[test]
    fn debug_redacts_the_token() {
        let mut args = GlobalArgs::new("atacama".to_string(), "http://localhost:8087".to_string());
        args.set_store_token(SecretString::from("super-secret".to_string()));

        let rendered = format!("{args:?}");
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("super-secret"));
    }
}
