use secrecy::SecretString;

/// Configuration shared by every action, resolved once at startup.
///
/// Signing secrets are carried here explicitly instead of being read from the
/// environment at use sites. The access and refresh secrets are independent;
/// a token signed with one never satisfies verification against the other.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub frontend_origin: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(access_token_secret: SecretString, refresh_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: 3600,
            refresh_token_ttl_seconds: 86400,
            frontend_origin: "http://localhost:3000".to_string(),
        }
    }
}
