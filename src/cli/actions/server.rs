use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            let auth_config = AuthConfig::new(
                globals.access_token_secret.clone(),
                globals.refresh_token_secret.clone(),
            )
            .with_access_token_ttl_seconds(globals.access_token_ttl_seconds)
            .with_refresh_token_ttl_seconds(globals.refresh_token_ttl_seconds)
            .with_frontend_origin(globals.frontend_origin.clone());

            api::new(port, dsn, auth_config).await?;
        }
    }

    Ok(())
}
