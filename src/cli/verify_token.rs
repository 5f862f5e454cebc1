use super::{CommandContext, CommandStatus};
use crate::core::JarflowError;
use crate::hosting::{HostingApi, RepoAccess};
use crate::publisher::map_api_error;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::debug;

#[derive(Args, Debug)]
pub struct VerifyTokenCommand {}

impl VerifyTokenCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<CommandStatus> {
        let settings = ctx.hosting()?;
        let client = ctx.github(&settings)?;
        let repository = settings.repo.full_name();

        let (login, access) = verify_access(&client, &repository).await?;
        println!("{} Authenticated as {}", "✓".green(), login.bold());
        println!("  repository:     {}", access.full_name);
        println!("  default branch: {}", access.default_branch);
        println!("  private:        {}", access.private);
        println!("  push:           {}", "yes".green());
        Ok(CommandStatus::Success)
    }
}

/// Identity behind the token and its access to `repository`.
///
/// Read access without push is reported as [`JarflowError::PermissionDenied`].
async fn verify_access<H: HostingApi>(
    api: &H,
    repository: &str,
) -> Result<(String, RepoAccess), JarflowError> {
    let login = api
        .current_user()
        .await
        .map_err(|e| map_api_error(repository, "read the authenticated user", e))?;
    debug!("Token belongs to {}", login);

    let access = api
        .repository_access()
        .await
        .map_err(|e| map_api_error(repository, "read repository", e))?;
    if !access.push {
        return Err(JarflowError::PermissionDenied {
            operation: "push".to_string(),
            repository: repository.to_string(),
        });
    }
    Ok((login, access))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::ApiError;
    use crate::test_utils::MockHostingApi;

    #[tokio::test]
    async fn test_token_with_push_access_passes() {
        let api = MockHostingApi::new();
        let (login, access) = verify_access(&api, "acme/nifi").await.unwrap();
        assert_eq!(login, "jarflow-bot");
        assert_eq!(access.default_branch, "main");
    }

    #[tokio::test]
    async fn test_read_only_token_is_rejected() {
        let api = MockHostingApi::new();
        api.set_push_permission(false);
        let err = verify_access(&api, "acme/nifi").await.unwrap_err();
        assert!(matches!(
            err,
            JarflowError::PermissionDenied { ref operation, .. } if operation == "push"
        ));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_authentication_failures() {
        let api = MockHostingApi::new();
        api.fail_next("current_user", ApiError::Unauthorized("Bad credentials".into()));
        let err = verify_access(&api, "acme/nifi").await.unwrap_err();
        assert!(matches!(err, JarflowError::AuthenticationFailed { .. }));
    }
}
