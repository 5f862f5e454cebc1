//! Argument parsing and command dispatch tests for the CLI.
//!
//! Commands that need the network or docker are covered through the pipeline
//! tests with mocks; here they are only parsed.

#[cfg(test)]
mod cli_tests {
    use crate::cli::{Cli, CommandContext, CommandStatus, Commands};
    use clap::Parser;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["jarflow", "--help"]);
        assert!(cli.is_err());

        let cli = Cli::try_parse_from(["jarflow", "scan"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_all_commands() {
        let commands = [
            vec!["jarflow", "detect"],
            vec!["jarflow", "detect", "--range", "abc..def", "--require", "manifest", "--json"],
            vec!["jarflow", "scan", "--dry-run"],
            vec!["jarflow", "scan", "--only-on-change", "--range", "abc..def"],
            vec!["jarflow", "patch-recipe"],
            vec!["jarflow", "build", "--no-push", "--commit", "abc1234"],
            vec!["jarflow", "update-descriptor", "--tag", "abc1234", "--dry-run"],
            vec!["jarflow", "run", "--only-on-change"],
            vec!["jarflow", "verify-token"],
        ];
        for args in commands {
            assert!(Cli::try_parse_from(&args).is_ok(), "failed to parse {args:?}");
        }
    }

    #[test]
    fn test_subcommand_dispatch() {
        let cli = Cli::try_parse_from(["jarflow", "update-descriptor"]).unwrap();
        assert!(matches!(cli.command, Commands::UpdateDescriptor(_)));

        let cli = Cli::try_parse_from(["jarflow", "verify-token"]).unwrap();
        assert!(matches!(cli.command, Commands::VerifyToken(_)));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let cli = Cli::try_parse_from(["jarflow", "--verbose", "--quiet", "scan"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::try_parse_from(["jarflow", "scan"]).unwrap();
        assert_eq!(cli.log_level(), "info");

        let cli = Cli::try_parse_from(["jarflow", "-v", "scan"]).unwrap();
        assert_eq!(cli.log_level(), "debug");

        let cli = Cli::try_parse_from(["jarflow", "scan", "--quiet"]).unwrap();
        assert_eq!(cli.log_level(), "error");
    }

    #[test]
    fn test_range_requires_only_on_change() {
        assert!(Cli::try_parse_from(["jarflow", "scan", "--range", "a..b"]).is_err());
        assert!(Cli::try_parse_from(["jarflow", "run", "--range", "a..b"]).is_err());
        assert!(Cli::try_parse_from(["jarflow", "detect", "--range", "a..b"]).is_ok());
    }

    #[test]
    fn test_global_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "jarflow",
            "build",
            "--repo-root",
            "/work",
            "--registry-host",
            "registry.test",
            "--repo-owner",
            "acme",
            "--repo-name",
            "nifi",
            "--base-branch",
            "develop",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.repo_root.as_deref(), Some(std::path::Path::new("/work")));
        assert_eq!(overrides.registry_host.as_deref(), Some("registry.test"));
        assert_eq!(overrides.repo_owner.as_deref(), Some("acme"));
        assert_eq!(overrides.repo_name.as_deref(), Some("nifi"));
        assert_eq!(overrides.base_branch.as_deref(), Some("develop"));
        assert!(overrides.recipe.is_none());
    }

    fn context(root: &std::path::Path) -> CommandContext {
        use crate::config::{ConfigFile, ConfigOverrides, EnvSource, PipelineConfig};
        use crate::test_utils::fixtures::REGISTRY;

        let env = EnvSource::from_pairs(Vec::<(String, String)>::new());
        let overrides = ConfigOverrides {
            repo_root: Some(root.to_path_buf()),
            registry_host: Some(REGISTRY.to_string()),
            ..ConfigOverrides::default()
        };
        CommandContext {
            config: PipelineConfig::resolve(overrides, ConfigFile::default(), &env),
            env,
        }
    }

    #[tokio::test]
    async fn test_patch_recipe_writes_dockerfile() {
        use crate::cli::patch_recipe::PatchRecipeCommand;
        use crate::test_utils::fixtures::{MYSQL_MANIFEST, write_manifest, write_repo};

        let temp = tempfile::TempDir::new().unwrap();
        write_repo(temp.path());
        write_manifest(temp.path(), "mysql.json", MYSQL_MANIFEST);
        let ctx = context(temp.path());

        let status = PatchRecipeCommand {}.execute(&ctx).await.unwrap();
        assert_eq!(status, CommandStatus::Success);

        let recipe = std::fs::read_to_string(ctx.config.recipe_file()).unwrap();
        assert!(recipe.contains("mysql-connector-j-9.5.0.jar"));
    }

    #[tokio::test]
    async fn test_verify_token_without_token_fails() {
        use crate::cli::verify_token::VerifyTokenCommand;
        use crate::core::JarflowError;

        let temp = tempfile::TempDir::new().unwrap();
        let ctx = context(temp.path());

        let err = VerifyTokenCommand {}.execute(&ctx).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<JarflowError>(), Some(JarflowError::MissingToken)));
    }
}
