//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// setup-vapoursynth - Provision VapourSynth and zimg on CI workers
///
/// Restores a cached build when one matches, otherwise builds from source
/// and caches the result.
#[derive(Parser, Debug)]
#[command(name = "setup-vapoursynth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SETUP_VS_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a VapourSynth version
    Install(InstallArgs),

    /// List known versions
    Versions(VersionsArgs),

    /// Inspect the local build cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Version name or alias (e.g. R72, 72, latest)
    #[arg(value_name = "VERSION", env = "INPUT_VERSION", default_value = "latest")]
    pub token: String,

    /// Use the build cache ("false" disables it)
    #[arg(long, env = "INPUT_CACHE", default_value = "true")]
    pub cache: String,
}

impl InstallArgs {
    /// Anything but the literal `false` keeps the cache on
    pub fn cache_enabled(&self) -> bool {
        self.cache.trim() != "false"
    }

    /// Requested version, `latest` when blank
    pub fn version_token(&self) -> &str {
        match self.token.trim() {
            "" => "latest",
            token => token,
        }
    }
}

/// Arguments for the versions command
#[derive(Parser, Debug)]
pub struct VersionsArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the lookup keys for a version on this worker
    Keys {
        /// Version name or alias
        #[arg(value_name = "VERSION", default_value = "latest")]
        token: String,
    },

    /// Remove cache entries
    Clear {
        /// Remove only the entry with this exact key
        key: Option<String>,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_install() {
        let cli = Cli::parse_from(["setup-vapoursynth", "install", "R70", "--cache", "true"]);
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.version_token(), "R70");
                assert!(args.cache_enabled());
            }
            _ => panic!("expected Install command"),
        }
    }

    #[test]
    fn cache_disabled_only_by_literal_false() {
        let args = InstallArgs {
            token: "latest".to_string(),
            cache: "false".to_string(),
        };
        assert!(!args.cache_enabled());

        let args = InstallArgs {
            token: "latest".to_string(),
            cache: "no".to_string(),
        };
        assert!(args.cache_enabled());
    }

    #[test]
    fn blank_version_means_latest() {
        let args = InstallArgs {
            token: "  ".to_string(),
            cache: "true".to_string(),
        };
        assert_eq!(args.version_token(), "latest");
    }

    #[test]
    fn cli_parses_cache_clear() {
        let cli = Cli::parse_from(["setup-vapoursynth", "cache", "clear", "some-key"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Clear { key },
            }) => assert_eq!(key.as_deref(), Some("some-key")),
            _ => panic!("expected cache clear"),
        }
    }

    #[test]
    fn cli_parses_versions_format() {
        let cli = Cli::parse_from(["setup-vapoursynth", "-vv", "versions", "--format", "json"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Versions(VersionsArgs {
                format: OutputFormat::Json
            })
        ));
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
