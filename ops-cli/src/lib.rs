//! Operator CLI for the RustCare client access gateway
//!
//! Lets an operator check what the gateway would do against a live
//! authorization server without going through a client application:
//!
//! - **health**: probe the validation service once
//! - **guard**: run a single guard evaluation with a given token and local role
//! - **risk**: show the risk level a security event would be filed under
//! - **config**: print the effective layered configuration
//!
//! # Example Usage
//!
//! ```bash
//! rustcare-gateway health
//! rustcare-gateway --config gateway.toml guard /patients --clinical --role clinician --token "$TOKEN"
//! rustcare-gateway risk access_validation_granted --required-role practice_admin
//! rustcare-gateway config
//! ```

pub mod commands;

use auth_identity::Role;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rustcare-gateway")]
#[command(about = "Probe and exercise the RustCare client access gateway")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); environment overrides still apply
    #[arg(short, long, global = true, env = "RUSTCARE_GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the validation service health endpoint once
    Health,

    /// Evaluate one guard against the authorization server
    Guard(GuardArgs),

    /// Classify a security event type
    Risk {
        /// Event type, e.g. `access_validation_denied`
        event_type: String,

        /// Value of the `requiredRole` metadata key; repeat for several roles
        #[arg(long = "required-role")]
        required_roles: Vec<String>,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Args, Debug)]
pub struct GuardArgs {
    /// Location being guarded, e.g. `/patients`
    pub location: String,

    /// Bearer token of the session to evaluate with
    #[arg(long, env = "RUSTCARE_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Role the client believes the caller has
    #[arg(long, default_value = "patient")]
    pub role: Role,

    /// Require any of these roles (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub roles: Vec<Role>,

    /// Required permissions (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub permissions: Vec<String>,

    #[arg(long)]
    pub clinical: bool,

    #[arg(long)]
    pub marketing: bool,

    #[arg(long)]
    pub admin: bool,

    /// Skip server validation (audited)
    #[arg(long)]
    pub bypass: bool,

    /// Allow on the local check alone while the service is unhealthy
    #[arg(long)]
    pub fail_open: bool,

    /// Do not require a session
    #[arg(long)]
    pub public: bool,
}

pub use commands::run;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_guard_command() {
        let cli = Cli::try_parse_from([
            "rustcare-gateway",
            "guard",
            "/patients",
            "--clinical",
            "--role",
            "nurse",
            "--roles",
            "clinician,practice_admin",
            "--token",
            "abc",
        ])
        .unwrap();

        let Command::Guard(args) = cli.command else {
            panic!("expected guard command");
        };
        assert_eq!(args.location, "/patients");
        assert!(args.clinical);
        assert_eq!(args.role, Role::Nurse);
        assert_eq!(args.roles, vec![Role::Clinician, Role::PracticeAdmin]);
        assert_eq!(args.token.as_deref(), Some("abc"));
        assert!(!args.bypass);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = Cli::try_parse_from(["rustcare-gateway", "guard", "/x", "--role", "wizard"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rustcare-gateway",
            "risk",
            "access_validation_granted",
            "--required-role",
            "super_admin",
            "--verbose",
            "--config",
            "gateway.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("gateway.toml")));
        match cli.command {
            Command::Risk {
                event_type,
                required_roles,
            } => {
                assert_eq!(event_type, "access_validation_granted");
                assert_eq!(required_roles, vec!["super_admin".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
