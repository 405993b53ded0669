use anyhow::{Context, Result};
use audit_engine::{classify_risk, REQUIRED_ROLE_KEY};
use auth_gateway::{GatewayContext, GuardOptions};
use auth_identity::{InMemoryIdentityProvider, InMemoryProfileStore, Session, UserProfile};
use chrono::{Duration, Utc};
use colored::*;
use config_engine::{ConfigLoader, FailurePolicy, GatewayConfig};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Cli, Command, GuardArgs};

/// Load configuration, install logging and dispatch the subcommand
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logger_redacted::init_tracing(&logging).context("installing the tracing subscriber")?;

    match cli.command {
        Command::Health => health(config).await,
        Command::Guard(args) => guard(config, args).await,
        Command::Risk {
            event_type,
            required_roles,
        } => Ok(risk(&event_type, required_roles)),
        Command::Config => print_config(&config),
    }
}

fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    loader.load().context("loading gateway configuration")
}

async fn health(config: GatewayConfig) -> Result<ExitCode> {
    let gateway = GatewayContext::builder(
        config,
        Arc::new(InMemoryIdentityProvider::new()),
        Arc::new(InMemoryProfileStore::new()),
    )
    .build()?;

    info!(api_base_url = %gateway.config().api_base_url, "Probing validation service");
    let status = gateway.health().check_now().await;
    gateway.audit().flush().await;

    println!("{}", serde_json::to_string_pretty(&status)?);
    if status.healthy {
        println!("{}", "validation service healthy".green());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}", "validation service unreachable".red());
        Ok(ExitCode::FAILURE)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GuardReport<'a> {
    location: &'a str,
    local_role: String,
    allowed: bool,
    outcome: auth_gateway::GuardState,
    development_badge: Option<&'static str>,
}

fn guard_options(args: &GuardArgs) -> GuardOptions {
    let mut options = if args.public {
        GuardOptions::public(args.location.clone())
    } else {
        GuardOptions::new(args.location.clone())
    };
    options = options.roles(args.roles.iter().copied()).permissions(args.permissions.iter().cloned());
    if args.clinical {
        options = options.clinical();
    }
    if args.marketing {
        options = options.marketing();
    }
    if args.admin {
        options = options.admin();
    }
    if args.bypass {
        options = options.bypass();
    }
    if args.fail_open {
        options = options.with_failure_policy(FailurePolicy::FailOpen);
    }
    options
}

async fn guard(config: GatewayConfig, args: GuardArgs) -> Result<ExitCode> {
    let subject = Uuid::new_v4();
    let mut provider = InMemoryIdentityProvider::new();
    let mut profiles = InMemoryProfileStore::new();
    if let Some(token) = &args.token {
        provider = provider.with_session(Session::new(subject, token.clone(), Utc::now() + Duration::hours(1)));
        profiles = profiles.with_profile(UserProfile {
            id: subject,
            role: args.role,
            full_name: "Gateway Operator".to_string(),
            email: "operator@localhost".to_string(),
            tenant_id: None,
        });
    }

    let gateway = GatewayContext::builder(config, Arc::new(provider), Arc::new(profiles)).build()?;
    gateway.start().await?;

    let guard = gateway.guard(guard_options(&args));
    let outcome = guard.evaluate().await;
    debug!(generation = guard.generation(), state = outcome.name(), "Guard evaluated");

    let report = GuardReport {
        location: &args.location,
        local_role: args.role.to_string(),
        allowed: outcome.is_allowed(),
        development_badge: guard.development_badge(),
        outcome: outcome.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(reason) = outcome.reason() {
        println!("{} {}", "denied:".red().bold(), reason);
        for action in outcome.recovery_actions(&gateway.config().routes.safe_default_path) {
            println!("  - {}", action.label());
        }
    } else if outcome.is_allowed() {
        println!("{}", "allowed".green().bold());
    }

    gateway.shutdown().await;
    Ok(if outcome.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn risk_metadata(required_roles: Vec<String>) -> Map<String, Value> {
    let mut metadata = Map::new();
    match required_roles.as_slice() {
        [] => {}
        [role] => {
            metadata.insert(REQUIRED_ROLE_KEY.to_string(), json!(role));
        }
        _ => {
            metadata.insert(REQUIRED_ROLE_KEY.to_string(), json!(&required_roles));
        }
    }
    metadata
}

fn risk(event_type: &str, required_roles: Vec<String>) -> ExitCode {
    let level = classify_risk(event_type, &risk_metadata(required_roles));
    println!("{}", level);
    ExitCode::SUCCESS
}

fn print_config(config: &GatewayConfig) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_engine::RiskLevel;
    use auth_identity::Role;

    fn guard_args(location: &str) -> GuardArgs {
        GuardArgs {
            location: location.to_string(),
            token: None,
            role: Role::Patient,
            roles: Vec::new(),
            permissions: Vec::new(),
            clinical: false,
            marketing: false,
            admin: false,
            bypass: false,
            fail_open: false,
            public: false,
        }
    }

    #[test]
    fn test_guard_options_from_flags() {
        let mut args = guard_args("/reports");
        args.admin = true;
        args.fail_open = true;
        args.roles = vec![Role::PracticeAdmin];

        let options = guard_options(&args);
        assert!(options.require_admin_access);
        assert!(options.require_auth);
        assert_eq!(options.required_roles, vec![Role::PracticeAdmin]);
        assert_eq!(options.failure_policy, Some(FailurePolicy::FailOpen));
    }

    #[test]
    fn test_public_flag_drops_auth_requirement() {
        let mut args = guard_args("/about");
        args.public = true;
        assert!(!guard_options(&args).require_auth);
    }

    #[test]
    fn test_risk_metadata_shapes() {
        assert!(risk_metadata(Vec::new()).is_empty());

        let single = risk_metadata(vec!["super_admin".to_string()]);
        assert_eq!(classify_risk("access_validation_granted", &single), RiskLevel::Medium);

        let several = risk_metadata(vec!["nurse".to_string(), "practice_admin".to_string()]);
        assert_eq!(several[REQUIRED_ROLE_KEY], json!(["nurse", "practice_admin"]));
        assert_eq!(classify_risk("access_validation_granted", &several), RiskLevel::Medium);
    }
}
