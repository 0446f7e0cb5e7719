//!
//! invariance operator CLI
//! -----------------------
//! Drives an instance persisted in a state directory: deploy, upgrade and
//! verify its logic, administer roles, record analyses and inspect events.
//! Every command prints one JSON document on stdout. Core failures print a
//! JSON error on stderr and exit with a sysexits-style code.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use invariance::access::{parse_role, role_label};
use invariance::config::{parse_bool_env, InstanceSettings};
use invariance::events::{EventFilter, NotificationKind};
use invariance::logic::LogicManifest;
use invariance::registry::{RiskLevel, Warning, WarningCategory};
use invariance::tools::{self, deploy, upgrade, verify};
use invariance::{Address, AppResult, CallContext, Instance, RegistryError};

const USAGE: &str = "invariance_cli\n\nUSAGE:\n  invariance_cli [--state-dir DIR] [--as ADDRESS] <COMMAND> [ARGS]\n\nCOMMANDS:\n  deploy [--manifest PATH] [--dry-run]     Deploy a fresh instance with the operator as admin\n  upgrade --manifest PATH [--check]        Switch the instance to new logic (--check: only report compatibility)\n  verify [--publish-dir DIR]               Publish the active logic manifest\n  info                                     Instance status\n  grant ROLE ACCOUNT                       Grant a role (admin, analyzer, NAME or 0x id)\n  revoke ROLE ACCOUNT                      Revoke a role\n  renounce ROLE                            Drop one of the operator's own roles\n  has-role ROLE ACCOUNT                    Membership check\n  members ROLE                             List holders of a role\n  record ENTITY SCORE LEVEL [--warn CATEGORY:MESSAGE]...\n                                           Record an analysis\n  warn ENTITY CATEGORY MESSAGE [--reference REF]\n                                           Append one warning\n  show ENTITY                              Analysis record of an entity\n  list                                     Analysed entities\n  events [--kind K] [--entity ADDR] [--from N] [--limit N]\n                                           Query the event journal\n\nOPTIONS:\n  --state-dir DIR   Instance state directory (env: INVARIANCE_STATE_DIR, default invariance-state)\n  --as ADDRESS      Operator address (env: INVARIANCE_OPERATOR)\n  --dry-run         Deploy only: simulate without writing (env: INVARIANCE_DRY_RUN)\n";

fn take_value(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    let Some(i) = args.iter().position(|a| a == flag) else { return Ok(None) };
    if i + 1 >= args.len() { bail!("{} needs a value", flag); }
    let v = args.remove(i + 1);
    args.remove(i);
    Ok(Some(v))
}

fn take_all(args: &mut Vec<String>, flag: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    while let Some(v) = take_value(args, flag)? { out.push(v); }
    Ok(out)
}

fn take_switch(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(i) => { args.remove(i); true }
        None => false,
    }
}

fn positional<'a>(args: &'a [String], idx: usize, what: &str) -> Result<&'a str> {
    args.get(idx).map(|s| s.as_str()).ok_or_else(|| anyhow!("missing {}", what))
}

fn parse_warning_arg(text: &str) -> AppResult<Warning> {
    let (cat, msg) = text
        .split_once(':')
        .ok_or_else(|| RegistryError::invalid_input("warning", format!("expected CATEGORY:MESSAGE, got '{}'", text)))?;
    Ok(Warning::new(cat.parse::<WarningCategory>()?, msg.trim()))
}

struct Cli {
    state_dir: PathBuf,
    operator: Option<Address>,
    settings: InstanceSettings,
}

impl Cli {
    fn operator(&self) -> Result<Address> {
        self.operator.ok_or_else(|| anyhow!("operator address required: pass --as or set INVARIANCE_OPERATOR"))
    }

    fn ctx(&self) -> Result<CallContext> { Ok(CallContext::new(self.operator()?)) }

    fn open(&self) -> Result<Instance> { Ok(tools::open_instance(&self.state_dir, self.settings.clone())?.0) }

    /// Run one core call against the persisted instance and save it if the call committed.
    fn mutate<T>(&self, f: impl FnOnce(&Instance, &CallContext) -> AppResult<T>) -> Result<T> {
        let ctx = self.ctx()?;
        let instance = self.open()?;
        let out = f(&instance, &ctx)?;
        instance.persist(&self.state_dir)?;
        Ok(out)
    }
}

fn load_manifest(path: &str) -> Result<LogicManifest> { LogicManifest::load(Path::new(path)) }

fn run(mut args: Vec<String>) -> Result<Value> {
    let state_dir = take_value(&mut args, "--state-dir")?
        .or_else(|| env::var("INVARIANCE_STATE_DIR").ok())
        .unwrap_or_else(|| "invariance-state".to_string());
    let operator = match take_value(&mut args, "--as")?.or_else(|| env::var("INVARIANCE_OPERATOR").ok()) {
        Some(text) => Some(Address::parse(&text)?),
        None => None,
    };
    let state_dir = PathBuf::from(state_dir);
    let settings = InstanceSettings::load(&state_dir)?;
    let cli = Cli { state_dir, operator, settings };

    if args.is_empty() { bail!("no command given\n\n{}", USAGE); }
    let cmd = args.remove(0);
    info!(target: "invariance::cli", "command={} state_dir='{}'", cmd, cli.state_dir.display());

    let value = match cmd.as_str() {
        "deploy" => {
            let manifest = take_value(&mut args, "--manifest")?.map(|p| load_manifest(&p)).transpose()?;
            let dry_run = take_switch(&mut args, "--dry-run") || parse_bool_env("INVARIANCE_DRY_RUN").unwrap_or(false);
            let opts = deploy::DeployOptions { deployer: cli.operator()?, manifest, dry_run };
            serde_json::to_value(deploy::deploy(&cli.state_dir, cli.settings.clone(), &opts)?)?
        }
        "upgrade" => {
            let path = take_value(&mut args, "--manifest")?.ok_or_else(|| anyhow!("upgrade needs --manifest PATH"))?;
            let manifest = load_manifest(&path)?;
            if take_switch(&mut args, "--check") {
                serde_json::to_value(upgrade::validate(&cli.state_dir, cli.settings.clone(), &manifest)?)?
            } else {
                serde_json::to_value(upgrade::upgrade(&cli.state_dir, cli.settings.clone(), cli.operator()?, &manifest)?)?
            }
        }
        "verify" => {
            let dir = take_value(&mut args, "--publish-dir")?
                .map(PathBuf::from)
                .unwrap_or_else(|| invariance::paths::published_dir(&cli.state_dir));
            let publisher = verify::DirectoryPublisher::new(dir);
            serde_json::to_value(verify::verify(&cli.state_dir, cli.settings.clone(), &publisher)?)?
        }
        "info" => {
            let instance = cli.open()?;
            json!({ "status": instance.status(), "phase": instance.phase(), "history": instance.history() })
        }
        "grant" | "revoke" => {
            let role = parse_role(positional(&args, 0, "ROLE")?)?;
            let account = Address::parse(positional(&args, 1, "ACCOUNT")?)?;
            let changed = if cmd == "grant" {
                cli.mutate(|i, ctx| i.grant_role(ctx, role, account))?
            } else {
                cli.mutate(|i, ctx| i.revoke_role(ctx, role, account))?
            };
            json!({ "role": role_label(role), "account": account, "changed": changed })
        }
        "renounce" => {
            let role = parse_role(positional(&args, 0, "ROLE")?)?;
            let changed = cli.mutate(|i, ctx| i.renounce_role(ctx, role))?;
            json!({ "role": role_label(role), "account": cli.operator()?, "changed": changed })
        }
        "has-role" => {
            let role = parse_role(positional(&args, 0, "ROLE")?)?;
            let account = Address::parse(positional(&args, 1, "ACCOUNT")?)?;
            json!({ "role": role_label(role), "account": account, "has_role": cli.open()?.has_role(role, &account) })
        }
        "members" => {
            let role = parse_role(positional(&args, 0, "ROLE")?)?;
            let instance = cli.open()?;
            json!({ "role": role_label(role), "admin_role": role_label(instance.role_admin(role)), "members": instance.role_members(role) })
        }
        "record" => {
            let warnings = take_all(&mut args, "--warn")?
                .iter()
                .map(|w| parse_warning_arg(w))
                .collect::<AppResult<Vec<_>>>()?;
            let entity = Address::parse(positional(&args, 0, "ENTITY")?)?;
            let score_text = positional(&args, 1, "SCORE")?;
            let score = score_text
                .parse::<u8>()
                .map_err(|_| RegistryError::invalid_input("fraud_surface", format!("'{}' is not a score", score_text)))?;
            let level = positional(&args, 2, "LEVEL")?.parse::<RiskLevel>()?;
            let count = cli.mutate(|i, ctx| i.record_analysis(ctx, entity, score, level, warnings))?;
            json!({ "entity": entity, "fraud_surface": score, "risk_level": level, "warnings": count })
        }
        "warn" => {
            let reference = take_value(&mut args, "--reference")?;
            let entity = Address::parse(positional(&args, 0, "ENTITY")?)?;
            let category = positional(&args, 1, "CATEGORY")?.parse::<WarningCategory>()?;
            let mut warning = Warning::new(category, positional(&args, 2, "MESSAGE")?);
            if let Some(r) = reference { warning = warning.with_reference(r); }
            let count = cli.mutate(|i, ctx| i.add_warning(ctx, entity, warning))?;
            json!({ "entity": entity, "warnings": count })
        }
        "show" => {
            let entity = Address::parse(positional(&args, 0, "ENTITY")?)?;
            let record = cli.open()?.get_analysis(&entity).ok_or(RegistryError::NotAnalyzed { entity })?;
            json!({ "entity": entity, "record": record })
        }
        "list" => json!({ "entities": cli.open()?.analyzed_entities() }),
        "events" => {
            let kind = take_value(&mut args, "--kind")?.map(|k| k.parse::<NotificationKind>()).transpose()?;
            let subject = take_value(&mut args, "--entity")?.map(|e| Address::parse(&e)).transpose()?;
            let from_seq = take_value(&mut args, "--from")?.map(|n| n.parse::<u64>()).transpose().context("--from")?.unwrap_or(0);
            let limit = take_value(&mut args, "--limit")?.map(|n| n.parse::<usize>()).transpose().context("--limit")?;
            let filter = EventFilter { kind, subject, from_seq, limit };
            json!({ "events": cli.open()?.events(&filter) })
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    };
    Ok(value)
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(v) => {
            println!("{}", serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string()));
            ExitCode::SUCCESS
        }
        Err(e) => match e.downcast_ref::<RegistryError>() {
            Some(core) => {
                eprintln!("{}", json!({ "error": core, "code": core.code_str(), "message": core.to_string() }));
                ExitCode::from(core.exit_code() as u8)
            }
            None => {
                eprintln!("error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}
