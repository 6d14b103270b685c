//! OpenSkills CLI
//!
//! Inspect skill roots, render prompts and manage the configuration file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use console::style;
use openskills::config::{
    config_path, default_skills_dir, load_config, load_config_from_path, apply_env_overrides,
    read_config_snapshot, save_config, validate_config,
};
use openskills::providers::{FsProvider, FsProviderConfig};
use openskills::{
    ActivationMode, Context, PromptSection, RuntimeConfig, SessionOptions, SkillDef, SkillFilter,
    SkillRecord, SkillRuntime, VERSION,
};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "openskills",
    version = VERSION,
    about = "OpenSkills - skill runtime for LLM agents",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to the user config path)
    #[arg(long, short, global = true, env = "OPENSKILLS_CONFIG")]
    config: Option<PathBuf>,

    /// Extra skill root directory (repeatable)
    #[arg(long = "root", short = 'r', global = true)]
    roots: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List skills found under the skill roots
    List {
        /// Only skills whose name starts with this prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one skill's metadata and body
    Show {
        /// Skill name
        name: String,
        /// Location, when several skills share the name
        #[arg(long)]
        location: Option<String>,
    },

    /// Render the skills prompt an agent would receive
    Prompt {
        /// Skills to activate first, by name
        #[arg(long, short)]
        activate: Vec<String>,
        /// Section to render: available, active or combined
        #[arg(long, default_value = "combined")]
        section: String,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },

    /// Validate the configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::InitConfig { force } => return init_config(&cli, *force),
        Commands::CheckConfig => return check_config(&cli),
        _ => {}
    }

    let config = load(&cli)?;
    openskills::logging::init_tracing(&config.log)?;
    let runtime = build_runtime(config).await?;

    match cli.command {
        Commands::List { prefix, json } => list(&runtime, prefix, json),
        Commands::Show { name, location } => show(&runtime, &name, location.as_deref()).await,
        Commands::Prompt { activate, section } => prompt(&runtime, &activate, &section).await,
        Commands::InitConfig { .. } | Commands::CheckConfig => Ok(()),
    }
}

fn target_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(config_path)
}

fn load(cli: &Cli) -> anyhow::Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = load_config_from_path(path)?;
            apply_env_overrides(&mut config);
            config
        }
        None => load_config()?,
    };

    config.filesystem.roots.extend(cli.roots.iter().cloned());
    if config.filesystem.roots.is_empty() {
        config.filesystem.roots.push(default_skills_dir());
    }
    Ok(config)
}

async fn build_runtime(config: RuntimeConfig) -> anyhow::Result<SkillRuntime> {
    let provider = FsProvider::new(FsProviderConfig::from(&config.filesystem));
    let runtime = SkillRuntime::new(config)?;
    runtime.register_provider(Arc::new(provider))?;

    let added = runtime
        .load_filesystem_roots(&Context::background())
        .await
        .context("loading skill roots")?;
    debug!(skills = added.len(), "Runtime ready");
    Ok(runtime)
}

fn list(runtime: &SkillRuntime, prefix: Option<String>, json: bool) -> anyhow::Result<()> {
    let mut filter = SkillFilter::all();
    if let Some(prefix) = prefix {
        filter = filter.with_name_prefix(prefix);
    }
    let records = runtime.list_skills(&filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No skills found in:", style("ℹ").blue());
        for root in &runtime.config().filesystem.roots {
            println!("   └─ {}", root.display());
        }
        return Ok(());
    }

    println!("\n{}", style(format!("{} skill(s)", records.len())).cyan().bold());
    for record in &records {
        println!(
            "  {} {}",
            style(&record.handle.name).green().bold(),
            style(&record.def.location).dim()
        );
        println!("     {}", record.description);
    }
    println!();
    Ok(())
}

fn find_one<'a>(records: &'a [SkillRecord], name: &str, location: Option<&str>) -> anyhow::Result<&'a SkillRecord> {
    let matches: Vec<&SkillRecord> = records
        .iter()
        .filter(|r| r.def.name == name || r.handle.name == name)
        .filter(|r| location.map_or(true, |l| r.def.location == l))
        .collect();

    match matches.as_slice() {
        [] => bail!("no skill named '{}'", name),
        [one] => Ok(*one),
        many => {
            let locations: Vec<&str> = many.iter().map(|r| r.def.location.as_str()).collect();
            bail!(
                "'{}' is ambiguous; pass --location with one of: {}",
                name,
                locations.join(", ")
            )
        }
    }
}

async fn show(runtime: &SkillRuntime, name: &str, location: Option<&str>) -> anyhow::Result<()> {
    let records = runtime.list_skills(&SkillFilter::all());
    let record = find_one(&records, name, location)?;
    let ctx = Context::background();
    let key = runtime.catalog().resolve_def(&record.def)?;
    let body = runtime.catalog().ensure_body(&ctx, &key).await?;

    println!("\n{}", style(&record.handle.name).cyan().bold());
    println!("   └─ Description: {}", record.description);
    println!("   └─ Location: {}", record.def.location);
    println!("   └─ Canonical: {}", key.location);
    println!("   └─ Digest: {}", style(&record.digest).dim());
    for (k, v) in &record.properties {
        println!("   └─ {}: {}", k, v);
    }
    println!("\n{}\n", body);
    Ok(())
}

async fn prompt(runtime: &SkillRuntime, activate: &[String], section: &str) -> anyhow::Result<()> {
    let section: PromptSection = section.parse()?;
    let ctx = Context::background();

    let records = runtime.list_skills(&SkillFilter::all());
    let defs: Vec<SkillDef> = activate
        .iter()
        .map(|name| find_one(&records, name, None).map(|r| r.def.clone()))
        .collect::<anyhow::Result<_>>()?;

    let session = runtime
        .new_session(&ctx, SessionOptions::new().with_max_active(defs.len().max(1)))
        .await?;
    if !defs.is_empty() {
        runtime
            .activate(&ctx, session.id(), &defs, ActivationMode::Replace)
            .await?;
    }

    let rendered = runtime
        .render_prompt(&ctx, Some(session.id()), &SkillFilter::all(), section)
        .await?;
    print!("{}", rendered);
    runtime.close_session(session.id()).await?;
    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let path = target_path(cli);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let mut config = RuntimeConfig::default();
    config.filesystem.roots = if cli.roots.is_empty() {
        vec![default_skills_dir()]
    } else {
        cli.roots.clone()
    };
    save_config(&config, &path)?;
    println!("{} Wrote {}", style("✓").green(), path.display());
    Ok(())
}

fn check_config(cli: &Cli) -> anyhow::Result<()> {
    let path = target_path(cli);
    let snapshot = read_config_snapshot(&path);

    println!("\n{}", style("Configuration check").cyan().bold());
    println!("   └─ File: {}", path.display());
    let file_ok = if snapshot.exists {
        for issue in &snapshot.issues {
            println!("   {} {}", style("✗").red(), issue);
        }
        snapshot.issues.is_empty()
    } else {
        println!("   {} File not found, defaults apply", style("ℹ").blue());
        true
    };

    let mut config = snapshot.config.unwrap_or_default();
    apply_env_overrides(&mut config);
    let result = validate_config(&config);

    for warning in &result.warnings {
        println!("   {} {}", style("⚠").yellow(), warning);
    }
    for error in &result.errors {
        println!("   {} {}", style("✗").red(), error);
    }

    if result.valid && file_ok {
        println!("   {} Configuration is valid", style("✓").green());
        Ok(())
    } else {
        bail!("configuration has errors")
    }
}
