use std::path::PathBuf;

use anyhow::{
    Context,
    Result,
};
use clap::{
    Parser,
    Subcommand,
};
use envcompose::memory::{
    PathMemoryStore,
    RememberedPath,
};
use envcompose::{
    Catalog,
    ComposeOptions,
    ComposeOutcome,
    Composer,
    EncryptedPathMemory,
    HttpFetcher,
    ProjectEnv,
    SecretManager,
    SqliteStore,
    TerminalPrompter,
    config,
    generate_secure_value,
    validate,
};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Fill missing .env keys from remembered, existing, bundle or catalog sources
    Compose {
        /// Project root containing .env.example
        #[arg(default_value = ".")]
        path: PathBuf,
        /// URL to fetch .env.example from when the project has none
        #[arg(long, env = "ENVCOMPOSE_FALLBACK_URL")]
        fallback_url: Option<String>,
        /// Hide entered values and defaults
        #[arg(short, long, env = "ENVCOMPOSE_MASK_INPUT")]
        mask: bool,
        /// Resolve without prompting
        #[arg(short = 'y', long = "yes", env = "ENVCOMPOSE_SKIP_PROMPTS")]
        skip_prompts: bool,
        /// Offer .config/<bundle-dir>/<project>.env as a source
        #[arg(short, long, env = "ENVCOMPOSE_BUNDLE")]
        bundle: bool,
        /// Directory under .config/ holding bundle env files
        #[arg(long, default_value = envcompose::paths::DEFAULT_BUNDLE_DIR)]
        bundle_dir: String,
        /// Open service dashboards in the browser
        #[arg(long, env = "ENVCOMPOSE_OPEN_BROWSER")]
        open_browser: bool,
        /// Editor used for manual editing
        #[arg(long, env = "EDITOR")]
        editor: Option<String>,
    },
    /// List required keys that are missing or empty in .env
    Missing {
        /// Project root containing .env.example
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a secure random hex string
    #[command(alias = "gen")]
    Generate {
        /// Number of hex characters
        #[arg(short, long, default_value_t = envcompose::generate::DEFAULT_SECRET_LENGTH)]
        length: usize,
    },
    /// Set a value, validating it against the catalog type when the key is known
    Set {
        /// KEY=VALUE pair to set
        pair: String,
        /// Environment file to update
        #[arg(short, long, default_value = ".env")]
        file: PathBuf,
    },
    /// Generate the key that encrypts the remembered path
    Keygen {
        /// Output file path (default: state directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Force overwrite if key already exists
        #[arg(short, long)]
        force: bool,
    },
    /// Show the remembered .env source path
    Remembered,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "envcompose",
    version,
    about = "Reconcile a project's .env against its .env.example"
)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "envcompose=debug" } else { "envcompose=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = <Cli as clap::Parser>::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Compose {
            path,
            fallback_url,
            mask,
            skip_prompts,
            bundle,
            bundle_dir,
            open_browser,
            editor,
        } => compose(ComposeOptions {
            project_path: path,
            fallback_example_url: fallback_url,
            mask_input: mask,
            skip_prompts,
            bundle_mode: bundle,
            bundle_dir,
            open_browser,
            editor,
        }),
        Commands::Missing { path, json } => missing(path, json),
        Commands::Generate { length } => {
            println!("{}", generate_secure_value(length));
            Ok(())
        }
        Commands::Set { pair, file } => set(pair, file),
        Commands::Keygen { output, force } => keygen(output, force),
        Commands::Remembered => remembered(),
    }
}

fn open_memory() -> Result<EncryptedPathMemory<SqliteStore, SecretManager>> {
    let cipher = SecretManager::load_or_generate().context("Failed to load encryption key")?;
    let store = SqliteStore::open(&config::store_path()).context("Failed to open path memory")?;
    Ok(EncryptedPathMemory::new(store, cipher))
}

fn compose(options: ComposeOptions) -> Result<()> {
    let env_path = ProjectEnv::new(&options.project_path).env_path().to_path_buf();
    let memory: Box<dyn PathMemoryStore> = match open_memory() {
        Ok(memory) => Box::new(memory),
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "path memory unavailable; continuing without it");
            Box::new(EncryptedPathMemory::new(
                envcompose::memory::MemoryStore::new(),
                SecretManager::generate(),
            ))
        }
    };
    let fetcher = HttpFetcher::new(config::fetch_timeout()).context("Failed to build HTTP client")?;
    let mut composer = Composer::new(
        options,
        Catalog::builtin(),
        TerminalPrompter::new(),
        memory,
        fetcher,
    );

    match composer.run() {
        ComposeOutcome::Complete => println!("✓ All environment variables are set!"),
        ComposeOutcome::Incomplete { remaining } => {
            println!("Some environment variables are still unset:");
            for key in &remaining {
                println!("    - {}", key);
            }
            println!("Add them to {} when you have them.", env_path.display());
        }
        ComposeOutcome::ManualEdit { env_path } => {
            println!("Fill in the missing values in {}", env_path.display());
        }
        ComposeOutcome::Cancelled => {
            println!("Setup cancelled. You can finish it later by editing {}", env_path.display());
            std::process::exit(130);
        }
        ComposeOutcome::Fallback { reason } => {
            println!("Could not set up the environment automatically ({}).", reason);
            println!("To finish by hand:");
            println!("  1. Copy .env.example to .env in your project root");
            println!("  2. Fill in every empty value in {}", env_path.display());
        }
    }
    Ok(())
}

fn missing(path: PathBuf, json: bool) -> Result<()> {
    let project = ProjectEnv::new(&path);
    let required = project
        .required_keys()
        .with_context(|| format!("Failed to read {}", project.paths().example_env_path.display()))?;
    let missing = match project.missing_keys(&required) {
        Ok(missing) => missing,
        Err(envcompose::ComposeError::NotFound { .. }) => {
            envcompose::missing_keys(&required, &envcompose::EnvSnapshot::default())
        }
        Err(e) => return Err(e).context("Failed to read .env"),
    };
    let catalog = Catalog::builtin();
    let groups = catalog.group_missing(&missing);

    if json {
        let services: Vec<serde_json::Value> = groups
            .services
            .iter()
            .map(|s| {
                let keys: Vec<&str> = s
                    .keys
                    .iter()
                    .filter(|k| missing.contains(&k.key))
                    .map(|k| k.key.as_str())
                    .collect();
                serde_json::json!({
                    "service": s.id,
                    "name": s.name,
                    "dashboard_url": s.dashboard_url,
                    "keys": keys,
                })
            })
            .collect();
        let out = serde_json::json!({
            "missing": missing,
            "services": services,
            "unknown": groups.unknown,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if missing.is_empty() {
        println!("✓ All environment variables are set!");
        return Ok(());
    }
    for service in &groups.services {
        println!("{}:", service.name);
        for spec in service.keys.iter().filter(|k| missing.contains(&k.key)) {
            let marker = if spec.optional { " (optional)" } else { "" };
            println!("    - {}{}", spec.key, marker);
        }
    }
    if !groups.unknown.is_empty() {
        println!("Other:");
        for key in &groups.unknown {
            println!("    - {}", key);
        }
    }
    Ok(())
}

fn set(pair: String, file: PathBuf) -> Result<()> {
    let (key, value) = pair.split_once('=').context("Invalid KEY=VALUE format")?;
    let key = key.trim();
    let value = envcompose::compose::clean_value(key, value);
    let catalog = Catalog::builtin();
    if let Some((_, spec)) = catalog.spec_for(key)
        && let Err(message) = validate(&value, spec.key_type)
    {
        anyhow::bail!("{} ({} expects a {} value)", message, key, spec.key_type);
    }
    if !file.exists() {
        std::fs::write(&file, "").with_context(|| format!("Failed to create {}", file.display()))?;
    }
    envcompose::writer::upsert(&file, key, &value)
        .with_context(|| format!("Failed to update {}", file.display()))?;
    println!("✓ Set {} in {}", key, file.display());
    Ok(())
}

fn keygen(output: Option<PathBuf>, force: bool) -> Result<()> {
    let out = output.unwrap_or_else(config::key_path);
    if out.exists() && !force {
        anyhow::bail!(
            "Key file already exists at {}. Use --force to overwrite.",
            out.display()
        );
    }
    let manager = SecretManager::generate();
    manager.save_key(&out).context("Failed to save key")?;
    println!("✓ Private key saved to: {}", out.display());
    println!("Public recipient: {}", manager.public_key_string());
    Ok(())
}

fn remembered() -> Result<()> {
    let memory = open_memory()?;
    match memory.load() {
        RememberedPath::Found(path) => println!("{}", path.display()),
        RememberedPath::NotSet => println!("No .env source remembered yet."),
        RememberedPath::Unavailable(reason) => {
            println!("The remembered .env source could not be read ({}).", reason)
        }
    }
    Ok(())
}
