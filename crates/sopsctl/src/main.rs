//! sopsctl - profile manager for SOPS
//!
//! Commands:
//! - encrypt <FILE>: Encrypt with the resolved profile
//! - decrypt <FILE>: Decrypt (sops reads keys from the file metadata)
//! - edit <FILE>: Edit an encrypted file
//! - exec -- <ARGS>: Run sops with profile recipients plus raw arguments
//! - profile: add, ls, show, rm, edit, use, reset
//! - config: init, path, show, map, unmap, dirs, set-sops-path

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use sopsctl::{
    args,
    config::Config,
    editor::{Editor, EnvEditor},
    executor::Executor,
    profile::{public_keys_from_key_file, Profile, SopsOptions},
    resolver::resolve,
    selector::default_selector,
    ProfileError,
};
use sopsctl_core::paths::{clean, expand_tilde, Paths};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sopsctl")]
#[command(about = "Profile manager for SOPS - select a profile, sopsctl builds the sops arguments")]
#[command(version)]
#[command(after_help = r#"PROFILE SELECTION:
    1. -p/--profile flag (explicit)
    2. Directory mapping marked auto (sopsctl config map <dir> <profile> --auto)
    3. default_profile (sopsctl profile use <name>)
    4. Interactive selection (fzf if installed)

EXAMPLES:
    sopsctl profile add dev --age-key-file ~/.config/sops/age/keys.txt
    sopsctl profile add team --age age1abc... --age age1def...
    sopsctl config map ~/work/infra team --auto
    sopsctl encrypt secrets.yaml
    sopsctl -p dev edit secrets.yaml
    sopsctl exec -p team -- --in-place encrypt secrets.yaml
    sopsctl --dry-run encrypt secrets.yaml

SHELL INTEGRATION:
    eval "$(sopsctl profile use dev)"    # exports SOPS_AGE_KEY_FILE"#)]
struct Cli {
    /// Config file (default: ~/.config/sopsctl/config.yaml)
    #[arg(short, long, global = true, env = "SOPSCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Profile to use (skips directory, default and interactive selection)
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Never prompt for a profile
    #[arg(long = "no-interactive", visible_alias = "no-fzf", global = true)]
    no_interactive: bool,

    /// Print the sops command instead of running it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log resolution details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file with the selected profile
    Encrypt {
        /// File to encrypt
        file: String,
    },

    /// Decrypt a file (no profile needed, sops reads the file metadata)
    Decrypt {
        /// File to decrypt
        file: String,
    },

    /// Edit an encrypted file in $EDITOR
    Edit {
        /// File to edit
        file: String,
    },

    /// Run sops with the profile's recipients plus custom arguments
    Exec {
        /// Arguments passed to sops after the recipient flags
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },

    /// Manage encryption profiles
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Manage the config file and directory mappings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Add a new profile
    Add {
        /// Profile name
        name: String,

        /// Profile description
        #[arg(long)]
        description: Option<String>,

        /// age recipient public key (repeat or comma-separate for several)
        #[arg(long = "age", value_name = "RECIPIENT", value_delimiter = ',')]
        age: Vec<String>,

        /// age identity file; its public keys become the recipients if --age is not given
        #[arg(long)]
        age_key_file: Option<String>,

        /// Only encrypt keys matching this regex
        #[arg(long)]
        encrypted_regex: Option<String>,

        /// Only encrypt keys with this suffix
        #[arg(long)]
        encrypted_suffix: Option<String>,

        /// Leave keys matching this regex unencrypted
        #[arg(long)]
        unencrypted_regex: Option<String>,

        /// Leave keys with this suffix unencrypted
        #[arg(long)]
        unencrypted_suffix: Option<String>,
    },

    /// List all profiles
    #[command(alias = "list")]
    Ls {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show profile details
    Show {
        /// Profile name
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a profile
    #[command(alias = "remove")]
    Rm {
        /// Profile name
        name: String,
    },

    /// Open the config file in $EDITOR
    Edit,

    /// Set the default profile and print the env export
    Use {
        /// Profile name (omit to pick interactively)
        name: Option<String>,
    },

    /// Print the env export for the current default profile
    #[command(hide = true)]
    Current,

    /// Clear the default profile
    Reset,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Create an empty config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,

    /// Print the config file
    Show,

    /// Map a directory to a profile
    Map {
        /// Directory (`.` for the current one)
        dir: String,

        /// Profile name
        profile: String,

        /// Apply the profile without prompting
        #[arg(long)]
        auto: bool,
    },

    /// Remove a directory mapping
    Unmap {
        /// Directory
        dir: String,
    },

    /// List directory mappings
    Dirs {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the sops binary path
    SetSopsPath {
        /// Path or name on PATH
        path: String,
    },
}

/// Per-invocation settings shared by all commands
struct Context {
    config_path: PathBuf,
    profile: Option<String>,
    interactive: bool,
    dry_run: bool,
}

impl Context {
    fn new(cli: &Cli) -> Self {
        let config_path = cli
            .config
            .as_ref()
            .map(|p| expand_tilde(&p.to_string_lossy()))
            .unwrap_or_else(|| Paths::new().config_file());

        Self {
            config_path,
            profile: cli.profile.clone().filter(|p| !p.is_empty()),
            interactive: !cli.no_interactive && atty::is(atty::Stream::Stdin),
            dry_run: cli.dry_run,
        }
    }

    /// Load the config; a missing file is an error
    fn load(&self) -> Result<Config> {
        Config::load_from(&self.config_path).map_err(|e| match e {
            ProfileError::ConfigNotFound(_) => anyhow::anyhow!(
                "{}\nRun 'sopsctl config init' or 'sopsctl profile add' to create one",
                e
            ),
            other => anyhow::Error::new(other).context("Failed to load config"),
        })
    }

    /// Load the config, starting empty if it does not exist
    fn load_or_default(&self) -> Result<Config> {
        Config::load_or_default(&self.config_path).context("Failed to load config")
    }

    fn save(&self, config: &Config) -> Result<()> {
        config
            .save_to(&self.config_path)
            .context("Failed to save config")
    }

    fn executor(&self, config: &Config) -> Executor {
        Executor::new(config.sops_path(), self.dry_run)
    }

    /// The profile named with -p, if any
    fn explicit_profile<'a>(&self, config: &'a Config) -> Result<Option<&'a Profile>> {
        match &self.profile {
            Some(name) => Ok(Some(config.get_profile(name)?)),
            None => Ok(None),
        }
    }

    /// Resolve the profile for this invocation and report the choice on stderr
    fn resolve<'a>(&self, config: &'a Config) -> Result<&'a Profile> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let selector = default_selector();

        let resolution = resolve(
            self.profile.as_deref(),
            &cwd,
            config,
            selector.as_ref(),
            self.interactive,
        )
        .map_err(|e| match e {
            ProfileError::NoProfileAvailable if config.profiles.is_empty() => {
                anyhow::anyhow!("No profiles configured\nRun 'sopsctl profile add' to create one")
            }
            other => other.into(),
        })?;

        eprintln!(
            "Using profile: {} ({})",
            resolution.profile.name, resolution.source
        );
        Ok(resolution.profile)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Dispatch a command, returning the process exit code
fn run(cli: Cli) -> Result<i32> {
    let ctx = Context::new(&cli);

    match cli.command {
        Commands::Encrypt { file } => cmd_encrypt(&ctx, &file),
        Commands::Decrypt { file } => cmd_decrypt(&ctx, &file),
        Commands::Edit { file } => cmd_edit(&ctx, &file),
        Commands::Exec { args } => cmd_exec(&ctx, &args),
        Commands::Profile(command) => run_profile(&ctx, command).map(|_| 0),
        Commands::Config(command) => run_config(&ctx, command).map(|_| 0),
    }
}

fn run_profile(ctx: &Context, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::Add {
            name,
            description,
            age,
            age_key_file,
            encrypted_regex,
            encrypted_suffix,
            unencrypted_regex,
            unencrypted_suffix,
        } => {
            let sops = SopsOptions {
                encrypted_regex,
                encrypted_suffix,
                unencrypted_regex,
                unencrypted_suffix,
            };
            cmd_profile_add(ctx, &name, description, age, age_key_file, sops)
        }
        ProfileCommands::Ls { json } => cmd_profile_ls(ctx, json),
        ProfileCommands::Show { name, json } => cmd_profile_show(ctx, &name, json),
        ProfileCommands::Rm { name } => cmd_profile_rm(ctx, &name),
        ProfileCommands::Edit => cmd_profile_edit(ctx, &EnvEditor::from_env()),
        ProfileCommands::Use { name } => cmd_profile_use(ctx, name),
        ProfileCommands::Current => cmd_profile_current(ctx),
        ProfileCommands::Reset => cmd_profile_reset(ctx),
    }
}

fn run_config(ctx: &Context, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => cmd_config_init(ctx, force),
        ConfigCommands::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommands::Show => cmd_config_show(ctx),
        ConfigCommands::Map { dir, profile, auto } => cmd_config_map(ctx, &dir, &profile, auto),
        ConfigCommands::Unmap { dir } => cmd_config_unmap(ctx, &dir),
        ConfigCommands::Dirs { json } => cmd_config_dirs(ctx, json),
        ConfigCommands::SetSopsPath { path } => cmd_config_set_sops_path(ctx, &path),
    }
}

/// Encrypt a file with the resolved profile
fn cmd_encrypt(ctx: &Context, file: &str) -> Result<i32> {
    let config = ctx.load()?;
    let profile = ctx.resolve(&config)?;

    let sops_args = args::build(profile, "encrypt", file);
    let code = ctx.executor(&config).run(&sops_args, &args::profile_env(profile))?;
    Ok(code)
}

/// Decrypt a file; -p only contributes the identity file
fn cmd_decrypt(ctx: &Context, file: &str) -> Result<i32> {
    let config = ctx.load_or_default()?;
    let envs = ctx
        .explicit_profile(&config)?
        .map(args::profile_env)
        .unwrap_or_default();

    let sops_args = args::build_decrypt(file);
    let code = ctx.executor(&config).run(&sops_args, &envs)?;
    Ok(code)
}

/// Edit a file; without -p sops keeps the file's existing keys
fn cmd_edit(ctx: &Context, file: &str) -> Result<i32> {
    let config = ctx.load_or_default()?;
    let profile = ctx.explicit_profile(&config)?;

    let sops_args = args::build_edit(profile, file);
    let envs = profile.map(args::profile_env).unwrap_or_default();
    let code = ctx.executor(&config).run(&sops_args, &envs)?;
    Ok(code)
}

/// Run sops with the profile's recipients and raw arguments
fn cmd_exec(ctx: &Context, extra: &[String]) -> Result<i32> {
    let config = ctx.load()?;
    let profile = ctx.resolve(&config)?;

    let sops_args = args::build_exec(profile, extra);
    let code = ctx.executor(&config).run(&sops_args, &args::profile_env(profile))?;
    Ok(code)
}

/// Add a profile
fn cmd_profile_add(
    ctx: &Context,
    name: &str,
    description: Option<String>,
    recipients: Vec<String>,
    key_file: Option<String>,
    sops: SopsOptions,
) -> Result<()> {
    let mut config = ctx.load_or_default()?;

    let mut profile = Profile::new(name).with_sops(sops);
    if let Some(description) = description {
        profile = profile.with_description(&description);
    }

    let mut recipients = recipients;
    if let Some(key_file) = key_file.filter(|k| !k.is_empty()) {
        if recipients.is_empty() {
            match public_keys_from_key_file(&expand_tilde(&key_file)) {
                Ok(keys) if !keys.is_empty() => recipients = keys,
                Ok(_) => warn!(key_file = %key_file, "no public key comments found in key file"),
                Err(e) => warn!(error = %e, "could not read recipients from key file"),
            }
        }
        profile = profile.with_key_file(&key_file);
    }
    if !recipients.is_empty() {
        profile = profile.with_recipients(recipients);
    }

    config.add_profile(profile)?;
    ctx.save(&config)?;

    println!("Profile '{}' added successfully", name);
    Ok(())
}

/// List profiles
fn cmd_profile_ls(ctx: &Context, json: bool) -> Result<()> {
    let config = ctx.load_or_default()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.profiles)?);
        return Ok(());
    }

    let profiles = config.list_profiles();
    if profiles.is_empty() {
        println!("No profiles configured");
        println!();
        println!("Add one with: sopsctl profile add <name> --age-key-file <path>");
        return Ok(());
    }

    let name_width = profiles
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let desc_width = profiles
        .iter()
        .map(|p| p.description.as_deref().unwrap_or("").len())
        .max()
        .unwrap_or(0)
        .max("DESCRIPTION".len());

    println!(
        "  {:<nw$}  {:<dw$}  BACKENDS",
        "NAME",
        "DESCRIPTION",
        nw = name_width,
        dw = desc_width
    );
    for profile in profiles {
        let marker = if config.default_profile() == Some(profile.name.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<nw$}  {:<dw$}  {}",
            marker,
            profile.name,
            profile.description.as_deref().unwrap_or(""),
            profile.backend_summary(),
            nw = name_width,
            dw = desc_width
        );
    }

    Ok(())
}

/// Show one profile
fn cmd_profile_show(ctx: &Context, name: &str, json: bool) -> Result<()> {
    let config = ctx.load_or_default()?;
    let profile = config.get_profile(name)?;
    let directories = config.directories_for(name);
    let is_default = config.default_profile() == Some(name);

    if json {
        let value = json!({
            "name": profile.name,
            "default": is_default,
            "profile": profile,
            "directories": directories,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Name:        {}", profile.name);
    println!("Description: {}", profile.description.as_deref().unwrap_or(""));
    println!("Backends:    {}", profile.backend_summary());
    if is_default {
        println!("Default:     yes");
    }

    if let Some(key_file) = profile.age.as_ref().and_then(|a| a.key_file.as_deref()) {
        println!("Key file:    {}", key_file);
    }

    if !profile.recipients().is_empty() {
        println!();
        println!("Age Recipients:");
        for recipient in profile.recipients() {
            println!("  - {}", recipient);
        }
    }

    let options: Vec<_> = profile.sops.flags().collect();
    if !options.is_empty() {
        println!();
        println!("SOPS Options:");
        for (flag, value) in options {
            println!("  {} {}", flag, value);
        }
    }

    if !directories.is_empty() {
        println!();
        println!("Directories:");
        for dir in directories {
            let auto = config.directories.get(dir).is_some_and(|m| m.auto);
            println!("  - {}{}", dir, if auto { " (auto)" } else { "" });
        }
    }

    Ok(())
}

/// Remove a profile
fn cmd_profile_rm(ctx: &Context, name: &str) -> Result<()> {
    let mut config = ctx.load()?;
    let was_default = config.default_profile() == Some(name);

    config.remove_profile(name)?;
    ctx.save(&config)?;

    println!("Profile '{}' removed", name);
    if was_default {
        println!("Default profile cleared");
    }

    let dangling = config.directories_for(name);
    if !dangling.is_empty() {
        eprintln!(
            "warning: directory mappings still point at '{}': {}",
            name,
            dangling.join(", ")
        );
        eprintln!("Remove them with: sopsctl config unmap <dir>");
    }

    Ok(())
}

/// Edit the config file, then check it still parses
fn cmd_profile_edit(ctx: &Context, editor: &dyn Editor) -> Result<()> {
    if !ctx.config_path.exists() {
        ctx.save(&Config::new())?;
    }

    editor.edit(&ctx.config_path)?;

    Config::load_from(&ctx.config_path)
        .context("Config is no longer valid, fix it with 'sopsctl profile edit'")?;
    Ok(())
}

/// Set the default profile and print the shell export
fn cmd_profile_use(ctx: &Context, name: Option<String>) -> Result<()> {
    let mut config = ctx.load_or_default()?;

    let name = match name {
        Some(name) => name,
        None => {
            let profiles = config.list_profiles();
            if profiles.is_empty() {
                bail!(
                    "No profiles configured, run: sopsctl profile add <name> --age-key-file <path>"
                );
            }
            if !ctx.interactive {
                bail!("Specify a profile name: sopsctl profile use <name>");
            }
            default_selector().select(&profiles)?.name.clone()
        }
    };

    let export = args::export_line(config.get_profile(&name)?);

    config.set_default_profile(&name);
    ctx.save(&config)?;

    eprintln!("Default profile: {}", name);
    if let Some(line) = export {
        println!("{}", line);
    }

    Ok(())
}

/// Print the export line for the default profile, nothing if there is none
fn cmd_profile_current(ctx: &Context) -> Result<()> {
    let Ok(config) = Config::load_or_default(&ctx.config_path) else {
        return Ok(());
    };

    let line = config
        .default_profile()
        .and_then(|name| config.get_profile(name).ok())
        .and_then(args::export_line);

    if let Some(line) = line {
        println!("{}", line);
    }

    Ok(())
}

/// Clear the default profile
fn cmd_profile_reset(ctx: &Context) -> Result<()> {
    let mut config = ctx.load_or_default()?;
    config.clear_default_profile();
    ctx.save(&config)?;

    println!("Default profile cleared");
    Ok(())
}

/// Write an empty config
fn cmd_config_init(ctx: &Context, force: bool) -> Result<()> {
    if ctx.config_path.exists() && !force {
        println!("Config already exists at {}", ctx.config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    ctx.save(&Config::new())?;
    println!("Created config at {}", ctx.config_path.display());
    Ok(())
}

/// Print the config as stored
fn cmd_config_show(ctx: &Context) -> Result<()> {
    let config = ctx.load()?;
    print!("{}", config.to_yaml()?);
    Ok(())
}

/// Map a directory to a profile
fn cmd_config_map(ctx: &Context, dir: &str, profile: &str, auto: bool) -> Result<()> {
    let mut config = ctx.load()?;
    let dir = absolute_dir(dir)?;

    config.map_directory(&dir, profile, auto)?;
    ctx.save(&config)?;

    println!(
        "Mapped {} to profile '{}'{}",
        dir,
        profile,
        if auto { " (auto)" } else { "" }
    );
    Ok(())
}

/// Remove a directory mapping
fn cmd_config_unmap(ctx: &Context, dir: &str) -> Result<()> {
    let mut config = ctx.load()?;
    let dir = absolute_dir(dir)?;

    let mapping = config.unmap_directory(&dir)?;
    ctx.save(&config)?;

    println!("Unmapped {} (was '{}')", dir, mapping.profile);
    Ok(())
}

/// List directory mappings
fn cmd_config_dirs(ctx: &Context, json: bool) -> Result<()> {
    let config = ctx.load_or_default()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.directories)?);
        return Ok(());
    }

    if config.directories.is_empty() {
        println!("No directory mappings");
        println!();
        println!("Add one with: sopsctl config map <dir> <profile> [--auto]");
        return Ok(());
    }

    let width = config
        .directories
        .keys()
        .map(|d| d.len())
        .max()
        .unwrap_or(0)
        .max("DIRECTORY".len());

    println!("{:<w$}  {:<20} AUTO", "DIRECTORY", "PROFILE", w = width);
    for (dir, mapping) in &config.directories {
        let missing = if config.profiles.contains_key(&mapping.profile) {
            ""
        } else {
            " (missing)"
        };
        println!(
            "{:<w$}  {:<20} {}{}",
            dir,
            mapping.profile,
            if mapping.auto { "yes" } else { "no" },
            missing,
            w = width
        );
    }

    Ok(())
}

/// Store the sops binary path
fn cmd_config_set_sops_path(ctx: &Context, path: &str) -> Result<()> {
    let mut config = ctx.load_or_default()?;
    config.set_sops_path(path);
    ctx.save(&config)?;

    println!("sops path set to {}", path);
    Ok(())
}

/// Make a directory argument absolute, keeping `~` shorthand as typed
fn absolute_dir(dir: &str) -> Result<String> {
    if dir.starts_with('~') || Path::new(dir).is_absolute() {
        return Ok(dir.to_string());
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(clean(&cwd.join(dir)).to_string_lossy().into_owned())
}
