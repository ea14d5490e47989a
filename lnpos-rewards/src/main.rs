//! lnpos-rewards - Reward program administration for the lnpos till
//!
//! Inspect and adjust the reward program from the command line: the rate
//! and bounds, event promotions, and the PIN that protects settings
//! changes on shared hardware.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use tracing::{debug, error};

use liblnpos::config::{expand_path, Config};
use liblnpos::error::{PinError, PosError};
use liblnpos::logging::{LogFormat, LoggingConfig};
use liblnpos::pin::{PinGate, PinOutcome};
use liblnpos::reward::{
    CalculationType, EventConfig, RewardConfig, RewardConfigUpdate, RewardStore,
};

#[derive(Parser)]
#[command(name = "lnpos-rewards")]
#[command(about = "Manage the reward program for the lnpos till")]
#[command(version)]
#[command(long_about = "Manage the reward program for the lnpos till.

Settings live in rewards.toml under the lnpos config directory and are
picked up by the till immediately. 'set' clamps out-of-range values to
the nearest allowed value; 'validate' reports every violation instead
and changes nothing.

When a settings PIN is set, commands that change state prompt for it.
Scripts can pass the PIN on stdin with --pin-stdin.

EXAMPLES:
    # Show the current settings
    lnpos-rewards show

    # Raise the reward rate to 3% and the minimum to 5 sats
    lnpos-rewards set --rate 0.03 --min 5

    # Check a candidate rate without saving anything
    lnpos-rewards validate --rate 0.25

    # Preview the reward for a 1500 sat purchase
    lnpos-rewards calc --amount 1500

    # Run a 10% event paid from a dedicated reward account
    lnpos-rewards event start --rate 0.10 --merchant-id summer-promo

    # Protect settings changes with a PIN
    lnpos-rewards pin set

EXIT CODES:
    0 - Success
    1 - Error (missing state, I/O failure, etc.)
    2 - PIN verification failed
    3 - Invalid input rejected by validation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current reward settings
    Show(ShowArgs),

    /// Update reward settings, clamping out-of-range values
    Set(SetArgs),

    /// Check candidate settings without saving them
    Validate(ValidateArgs),

    /// Restore the default reward settings
    Reset(ResetArgs),

    /// Calculate the reward for a purchase amount
    Calc(CalcArgs),

    /// Manage event promotions
    Event(EventArgs),

    /// Manage the settings PIN
    Pin(PinArgs),
}

#[derive(Args)]
struct ShowArgs {
    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args)]
struct SetArgs {
    /// Reward rate as a fraction (0.02 = 2%)
    #[arg(long)]
    rate: Option<f64>,

    /// Minimum reward in sats
    #[arg(long)]
    min: Option<i64>,

    /// Maximum reward in sats
    #[arg(long)]
    max: Option<i64>,

    /// Standalone reward in sats
    #[arg(long)]
    default: Option<i64>,

    /// Enable or disable the reward program
    #[arg(long)]
    enabled: Option<bool>,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct ValidateArgs {
    /// Reward rate as a fraction (0.02 = 2%)
    #[arg(long)]
    rate: Option<f64>,

    /// Minimum reward in sats
    #[arg(long)]
    min: Option<i64>,

    /// Maximum reward in sats
    #[arg(long)]
    max: Option<i64>,

    /// Standalone reward in sats
    #[arg(long)]
    default: Option<i64>,
}

#[derive(Args)]
struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct CalcArgs {
    /// Purchase amount in sats (omit for a standalone reward)
    #[arg(short, long)]
    amount: Option<i64>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args)]
struct EventArgs {
    #[command(subcommand)]
    command: EventCommands,
}

#[derive(Subcommand)]
enum EventCommands {
    /// Show the current event state
    Show(ShowArgs),

    /// Start an event, optionally overriding the reward rate
    Start(EventStartArgs),

    /// Stop the running event
    Stop(EventStopArgs),
}

#[derive(Args)]
struct EventStartArgs {
    /// Event reward rate as a fraction (up to 1.0 = 100%)
    #[arg(long)]
    rate: Option<f64>,

    /// Reward account the event pays out from
    #[arg(long)]
    merchant_id: Option<String>,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct EventStopArgs {
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct PinArgs {
    #[command(subcommand)]
    command: PinCommands,
}

#[derive(Subcommand)]
enum PinCommands {
    /// Set a settings PIN (refuses when one is already set)
    Set(PinSetArgs),

    /// Change the settings PIN
    Change(PinChangeArgs),

    /// Remove the settings PIN
    Remove(PinRemoveArgs),

    /// Show whether a PIN is set and the session timeout
    Status,

    /// Set the session timeout
    Timeout(PinTimeoutArgs),
}

#[derive(Args)]
struct PinSetArgs {
    /// Read the PIN from stdin instead of prompting
    #[arg(long)]
    stdin: bool,
}

#[derive(Args)]
struct PinChangeArgs {
    /// Read the current and new PIN from stdin, one per line
    #[arg(long)]
    stdin: bool,
}

#[derive(Args)]
struct PinRemoveArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct PinTimeoutArgs {
    /// Minutes of inactivity before the PIN is required again
    minutes: i64,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct AuthArgs {
    /// Read the PIN from stdin instead of prompting (for scripts)
    #[arg(long)]
    pin_stdin: bool,
}

fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(LogFormat::Text, "info".to_string(), cli.verbose).init();

    debug!("Starting lnpos-rewards");

    if let Err(e) = run_command(cli.command) {
        error!("{}", e);
        let code = e
            .downcast_ref::<PosError>()
            .map(PosError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Show(args) => show_settings(&args),
        Commands::Set(args) => set_settings(&args),
        Commands::Validate(args) => validate_settings(&args),
        Commands::Reset(args) => reset_settings(&args),
        Commands::Calc(args) => calc_reward(&args),
        Commands::Event(args) => match args.command {
            EventCommands::Show(args) => show_event(&args),
            EventCommands::Start(args) => start_event(&args),
            EventCommands::Stop(args) => stop_event(&args),
        },
        Commands::Pin(args) => match args.command {
            PinCommands::Set(args) => pin_set(&args),
            PinCommands::Change(args) => pin_change(&args),
            PinCommands::Remove(args) => pin_remove(&args),
            PinCommands::Status => pin_status(),
            PinCommands::Timeout(args) => pin_timeout(&args),
        },
    }
}

/// Load the till configuration, falling back to defaults when no config
/// file exists yet. The state file paths are all this binary needs.
fn load_config() -> Config {
    Config::load().unwrap_or_else(|_| Config::default_config())
}

fn open_reward_store() -> Result<RewardStore> {
    let config = load_config();
    RewardStore::with_path(expand_path(&config.state.rewards_file))
        .context("Failed to open reward settings")
}

fn open_pin_gate() -> Result<PinGate> {
    let config = load_config();
    PinGate::with_path(expand_path(&config.state.pin_file)).context("Failed to open PIN state")
}

/// Gate a state-changing command behind the PIN when one is set
fn authorize(gate: &PinGate, pin_stdin: bool) -> Result<()> {
    if !gate.has_pin() {
        return Ok(());
    }

    let pin = if pin_stdin {
        read_stdin_line()?
    } else if atty::is(atty::Stream::Stdin) {
        rpassword::prompt_password("Enter PIN: ").context("Failed to read PIN")?
    } else {
        bail!("A PIN is set. Re-run with --pin-stdin and provide the PIN on stdin.");
    };

    gate.authorize(pin.trim())?;
    Ok(())
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_settings(config: &RewardConfig) {
    println!("Reward program:");
    println!(
        "  Status:            {}",
        if config.is_enabled { "enabled" } else { "disabled" }
    );
    println!("  Reward rate:       {:.1}%", config.reward_rate * 100.0);
    println!("  Minimum reward:    {} sats", config.minimum_reward);
    println!("  Maximum reward:    {} sats", config.maximum_reward);
    println!("  Standalone reward: {} sats", config.default_reward);
}

fn print_event(event: &EventConfig) {
    println!("Event:");
    println!(
        "  Active:             {}",
        if event.active { "yes" } else { "no" }
    );
    match event.reward_rate {
        Some(rate) => println!("  Rate override:      {:.1}%", rate * 100.0),
        None => println!("  Rate override:      (none)"),
    }
    match &event.merchant_reward_id {
        Some(id) => println!("  Merchant reward ID: {}", id),
        None => println!("  Merchant reward ID: (none)"),
    }
}

fn show_settings(args: &ShowArgs) -> Result<()> {
    let store = open_reward_store()?;
    let config = store.config();
    let event = store.event();

    if args.format == "json" {
        let state = serde_json::json!({ "config": config, "event": event });
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_settings(&config);
        println!();
        print_event(&event);
    }

    Ok(())
}

/// Apply a partial settings update, reporting any value that was clamped
fn set_settings(args: &SetArgs) -> Result<()> {
    let update = RewardConfigUpdate {
        reward_rate: args.rate,
        minimum_reward: args.min,
        maximum_reward: args.max,
        default_reward: args.default,
        is_enabled: args.enabled,
    };

    if update.is_empty() {
        bail!("Nothing to update. Pass at least one of --rate, --min, --max, --default, --enabled.");
    }

    let gate = open_pin_gate()?;
    authorize(&gate, args.auth.pin_stdin)?;

    let store = open_reward_store()?;
    let applied = store.apply_update(&update)?;

    println!("✓ Reward settings updated");

    if let Some(requested) = args.rate {
        if (applied.reward_rate - requested).abs() > f64::EPSILON {
            println!("ℹ Reward rate clamped to {:.1}%", applied.reward_rate * 100.0);
        }
    }
    if let Some(requested) = args.min {
        if applied.minimum_reward != requested {
            println!("ℹ Minimum reward raised to {} sats", applied.minimum_reward);
        }
    }
    if let Some(requested) = args.max {
        if applied.maximum_reward != requested {
            println!("ℹ Maximum reward raised to {} sats", applied.maximum_reward);
        }
    }
    if let Some(requested) = args.default {
        if applied.default_reward != requested {
            println!("ℹ Standalone reward raised to {} sats", applied.default_reward);
        }
    }

    println!();
    print_settings(&applied);

    Ok(())
}

/// Validate candidate settings without touching the stored configuration
fn validate_settings(args: &ValidateArgs) -> Result<()> {
    let update = RewardConfigUpdate {
        reward_rate: args.rate,
        minimum_reward: args.min,
        maximum_reward: args.max,
        default_reward: args.default,
        is_enabled: None,
    };

    if update.is_empty() {
        bail!("Nothing to validate. Pass at least one of --rate, --min, --max, --default.");
    }

    let report = update.validate();

    if report.is_valid {
        println!("✓ Settings are valid");
        return Ok(());
    }

    for error in &report.errors {
        println!("✗ {}", error);
    }

    Err(PosError::InvalidInput(format!("{} validation error(s)", report.errors.len())).into())
}

fn reset_settings(args: &ResetArgs) -> Result<()> {
    if !args.force {
        if !atty::is(atty::Stream::Stdin) {
            bail!("Refusing to reset without confirmation. Re-run with --force.");
        }
        if !confirm("Reset reward settings to defaults?")? {
            println!("Cancelled");
            return Ok(());
        }
    }

    let gate = open_pin_gate()?;
    authorize(&gate, args.auth.pin_stdin)?;

    let store = open_reward_store()?;
    let config = store.reset()?;

    println!("✓ Reward settings reset");
    println!();
    print_settings(&config);

    Ok(())
}

fn calc_reward(args: &CalcArgs) -> Result<()> {
    let store = open_reward_store()?;
    let calculation = store.calculate(args.amount);

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&calculation)?);
        return Ok(());
    }

    println!("Reward: {} sats", calculation.reward_amount);

    match calculation.calculation_type {
        CalculationType::Standalone => println!("Standalone reward (no purchase)"),
        CalculationType::PurchaseBased => {
            let rate = calculation.reward_rate.unwrap_or(0.0) * 100.0;
            let purchase = calculation.purchase_amount.unwrap_or(0);

            let mut line = format!("{:.1}% of {} sats", rate, purchase);
            if calculation.applied_minimum {
                line.push_str(" (minimum applied)");
            } else if calculation.applied_maximum {
                line.push_str(" (maximum applied)");
            }
            println!("{}", line);
        }
    }

    Ok(())
}

fn show_event(args: &ShowArgs) -> Result<()> {
    let store = open_reward_store()?;
    let event = store.event();

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        print_event(&event);
    }

    Ok(())
}

fn start_event(args: &EventStartArgs) -> Result<()> {
    let gate = open_pin_gate()?;
    authorize(&gate, args.auth.pin_stdin)?;

    let store = open_reward_store()?;

    // Stage the rate and payout account before switching the event on.
    // A rejected value leaves the event stopped.
    if args.rate.is_some() {
        store.set_event_reward_rate(args.rate)?;
    }
    if let Some(id) = &args.merchant_id {
        store.set_event_merchant_reward_id(Some(id))?;
    }
    store.set_event_active(true)?;

    println!("✓ Event started");
    println!();
    print_event(&store.event());

    Ok(())
}

fn stop_event(args: &EventStopArgs) -> Result<()> {
    let gate = open_pin_gate()?;
    authorize(&gate, args.auth.pin_stdin)?;

    let store = open_reward_store()?;
    store.set_event_active(false)?;

    println!("✓ Event stopped");

    Ok(())
}

fn pin_set(args: &PinSetArgs) -> Result<()> {
    let gate = open_pin_gate()?;

    if gate.has_pin() {
        bail!("A PIN is already set. Use 'lnpos-rewards pin change' to replace it.");
    }

    let pin = if args.stdin {
        read_stdin_line()?
    } else if atty::is(atty::Stream::Stdin) {
        let pin = rpassword::prompt_password("New PIN: ").context("Failed to read PIN")?;
        let confirmation =
            rpassword::prompt_password("Confirm PIN: ").context("Failed to read PIN")?;
        if pin != confirmation {
            bail!("PINs do not match");
        }
        pin
    } else {
        bail!("No terminal detected. Re-run with --stdin and provide the PIN on stdin.");
    };

    gate.set_pin(pin.trim())?;

    println!("✓ PIN set");
    Ok(())
}

fn pin_change(args: &PinChangeArgs) -> Result<()> {
    let gate = open_pin_gate()?;

    if !gate.has_pin() {
        bail!("No PIN is set. Use 'lnpos-rewards pin set' first.");
    }

    let (old_pin, new_pin) = if args.stdin {
        (read_stdin_line()?, read_stdin_line()?)
    } else if atty::is(atty::Stream::Stdin) {
        let old_pin = rpassword::prompt_password("Current PIN: ").context("Failed to read PIN")?;
        let new_pin = rpassword::prompt_password("New PIN: ").context("Failed to read PIN")?;
        let confirmation =
            rpassword::prompt_password("Confirm new PIN: ").context("Failed to read PIN")?;
        if new_pin != confirmation {
            bail!("PINs do not match");
        }
        (old_pin, new_pin)
    } else {
        bail!(
            "No terminal detected. Re-run with --stdin and provide the current \
             and new PIN on separate lines."
        );
    };

    match gate.change_pin(old_pin.trim(), new_pin.trim())? {
        PinOutcome::Success => {
            println!("✓ PIN changed");
            Ok(())
        }
        PinOutcome::Failure => Err(PosError::Pin(PinError::VerificationFailed).into()),
    }
}

fn pin_remove(args: &PinRemoveArgs) -> Result<()> {
    let gate = open_pin_gate()?;

    if !gate.has_pin() {
        println!("ℹ No PIN is set");
        return Ok(());
    }

    if !args.force {
        if !atty::is(atty::Stream::Stdin) {
            bail!("Refusing to remove the PIN without confirmation. Re-run with --force.");
        }
        if !confirm("Remove the settings PIN?")? {
            println!("Cancelled");
            return Ok(());
        }
    }

    authorize(&gate, args.auth.pin_stdin)?;
    gate.remove_pin()?;

    println!("✓ PIN removed");
    Ok(())
}

fn pin_status() -> Result<()> {
    let gate = open_pin_gate()?;

    if gate.has_pin() {
        println!("PIN: set");
    } else {
        println!("PIN: not set");
    }
    println!("Session timeout: {} minutes", gate.session_timeout_minutes());

    Ok(())
}

fn pin_timeout(args: &PinTimeoutArgs) -> Result<()> {
    let gate = open_pin_gate()?;
    authorize(&gate, args.auth.pin_stdin)?;

    gate.set_session_timeout(args.minutes)?;

    println!("✓ Session timeout set to {} minutes", args.minutes);
    Ok(())
}
