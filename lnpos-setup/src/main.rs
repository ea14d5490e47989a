use anyhow::Result;
use clap::Parser;
use liblnpos::{
    config::{expand_path, resolve_config_path, Config},
    db::Database,
    pin::{PinGate, PIN_LENGTH},
    reward::{RewardStore, MAX_REWARD_RATE},
    types::Currency,
};
use std::io::{self, Write};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "lnpos-setup")]
#[command(about = "Interactive setup wizard for the lnpos till", long_about = None)]
struct Cli {
    /// Skip interactive prompts and use defaults where possible
    #[arg(long)]
    non_interactive: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting lnpos setup wizard");

    // Run the setup wizard
    if let Err(e) = run_setup(&cli).await {
        error!("Setup failed: {}", e);
        eprintln!("\n❌ Setup failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run_setup(cli: &Cli) -> Result<()> {
    println!("\n⚡ Welcome to lnpos Setup!\n");
    println!("This wizard will help you configure the Lightning point-of-sale");
    println!("till: merchant profile, transaction ledger, reward program, and");
    println!("an optional settings PIN.\n");

    // Piped stdin gets the same treatment as --non-interactive
    let non_interactive = cli.non_interactive || !atty::is(atty::Stream::Stdin);
    if non_interactive && !cli.non_interactive {
        println!("No terminal detected, using defaults.\n");
    }

    // Load or create configuration
    let mut config = match Config::load() {
        Ok(config) => {
            println!("✓ Found existing configuration\n");
            config
        }
        Err(_) => {
            println!("Creating new configuration...\n");
            Config::default_config()
        }
    };

    // Step 1: Merchant profile
    configure_merchant(&mut config, non_interactive)?;

    // Step 2: Transaction ledger
    bootstrap_ledger(&mut config, non_interactive).await?;

    // Step 3: Reward program
    configure_rewards(&config, non_interactive)?;

    // Step 4: Settings PIN
    configure_pin(&config, non_interactive)?;

    // Step 5: Save configuration
    config.save()?;
    let config_path = resolve_config_path()?;
    println!("\n✓ Configuration saved to {}", config_path.display());

    display_completion();

    Ok(())
}

fn configure_merchant(config: &mut Config, non_interactive: bool) -> Result<()> {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 1: Merchant Profile");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!("The merchant username is stamped on every transaction the till");
    println!("records. The display currency is what amounts are entered in at");
    println!("the keypad; settlement always happens in sats.\n");

    if non_interactive {
        println!(
            "Using merchant '{}' with display currency {}\n",
            config.merchant.username, config.merchant.currency
        );
        return Ok(());
    }

    config.merchant.username = prompt_with_default("Merchant username", &config.merchant.username)?;

    let currency = prompt_with_default("Display currency", &config.merchant.currency)?
        .trim()
        .to_uppercase();
    if Currency::from_code(&currency).flag.is_empty() {
        println!(
            "⚠️  Unrecognized currency code '{}', amounts will use generic formatting",
            currency
        );
    }
    config.merchant.currency = currency;

    println!("✓ Merchant profile set\n");

    Ok(())
}

async fn bootstrap_ledger(config: &mut Config, non_interactive: bool) -> Result<()> {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 2: Transaction Ledger");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!("Every sale and reward is recorded in a SQLite ledger so history");
    println!("survives restarts.\n");

    if !non_interactive {
        config.database.path = prompt_with_default("Ledger path", &config.database.path)?;
    }

    // Creates the file, parent directories, and schema
    let db = Database::new(&config.database.path).await?;
    let stats = db.ledger_stats().await?;

    println!("✓ Ledger ready at {}", config.database.path);
    if stats.total_transactions > 0 {
        println!("  {} transactions already recorded", stats.total_transactions);
    }
    println!();

    Ok(())
}

fn configure_rewards(config: &Config, non_interactive: bool) -> Result<()> {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 3: Reward Program");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!("The till can hand out a percentage of each purchase as a sat");
    println!("reward. The rate can go up to {:.0}%; bounds and the standalone", MAX_REWARD_RATE * 100.0);
    println!("amount are adjustable later with 'lnpos-rewards set'.\n");

    let store = RewardStore::with_path(expand_path(&config.state.rewards_file))?;

    if non_interactive {
        let current = store.config();
        println!(
            "Using reward rate {:.1}% ({})\n",
            current.reward_rate * 100.0,
            if current.is_enabled { "enabled" } else { "disabled" }
        );
        return Ok(());
    }

    if !prompt_yes_no("Enable the reward program?", true)? {
        store.set_enabled(false)?;
        println!("✓ Reward program disabled\n");
        return Ok(());
    }
    store.set_enabled(true)?;

    let current_percent = store.config().reward_rate * 100.0;
    loop {
        let input = prompt_with_default(
            "Reward rate in percent",
            &format!("{:.1}", current_percent),
        )?;

        match input.trim().parse::<f64>() {
            Ok(percent) if (0.0..=MAX_REWARD_RATE * 100.0).contains(&percent) => {
                store.set_reward_rate(percent / 100.0)?;
                break;
            }
            Ok(_) => println!(
                "Rate must be between 0 and {:.0}. Please try again.",
                MAX_REWARD_RATE * 100.0
            ),
            Err(_) => println!("Not a number. Please try again."),
        }
    }

    let applied = store.config();
    println!(
        "✓ Reward program enabled at {:.1}%\n",
        applied.reward_rate * 100.0
    );

    Ok(())
}

fn configure_pin(config: &Config, non_interactive: bool) -> Result<()> {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Step 4: Settings PIN");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!("A {}-digit PIN keeps customers at the till out of the settings", PIN_LENGTH);
    println!("screens. Recording sales never requires it.\n");

    if non_interactive {
        println!("Skipping PIN setup in non-interactive mode.");
        println!("Use 'lnpos-rewards pin set' to add one later.\n");
        return Ok(());
    }

    let gate = PinGate::with_path(expand_path(&config.state.pin_file))?;

    if gate.has_pin() {
        println!("✓ A PIN is already set");
        println!("  Use 'lnpos-rewards pin change' to replace it.\n");
        return Ok(());
    }

    if !prompt_yes_no("Set a settings PIN?", false)? {
        println!("Skipped. Use 'lnpos-rewards pin set' to add one later.\n");
        return Ok(());
    }

    loop {
        let pin = rpassword::prompt_password("New PIN: ")?;
        let confirmation = rpassword::prompt_password("Confirm PIN: ")?;

        if pin != confirmation {
            println!("PINs do not match. Please try again.\n");
            continue;
        }

        match gate.set_pin(pin.trim()) {
            Ok(()) => break,
            Err(e) => println!("{}. Please try again.\n", e),
        }
    }

    println!("✓ PIN set\n");

    Ok(())
}

fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    print!("{} (default: {}): ", prompt, default);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.to_string())
    }
}

fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    let default_str = if default { "Y/n" } else { "y/N" };
    print!("{} [{}]: ", prompt, default_str);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();

    Ok(match input.as_str() {
        "" => default,
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

fn display_completion() {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🎉 Setup Complete!");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!("Next steps:\n");
    println!("  1. Review the reward program:");
    println!("     lnpos-rewards show\n");
    println!("  2. Preview a reward calculation:");
    println!("     lnpos-rewards calc --amount 1500\n");
    println!("  3. View the transaction ledger:");
    println!("     lnpos-history\n");

    println!("For more information:");
    println!("  - Run 'lnpos-rewards --help' for reward program management");
    println!("  - Run 'lnpos-history --help' for ledger queries\n");
}
