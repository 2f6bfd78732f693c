//! Bingo Engine CLI
//!
//! Plays a live timed round in the terminal, runs batch simulations and
//! manages the configuration file.

use bingo_engine::{
    config::{generate_sample_config, BingoConfig, ConfigLoader},
    games::{
        AccountService, BetTier, CallAnnouncer, CallSequencer, Card, CellValue, GameMode,
        GameProcessor, InMemoryAccounts, NoopAnnouncer, RoundEvent, RoundSeed,
        SimulationFramework, SimulationReporter, SimulationScenario, SpeedTier, TracingAnnouncer,
        WinDetector,
    },
};
use clap::{Args, Parser, Subcommand};
use std::{io::BufRead, path::PathBuf, sync::Arc};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing_subscriber::EnvFilter;

const PLAYER: &str = "local-player";

/// Bingo Engine CLI
#[derive(Parser)]
#[command(name = "bingo-engine")]
#[command(about = "75-ball BINGO round engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Room preset used when no configuration file is given
    #[arg(short, long)]
    mode: Option<GameMode>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one live round in the terminal
    Play(PlayArgs),

    /// Run a batch of instant rounds and report statistics
    Simulate {
        /// Rounds per player
        #[arg(short, long, default_value = "100")]
        rounds: usize,

        /// Number of simulated players
        #[arg(short, long, default_value = "1")]
        players: usize,

        /// Bet per round
        #[arg(short, long, default_value = "10")]
        bet: f64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct PlayArgs {
    /// Bet amount
    #[arg(short, long, default_value = "10")]
    bet: f64,

    /// Call speed (slow, medium, fast)
    #[arg(short, long)]
    speed: Option<SpeedTier>,

    /// Bet tier (bronze, silver, gold, platinum)
    #[arg(short, long)]
    tier: Option<BetTier>,

    /// Number of cards, overriding the tier
    #[arg(long)]
    cards: Option<usize>,

    /// Claim wins by hand instead of automatic detection
    #[arg(long)]
    manual: bool,

    /// Call numbers on the timer even in rooms where the player calls them
    #[arg(long)]
    auto_call: bool,

    /// Hex seed to replay a specific round
    #[arg(long)]
    seed: Option<String>,

    /// Starting balance of the local player
    #[arg(long, default_value = "1000")]
    balance: f64,

    /// Log every call with its audio clip
    #[arg(long)]
    announce: bool,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default configuration to a file
    Init {
        #[arg(default_value = "bingo.toml")]
        path: PathBuf,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    let default_filter = if cli.verbose {
        "bingo_engine=debug".to_string()
    } else {
        format!("bingo_engine={}", config.monitoring.log_level.as_filter())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Play(args) => run_play(config, args).await,
        Commands::Simulate {
            rounds,
            players,
            bet,
            json,
        } => run_simulation(config, rounds, players, bet, json).await,
        Commands::Config(ConfigCommand::Init { path }) => {
            generate_sample_config(&path.to_string_lossy())?;
            println!("✅ Wrote default configuration to {}", path.display());
            Ok(())
        }
        Commands::Config(ConfigCommand::Show) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<BingoConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::new().with_path(path).load()?,
        None => BingoConfig::for_mode(cli.mode.unwrap_or_default()),
    };
    if let (Some(_), Some(mode)) = (&cli.config, cli.mode) {
        config.round.mode = mode;
    }
    config.validate()?;
    Ok(config)
}

async fn run_play(
    mut config: BingoConfig,
    args: PlayArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(speed) = args.speed {
        config.round.speed = speed;
    }
    if let Some(tier) = args.tier {
        config.round.bet_tier = tier;
    }
    if args.cards.is_some() {
        config.round.card_count = args.cards;
    }
    if args.manual {
        config.round.auto_detect_wins = false;
    }
    if args.auto_call {
        config.round.auto_call = true;
    }

    let accounts = Arc::new(InMemoryAccounts::new());
    accounts.deposit(PLAYER, args.balance);
    let processor = GameProcessor::new(config, accounts.clone())?;

    let seed = match &args.seed {
        Some(hex) => RoundSeed::from_hex(hex)?,
        None => RoundSeed::generate(),
    };
    let round_config = processor.round_config(args.bet);
    let round = processor
        .open_round_with_seed(PLAYER, round_config, seed)
        .await?;

    println!("🎱 {} BINGO - round {}", round.config().mode, round.id());
    println!("==================================================");
    println!(
        "💰 Bet {:.2} | speed {} | tier {}",
        args.bet,
        round.config().speed,
        round.config().bet_tier
    );
    println!("🔐 Commitment: {}\n", round.commitment());
    for (index, card) in round.cards().iter().enumerate() {
        println!("Card {}:\n{}", index + 1, render_card(card));
    }

    let mut auto_call = round.auto_call();
    if !auto_call {
        println!("⌨️  Enter calls the next number, 'a' toggles auto-call, 'q' quits\n");
    }

    let log_calls = args.announce || processor.config().monitoring.log_calls;
    let announcer: Arc<dyn CallAnnouncer> = if log_calls {
        Arc::new(TracingAnnouncer)
    } else {
        Arc::new(NoopAnnouncer)
    };
    let sequencer = CallSequencer::new(round).with_announcer(announcer);
    let mut events = sequencer.subscribe();
    let handle = sequencer.start();
    let mut input = spawn_input_reader();
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RoundEvent::Countdown { seconds_left, .. }) => {
                    println!("⏳ {}...", seconds_left)
                }
                Ok(RoundEvent::Started { .. }) => println!("▶️  Round started"),
                Ok(RoundEvent::AutoCallChanged { enabled, .. }) => {
                    println!("🔁 Auto-call {}", if enabled { "on" } else { "off" })
                }
                Ok(RoundEvent::NumberCalled { call, sequence, hits, .. }) => {
                    let hit_cards: Vec<usize> = hits.iter().map(|&(card, _, _)| card).collect();
                    if hit_cards.is_empty() {
                        println!("   #{:<2} {}", sequence, call.full_call);
                    } else {
                        let labels: Vec<String> =
                            hit_cards.iter().map(|c| format!("card {}", c + 1)).collect();
                        println!(
                            "   #{:<2} {}  ✅ {}",
                            sequence,
                            call.full_call,
                            labels.join(", ")
                        );
                    }

                    if args.manual {
                        if let Ok(snapshot) = handle.snapshot().await {
                            let complete = hit_cards
                                .into_iter()
                                .find(|&card| WinDetector.evaluate(&snapshot.cards[card]).complete);
                            if let Some(card) = complete {
                                println!("🙋 BINGO! Claiming card {}", card + 1);
                                if let Err(e) = handle.claim_win(card).await {
                                    tracing::warn!("Claim refused: {}", e);
                                }
                            }
                        }
                    }
                }
                Ok(RoundEvent::Finished { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Display lagged; skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            line = input.recv(), if input_open => match line {
                Some(line) => match line.trim() {
                    "" => {
                        if let Err(e) = handle.call_next().await {
                            tracing::warn!("Call refused: {}", e);
                        }
                    }
                    "a" => match handle.set_auto_call(!auto_call).await {
                        Ok(()) => auto_call = !auto_call,
                        Err(e) => tracing::warn!("Auto-call unchanged: {}", e),
                    },
                    "q" => {
                        if let Err(e) = handle.cancel().await {
                            tracing::warn!("Cancel ignored: {}", e);
                        }
                    }
                    other => println!("❓ Unknown input '{}'", other),
                },
                None => {
                    // No more input; let the timer finish the round
                    input_open = false;
                    if !auto_call && handle.set_auto_call(true).await.is_ok() {
                        auto_call = true;
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n🛑 Cancelling round");
                if let Err(e) = handle.cancel().await {
                    tracing::warn!("Cancel ignored: {}", e);
                }
            }
        }
    }

    let round = handle.join().await?;
    let result = processor.settle(PLAYER, &round).await?;

    println!("\n📊 Round Summary");
    println!("   Outcome: {:?}", result.outcome);
    println!("   Calls: {} in {}s", result.calls.len(), result.elapsed_seconds);
    println!(
        "   Payout: {:.2} (base {:.2}, time bonus {:.2})",
        result.payout.total, result.payout.base, result.payout.time_bonus
    );
    for award in &result.payout.jackpot_awards {
        println!("   🎰 {}: {:.2}", award.name, award.amount);
    }
    println!("   Balance: {:.2}", accounts.balance(PLAYER).await?);
    println!("🔓 Seed: {}", result.seed);
    println!(
        "   Verify with: verify-round --seed {} --commitment {}",
        result.seed, result.commitment
    );

    Ok(())
}

async fn run_simulation(
    config: BingoConfig,
    rounds: usize,
    players: usize,
    bet: f64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let framework = SimulationFramework::new(config)?;
    let results = framework
        .execute_scenario(SimulationScenario::Batch {
            player_count: players,
            rounds_per_player: rounds,
            bet_amount: bet,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{}", SimulationReporter::generate_report(&results));
    }
    Ok(())
}

/// Stdin lines on a plain thread, so a pending read never holds up exit
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn render_card(card: &Card) -> String {
    let mut out = String::from("   B    I    N    G    O\n");
    for row in card.rows() {
        for cell in row {
            match cell.value {
                CellValue::Free => out.push_str(" FREE"),
                CellValue::Number(n) => out.push_str(&format!(" {:>3} ", n)),
            }
        }
        out.push('\n');
    }
    out
}
