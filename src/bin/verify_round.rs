use bingo_engine::{
    config::BingoConfig,
    games::{BetTier, CellValue, GameMode, Round, RoundConfig, RoundSeed, SpeedTier},
};
use clap::Parser;

/// Check a revealed seed against its commitment and replay the round
#[derive(Parser)]
#[command(name = "verify-round")]
struct Cli {
    /// Revealed seed (hex)
    #[arg(long)]
    seed: String,

    /// Commitment published before the round
    #[arg(long)]
    commitment: Option<String>,

    #[arg(long, default_value = "classic")]
    mode: GameMode,

    #[arg(long)]
    speed: Option<SpeedTier>,

    #[arg(long)]
    tier: Option<BetTier>,

    /// Number of cards dealt in the original round
    #[arg(long)]
    cards: Option<usize>,

    /// Replay without automatic win detection
    #[arg(long)]
    manual: bool,
}

fn main() {
    let cli = Cli::parse();

    println!("🔍 Bingo Round Verification");
    println!("===========================");

    let seed = match RoundSeed::from_hex(&cli.seed) {
        Ok(seed) => seed,
        Err(e) => {
            println!("❌ {}", e);
            std::process::exit(1);
        }
    };

    match &cli.commitment {
        Some(commitment) if seed.commitment().eq_ignore_ascii_case(commitment.trim()) => {
            println!("✅ Seed matches commitment {}", seed.commitment());
        }
        Some(commitment) => {
            println!("❌ Seed does NOT match commitment");
            println!("   Expected: {}", commitment);
            println!("   Got:      {}", seed.commitment());
            std::process::exit(1);
        }
        None => println!("ℹ️  No commitment given; seed commits to {}", seed.commitment()),
    }

    let mut config = RoundConfig::from_config(&BingoConfig::for_mode(cli.mode), 1.0);
    if let Some(speed) = cli.speed {
        config.speed = speed;
    }
    if let Some(tier) = cli.tier {
        config.bet_tier = tier;
        config.card_count = tier.card_count();
    }
    if let Some(cards) = cli.cards {
        config.card_count = cards;
    }
    config.auto_detect_wins = !cli.manual;
    config.time_limit_seconds = None;

    let mut round = Round::new(config, seed);
    println!("\n🎴 Cards:");
    for (index, card) in round.cards().iter().enumerate() {
        println!("   Card {} ({})", index + 1, card.id);
        for row in card.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| match cell.value {
                    CellValue::Free => "FREE".to_string(),
                    CellValue::Number(n) => format!("{:>4}", n),
                })
                .collect();
            println!("     {}", cells.join(" "));
        }
    }

    if let Err(e) = round.play_out() {
        println!("❌ Replay failed: {}", e);
        std::process::exit(1);
    }

    let calls: Vec<String> = round
        .called_numbers()
        .iter()
        .rev()
        .map(|n| n.to_string())
        .collect();
    println!("\n🎱 Call order ({}):", calls.len());
    for chunk in calls.chunks(15) {
        println!("   {}", chunk.join(" "));
    }

    println!("\n📊 Replayed outcome: {:?}", round.outcome());
    println!("   Elapsed: {}s", round.elapsed_seconds());
}
