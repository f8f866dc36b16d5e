use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use craft_control::{drive_disassembly, AutoChooser, CraftOrder, CraftSession};
use craft_core::{
    Crew, DisassemblyActivity, Event, EventEnvelope, ItemTypeId, RecipeId, WorkConditions,
    WorkshopState, PROGRESS_MAX,
};
use craft_world::{build_initial_state, demo_actor, load_content, Scenario};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "craft_cli", about = "Crafting engine harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WorldArgs {
    /// Seed for item ids and every roll. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "./content")]
    content_dir: String,
    #[arg(long, default_value = "basic", value_parser = ["basic", "scrapyard"])]
    scenario: String,
    /// Let the crafter answer its own choices as a non-player character.
    #[arg(long)]
    npc: bool,
    /// Moves the crafter spends per turn.
    #[arg(long, default_value_t = 100)]
    moves: u32,
    #[arg(long, default_value_t = 10.0)]
    light: f32,
    #[arg(long, default_value_t = 5_000)]
    max_turns: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a craft and run it until it finishes or stops.
    Run {
        #[arg(long)]
        recipe: String,
        #[arg(long, default_value_t = 1)]
        batch: u32,
        /// Run up to this many batches back to back while stock lasts.
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        #[command(flatten)]
        world: WorldArgs,
    },
    /// Take apart the first item of the given type.
    Disassemble {
        #[arg(long)]
        item: String,
        #[command(flatten)]
        world: WorldArgs,
    },
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn setup(world: &WorldArgs) -> Result<(craft_core::CraftContent, WorkshopState, ChaCha8Rng)> {
    let content = load_content(&world.content_dir)?;
    let scenario = Scenario::parse(&world.scenario)?;
    let seed = world.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let state = build_initial_state(&content, seed, scenario, &mut rng);
    println!(
        "Workshop ready: seed={seed} scenario={} items={} content_version={}",
        world.scenario,
        state.pool.items().len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));
    Ok((content, state, rng))
}

fn conditions(world: &WorldArgs) -> WorkConditions {
    WorkConditions {
        light: world.light,
        speed: 1.0,
        moves: world.moves,
    }
}

fn run(recipe: &str, batch: u32, repeat: u32, world: &WorldArgs) -> Result<()> {
    let (content, mut state, mut rng) = setup(world)?;
    let mut crew = Crew::solo(demo_actor(world.npc));
    let order = CraftOrder {
        recipe_id: RecipeId(recipe.to_string()),
        batch,
        batches: repeat.max(1),
    };

    let report = CraftSession::default()
        .run(
            &order,
            &mut state,
            &content,
            &mut crew,
            conditions(world),
            &mut AutoChooser::default(),
            &mut rng,
            world.max_turns,
        )
        .with_context(|| format!("crafting {recipe} x{batch}"))?;
    print_events(&report.events);

    println!("{}", "-".repeat(80));
    println!(
        "Done after {} turns and {} batches: {:?}",
        report.turns, report.batches, report.status
    );
    Ok(())
}

fn disassemble(item: &str, world: &WorldArgs) -> Result<()> {
    let (content, mut state, mut rng) = setup(world)?;
    let mut actor = demo_actor(world.npc);
    let type_id = ItemTypeId(item.to_string());
    let Some(target) = state
        .pool
        .items()
        .iter()
        .find(|p| p.item.type_id == type_id)
        .map(|p| p.item.id.clone())
    else {
        bail!("no {item} in the {} scenario", world.scenario);
    };

    let (mut activity, started) = DisassemblyActivity::start(
        target,
        &mut state,
        &content,
        world.npc,
        &mut AutoChooser::default(),
    )
    .with_context(|| format!("disassembling {item}"))?;
    print_events(&started);
    let report = drive_disassembly(
        &mut activity,
        &mut state,
        &content,
        &mut actor,
        conditions(world),
        &mut rng,
        world.max_turns,
    )?;
    print_events(&report.events);

    println!("{}", "-".repeat(80));
    println!("Done after {} turns: {:?}", report.turns, report.status);
    Ok(())
}

fn describe(event: &Event) -> Option<String> {
    let line = match event {
        Event::CraftStarted { recipe_id, batch, .. } => format!("started {recipe_id} x{batch}"),
        Event::ComponentsConsumed { type_id, quantity, from, .. } => {
            format!("used {quantity} {type_id} ({from:?})")
        }
        Event::ToolChargesConsumed { type_id, charges, .. } => {
            format!("drained {charges} charges from {type_id}")
        }
        Event::SkillCapped { skill } => format!("too skilled in {skill} to learn anything"),
        Event::AssistantHelped { assistant } => format!("{assistant} lends a hand"),
        Event::SkillPracticed { actor, skill, amount } => {
            format!("{actor} practiced {skill} (+{amount})")
        }
        Event::ProgressTick { progress, steps, .. } if *steps > 0 => {
            format!("progress {}%", progress / (PROGRESS_MAX / 100))
        }
        Event::CheckpointPassed { ratio, .. } => format!("steady work (ratio {ratio:.2})"),
        Event::ComponentDestroyed { type_id, .. } => format!("ruined a {type_id}"),
        Event::ProgressLost { percent, .. } => format!("lost {percent}% progress"),
        Event::CraftDestroyed { .. } => "the craft is ruined".to_string(),
        Event::CraftCancelled { reason, .. } | Event::DisassemblyCancelled { reason, .. } => {
            format!("stopped: {reason:?}")
        }
        Event::CraftCompleted { recipe_id, results, byproducts, .. } => format!(
            "finished {recipe_id}: {} results, {} byproducts",
            results.len(),
            byproducts.len()
        ),
        Event::DisassemblyStarted { recipe_id, .. } => format!("taking apart {recipe_id}"),
        Event::ComponentRecovered { type_id, .. } => format!("recovered {type_id}"),
        Event::RecoveryFailed { type_id, reason } => format!("lost {type_id} ({reason:?})"),
        Event::DisassemblyCompleted { recovered, .. } => {
            format!("disassembly done, {recovered} parts recovered")
        }
        Event::ProgressTick { .. } => return None,
    };
    Some(line)
}

fn print_events(events: &[EventEnvelope]) {
    for envelope in events {
        if let Some(line) = describe(&envelope.event) {
            println!("[turn={:04} {}] {line}", envelope.turn, envelope.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            recipe,
            batch,
            repeat,
            world,
        } => run(&recipe, batch, repeat, &world)?,
        Commands::Disassemble { item, world } => disassemble(&item, &world)?,
    }
    Ok(())
}
