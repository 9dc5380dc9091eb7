use std::{fs, process, sync::Arc};

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use sprite_playground::{
    config::PlaygroundConfig,
    engine::{Sequencer, store::SpriteStore},
    input::pointer::PointerTracker,
    player::Player,
    program::{EventKind, Program},
    stage::{DrawnSprite, SpriteBounds, Stage},
};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

const PLAY_USAGE: &str = "sprite-playground play <program.json>";
const RUN_USAGE: &str = "sprite-playground run <program.json> [event]";
const CHECK_USAGE: &str = "sprite-playground check <program.json>";

/// Log file for `play`, where stderr is hidden behind the alternate screen.
const LOG_ENV: &str = "SPRITE_PLAYGROUND_LOG";

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);

    match args.next().as_deref() {
        Some("play") => {
            let path = args.next().context(PLAY_USAGE)?;
            init_tracing(true)?;
            play(&path)
        }
        Some("run") => {
            let path = args.next().context(RUN_USAGE)?;
            let event = match args.next() {
                Some(name) => name.parse::<EventKind>()?,
                None => EventKind::FlagClicked,
            };
            init_tracing(false)?;
            run_headless(&path, event)
        }
        Some("check") => {
            let path = args.next().context(CHECK_USAGE)?;
            init_tracing(false)?;
            check(&path)
        }
        _ => bail!(
            "Sprite Playground — block program previewer\n\nUsage:\n  {PLAY_USAGE}\n  {RUN_USAGE}\n  {CHECK_USAGE}"
        ),
    }
}

fn init_tracing(interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if !interactive {
        builder.with_writer(std::io::stderr).init();
        return Ok(());
    }

    match std::env::var_os(LOG_ENV) {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.to_string_lossy()))?;
            builder.with_ansi(false).with_writer(Arc::new(file)).init();
        }
        None => builder.with_writer(std::io::sink).init(),
    }
    Ok(())
}

fn load_program(path: &str) -> Result<Program> {
    Program::load(path).with_context(|| format!("Failed to load {path}"))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")
}

fn sequencer(
    config: &PlaygroundConfig,
    bounds: impl SpriteBounds + 'static,
    program: Program,
) -> Sequencer {
    let sequencer = Sequencer::new(
        Arc::new(SpriteStore::new()),
        Arc::new(PointerTracker::new(config.timing.pointer_throttle())),
        bounds,
        config,
    );
    sequencer.replace_program(program);
    sequencer
}

fn play(path: &str) -> Result<()> {
    let program = load_program(path)?;
    let config = PlaygroundConfig::load();
    let stage = Player::stage_layout(&config.stage);

    let sprite = Arc::new(DrawnSprite::new(stage.clone()));

    runtime()?.block_on(async {
        let sequencer = sequencer(&config, Arc::clone(&sprite), program);
        let mut player = Player::new(sequencer, stage, sprite, config.key_bindings.clone());
        player.play().await
    })
}

fn run_headless(path: &str, event: EventKind) -> Result<()> {
    let program = load_program(path)?;
    let config = PlaygroundConfig::load();
    let stage = Stage::new(&config.stage, 0, 0);

    let motion = runtime()?.block_on(async {
        let sequencer = sequencer(&config, stage, program);
        match sequencer.start_animation(event) {
            Some(run) => eprintln!("Started run {run} for {event}"),
            None => eprintln!("No chains for {event}"),
        }
        sequencer.wait_idle().await;
        sequencer.store().motion()
    });

    println!("{}", serde_json::to_string_pretty(&motion)?);
    Ok(())
}

fn check(path: &str) -> Result<()> {
    let program = load_program(path)?;

    for (i, root) in program.roots().iter().enumerate() {
        let head = root.action.kind();
        let trigger = match root.action.event() {
            Some(_) => "",
            None => " (not attached to an event; never runs)",
        };
        println!("chain {}: {} step(s), starts with {head}{trigger}", i + 1, root.step_count());
        for action in root.iter().skip(1) {
            println!("    {}", action.kind());
        }
    }

    for event in EventKind::ALL {
        eprintln!("{event}: {} chain(s)", program.chains_for(event).len());
    }
    Ok(())
}
