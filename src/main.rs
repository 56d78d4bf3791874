// src/main.rs  -  morse-switch  entry point
use anyhow::{Context, Result};
use clap::Parser;
use morse_switch::action::{Abbreviations, ActionDispatcher, TypeState};
use morse_switch::config::{self, AppConfig, Cli};
use morse_switch::engine::{run_loop, shutdown, DecoderEngine, LogFeedback};
use morse_switch::keyer::{self, EventBridge};
use morse_switch::layout::{builtin, load_layouts, LayoutStore};
use morse_switch::output;
use std::sync::mpsc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── --print-config  ───────────────────────────────────────────────────────
    if cli.print_config {
        print!("{}", config::DEFAULT_CONFIG_TOML);
        return Ok(());
    }

    // ── --write-config  ───────────────────────────────────────────────────────
    if cli.write_config {
        let path = AppConfig::write_default_config(&cli)?;
        println!("Config written to: {}", path.display());
        println!("Edit it to set the number of switches, their keys and timing.");
        return Ok(());
    }

    // ── --list-ports  ─────────────────────────────────────────────────────────
    if cli.list_ports {
        println!("Available switch sources:");
        for p in keyer::list_ports() { println!("  {p}"); }
        return Ok(());
    }

    // ── Load config + logging ─────────────────────────────────────────────────
    let cfg = AppConfig::load(&cli)?;
    let level = if cfg.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = cfg.engine_settings().context("Invalid [input] configuration")?;

    // ── --check-switches  ─────────────────────────────────────────────────────
    if cli.check_switches {
        let mut source = keyer::create_source(cfg.source, &cfg.midi_port)?;
        let ok = keyer::check_switches(source.as_mut(), &settings.bindings, Duration::from_secs(10))?;
        drop(source);
        std::process::exit(if ok { 0 } else { 1 });
    }

    // ── Layouts ───────────────────────────────────────────────────────────────
    let layouts = match &cfg.layout_file {
        Some(path) => load_layouts(path)?
            .into_store(cfg.main_layout.as_deref())
            .with_context(|| format!("Layouts in {}", path.display()))?,
        None => LayoutStore::new(
            vec![builtin::typing()?, builtin::mouse()?],
            cfg.main_layout.as_deref().unwrap_or(builtin::TYPING),
        )?,
    };

    // ── Output + typed-text state ─────────────────────────────────────────────
    let mut dispatcher = ActionDispatcher::new(output::create_synth(cfg.output));
    if cfg.typing {
        let abbreviations = match &cfg.abbreviations {
            Some(path) => Abbreviations::load(path)?,
            None       => Abbreviations::new(),
        };
        dispatcher = dispatcher.with_typestate(TypeState::new(abbreviations, cfg.trigger));
    }

    // ── Engine ────────────────────────────────────────────────────────────────
    let mut engine = DecoderEngine::new(settings.clone(), layouts, dispatcher)?
        .with_feedback(Box::new(LogFeedback));

    // ── Switch source + bridge thread ─────────────────────────────────────────
    let source = keyer::create_source(cfg.source, &cfg.midi_port)?;
    let (tx, rx) = mpsc::channel();
    let mut bridge = EventBridge::spawn(source, settings.bindings.clone(), tx)?;

    println!(
        "morse-switch: {} switch(es) on {} [{}], layout '{}' of {}.  Esc or Ctrl+C quits.\r",
        settings.mode.arity(),
        bridge.source_name(),
        settings.bindings.keys().join(", "),
        engine.active_layout().name(),
        engine.layouts().names().collect::<Vec<_>>().join("/"),
    );
    if let Some(ts) = engine.dispatcher().typestate() {
        log::info!(
            "[main] typing: {} abbreviation(s), trigger {:?}, predictions {}",
            ts.abbreviations().len(),
            ts.trigger(),
            if ts.has_predictor() { "on" } else { "off" },
        );
    }

    // ── Main loop ─────────────────────────────────────────────────────────────
    run_loop(&mut engine, &rx);

    // ── Cleanup ───────────────────────────────────────────────────────────────
    shutdown(&mut engine, &mut bridge, &rx);
    println!("\r\n73 de morse-switch\r");
    Ok(())
}
