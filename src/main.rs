//! Hot-reload host executable
//! Keeps the process alive while the game module and assets are rebuilt.
//! Type a key name (F5 reload, F6 restart by default) and Enter to press it,
//! or `quit` to exit.

use std::io::BufRead;
use std::time::Instant;

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver};
use reload_harness::hot_reload::{FileAssetStore, HotReloadConfig, ReloadOrchestrator};
use reload_harness::input::{InputState, KeyCode};
use reload_harness::HostState;

/// Frames between periodic stats lines
const STATS_INTERVAL: u64 = 600;

/// Commands typed on the terminal
enum HostCommand {
    Press(KeyCode),
    Quit,
}

fn spawn_command_reader() -> anyhow::Result<Receiver<HostCommand>> {
    let (tx, rx) = unbounded();

    std::thread::Builder::new()
        .name("stdin-keys".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let command = if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("q") {
                    HostCommand::Quit
                } else {
                    match line.parse::<KeyCode>() {
                        Ok(key) => HostCommand::Press(key),
                        Err(e) => {
                            log::warn!("{}", e);
                            continue;
                        }
                    }
                };
                if tx.send(command).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader")?;

    Ok(rx)
}

fn run() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => HotReloadConfig::load(&path)
            .with_context(|| format!("loading config {}", path))?,
        None => HotReloadConfig::default(),
    };

    log::info!(
        "Module {} (working copy suffix {}), assets {}",
        config.module_path.display(),
        config.working_copy_suffix,
        config.asset_dir.display()
    );

    let mut state = HostState::default();
    let mut assets = FileAssetStore::new(&config.asset_dir);
    let mut orchestrator = ReloadOrchestrator::from_config(&config);

    orchestrator
        .start(&mut state, &mut assets)
        .context("starting hot-reload harness")?;

    let commands = spawn_command_reader()?;
    let mut input = InputState::new();
    let frame_duration = config.frame_duration();

    loop {
        let frame_start = Instant::now();

        let mut quit = false;
        for command in commands.try_iter() {
            match command {
                HostCommand::Press(key) => input.press(key),
                HostCommand::Quit => quit = true,
            }
        }
        if quit {
            log::info!("Quit requested");
            break;
        }

        state.delta_seconds = frame_duration.as_secs_f32();
        let result = orchestrator.tick(&mut state, &mut assets, &input);
        input.end_frame();
        result.context("frame failed")?;

        if state.quit_requested != 0 {
            log::info!("Module asked the host to quit");
            break;
        }

        let stats = orchestrator.stats();
        if stats.frames % STATS_INTERVAL == 0 {
            log::debug!(
                "frames={} module_reloads={} asset_reloads={} restarts={}",
                stats.frames,
                stats.module_reloads,
                stats.asset_reloads,
                stats.restarts
            );
        }

        if let Some(remaining) = frame_duration.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    orchestrator.shutdown();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("Host stopped: {:#}", e);
        std::process::exit(1);
    }
}
