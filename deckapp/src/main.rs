//! ShowDeck command-line front end.
//!
//! Wires configuration, the metadata catalog, the overlay status files and
//! the playback orchestrator together, starts the status poller and drives
//! everything from a small stdin command loop.

use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::{Result, anyhow};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use deckconfig::get_config;
use deckcontrol::{
    ChannelSubscriber, FileStatusSink, HttpPortConnector, MetadataProvider, PlaybackOrchestrator,
    YamlCatalogProvider, build_entry,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = get_config();
    if !config.is_player_config_valid() {
        return Err(anyhow!(
            "Player configuration is missing or invalid; check the player section of config.yaml"
        ));
    }

    let connector = HttpPortConnector::from_config(&config)?;
    let sink = FileStatusSink::from_config(&config);
    let catalog = YamlCatalogProvider::from_config(&config);
    info!(catalog = %catalog.path().display(), "Using metadata catalog");

    let orchestrator = PlaybackOrchestrator::new(Box::new(connector), Box::new(sink))?;

    // Mirror every playback event into the log at debug level.
    let (subscriber, events) = ChannelSubscriber::create();
    orchestrator.subscribe(subscriber);
    thread::spawn(move || {
        for (event, state) in events {
            debug!(event = ?event, phase = state.phase.as_str(), position = state.position_secs, "Deck event");
        }
    });

    orchestrator.start_polling();
    info!("ShowDeck ready");

    run_command_loop(&orchestrator, &catalog)
}

fn run_command_loop(
    orchestrator: &PlaybackOrchestrator,
    catalog: &dyn MetadataProvider,
) -> Result<()> {
    print_help();

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "add" if !arg.is_empty() => {
                if orchestrator.contains_media(arg) {
                    println!("Already in playlist: {}", arg);
                } else {
                    let entry = build_entry(arg, catalog);
                    println!("Added: {}", entry.title);
                    orchestrator.add_media(entry);
                }
            }
            "remove" if !arg.is_empty() => orchestrator.remove_media_by_path(arg),
            "play" if !arg.is_empty() => match arg.parse::<usize>() {
                Ok(index) => orchestrator.play_at(index),
                Err(_) => println!("Usage: play [index]"),
            },
            "play" => orchestrator.play(),
            "pause" => orchestrator.pause(),
            "stop" => orchestrator.stop(),
            "next" => {
                if !orchestrator.advance_to_next() {
                    println!("End of playlist reached");
                }
            }
            "up" | "down" => match arg.parse::<usize>() {
                Ok(index) => {
                    let new_index = if command == "up" {
                        orchestrator.move_up(index)
                    } else {
                        orchestrator.move_down(index)
                    };
                    println!("Entry now at index {}", new_index);
                }
                Err(_) => println!("Usage: {} <index>", command),
            },
            "vol" => match arg.parse::<u16>() {
                Ok(percent) => orchestrator.set_volume(percent),
                Err(_) => println!("Usage: vol <percent 0-200>"),
            },
            "seek" => match arg.parse::<u64>() {
                Ok(seconds) => orchestrator.seek(seconds),
                Err(_) => println!("Usage: seek <seconds>"),
            },
            "list" => print_playlist(orchestrator),
            "status" => print_status(orchestrator),
            "clear" => orchestrator.clear_playlist(),
            "quit" | "exit" => break,
            "help" => print_help(),
            _ => println!("Unknown command '{}'; type 'help'", command),
        }
    }

    orchestrator.stop_polling();
    info!("ShowDeck shutting down");
    Ok(())
}

fn print_playlist(orchestrator: &PlaybackOrchestrator) {
    let playlist = orchestrator.playlist();
    if playlist.is_empty() {
        println!("Playlist is empty");
        return;
    }
    let current = orchestrator.current_index();
    for (index, entry) in playlist.iter().enumerate() {
        let marker = if Some(index) == current { ">" } else { " " };
        println!("{} [{}] {}", marker, index, entry.title);
    }
}

fn print_status(orchestrator: &PlaybackOrchestrator) {
    let state = orchestrator.current_state();
    let title = state
        .current_media
        .as_ref()
        .map(|entry| entry.title.as_str())
        .unwrap_or("-");
    let duration = state
        .duration_secs
        .map(|d| d.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "{} | {} | {}s / {}s | volume {}%",
        state.phase.as_str(),
        title,
        state.position_secs,
        duration,
        state.volume_percent
    );
}

fn print_help() {
    println!("Commands:");
    println!("  add <path>     add a media file to the playlist");
    println!("  remove <path>  remove a media file from the playlist");
    println!("  play [index]   play the selection, or the entry at index");
    println!("  pause          toggle pause/resume");
    println!("  stop           stop playback");
    println!("  next           skip to the next entry");
    println!("  up <i>/down <i> move an entry within the playlist");
    println!("  vol <percent>  set volume (0-200)");
    println!("  seek <secs>    seek to an absolute position");
    println!("  list           show the playlist");
    println!("  status         show the reconciled playback state");
    println!("  clear          clear the playlist");
    println!("  quit           exit");
}
