// steptracker - headless runner
// Loads config (and optionally a project), then plays through a MIDI port for a while

use steptracker::midi::{
    LogWriter, MidiOutputSink, MidirPortWriter, OutputSink, list_output_ports,
};
use steptracker::project::{ProjectLoadOptions, ProjectManager};
use steptracker::sequencer::clock::SimpleClock;
use steptracker::{CommandRegistry, Config, Sequencer, Tempo};
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--list-ports") {
        for device in list_output_ports() {
            println!(
                "{}{}",
                device.name,
                if device.is_default { " (default)" } else { "" }
            );
        }
        return;
    }

    let config = Config::load();
    let registry = Arc::new(CommandRegistry::standard());
    let output = open_output(config.midi_port());

    let sequencer = Arc::new(Sequencer::new(
        config.sequence_count(),
        config.sequence_length(),
        registry,
        output.clone(),
    ));
    for seq in 0..sequencer.how_many_sequences() {
        if let Err(e) = sequencer.set_sequence_ticks_per_step(seq, config.ticks_per_step()) {
            log::warn!("{}", e);
        }
    }

    let mut tempo = config.tempo();
    if let Some(path) = args.iter().find(|a| !a.starts_with("--")) {
        let manager = ProjectManager::new();
        let loaded = manager
            .load_project(path, &ProjectLoadOptions::default())
            .and_then(|project| manager.apply_project(&project, &sequencer));
        match loaded {
            Ok(bpm) => {
                tempo = Tempo::new(bpm);
                log::info!("Loaded project {}", path);
            }
            Err(e) => {
                log::error!("Could not load {}: {}", path, e);
                return;
            }
        }
    }

    log::info!(
        "{} sequences at {}\n{}",
        sequencer.how_many_sequences(),
        tempo,
        sequencer
    );

    let clock = SimpleClock::with_sleep_granularity(tempo, config.sleep_granularity());
    {
        let sequencer = Arc::clone(&sequencer);
        let output = Arc::clone(&output);
        // Note-offs due now go out before this tick's note-ons
        clock.set_callback(move |tick| {
            output.send_due(tick);
            sequencer.tick(tick);
        });
    }

    if let Err(e) = clock.start() {
        log::error!("Could not start clock thread: {}", e);
        return;
    }
    std::thread::sleep(config.run_duration());
    clock.stop();
    sequencer.panic();
}

/// midir port if one can be opened, otherwise a sink that logs messages
fn open_output(port: Option<&str>) -> Arc<dyn OutputSink> {
    match MidirPortWriter::connect(port) {
        Ok(writer) => Arc::new(MidiOutputSink::new(writer)),
        Err(e) => {
            log::warn!("No MIDI output ({}); logging messages instead", e);
            Arc::new(MidiOutputSink::new(LogWriter))
        }
    }
}
