use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use lumitone::{
    LogPort, ModeCoordinator, MusicDirectory, Pattern, Settings, SystemClock, TimelineBuilder,
};

#[derive(Parser)]
#[command(name = "lumitone")]
#[command(about = "Light and tone pattern player", long_about = None)]
struct Cli {
    /// YAML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a MIDI file
    Inspect {
        /// Standard MIDI File to read
        file: PathBuf,

        /// Also print the merged timeline as JSON
        #[arg(long)]
        timeline: bool,
    },

    /// Start the controller and read commands from stdin
    Run,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("lumitone=info")).init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => Settings::default(),
    };

    match cli.command {
        Commands::Inspect { file, timeline } => inspect(&file, timeline),
        Commands::Run => run(&settings),
    }
}

fn inspect(path: &Path, print_timeline: bool) {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            process::exit(1);
        }
    };

    let source = match lumitone::MidiSource::parse(&bytes) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let timeline = match TimelineBuilder::build(&source) {
        Ok(timeline) => timeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let summary = source.summary();
    println!("Format: {}", summary.format);
    println!("Ticks per beat: {}", summary.ticks_per_beat);
    println!("Tracks: {}", summary.tracks.len());
    for track in &summary.tracks {
        println!(
            "  Track {}: {} ({} notes)",
            track.index,
            track.name.as_deref().unwrap_or("unnamed"),
            track.notes
        );
    }
    println!("Events: {}", timeline.events().len());
    println!("Tempo: {:.1} bpm", timeline.bpm_at(0));
    println!("Length: {:.2}s", timeline.duration().as_secs_f64());

    if print_timeline {
        match serde_json::to_string_pretty(&timeline) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
}

/// One line typed on stdin
#[derive(Debug, PartialEq)]
enum Command {
    Quit,
    Stop,
    Status,
    /// Song name, which may contain spaces
    Play(String),
    Mode(Pattern),
    Invalid(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word {
        "" => return None,
        "quit" | "exit" => Command::Quit,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "play" if rest.is_empty() => Command::Invalid("Usage: play <name>".to_string()),
        "play" => Command::Play(rest.to_string()),
        _ => match word.parse::<Pattern>() {
            Ok(pattern) => Command::Mode(pattern),
            Err(e) => Command::Invalid(format!("Error: {}", e)),
        },
    };
    Some(command)
}

fn run(settings: &Settings) {
    let coordinator = ModeCoordinator::start(
        settings,
        Arc::new(LogPort::new()),
        Arc::new(SystemClock::new()),
        Arc::new(MusicDirectory::new(settings.music_dir.clone())),
    );
    eprintln!("Commands: steady | fade | show | morse | play <name> | stop | status | quit");

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error reading stdin: {}", e);
                break;
            }
        };
        match parse_command(&line) {
            None => continue,
            Some(Command::Quit) => break,
            Some(Command::Stop) => coordinator.stop_timeline_playback(),
            Some(Command::Status) => match serde_json::to_string(&coordinator.status()) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Error: {}", e),
            },
            Some(Command::Play(name)) => {
                if let Err(e) = coordinator.play_timeline(&name) {
                    eprintln!("Error: {}", e);
                }
            }
            Some(Command::Mode(pattern)) => coordinator.set_mode(pattern),
            Some(Command::Invalid(message)) => eprintln!("{}", message),
        }
    }

    coordinator.shutdown();
}
