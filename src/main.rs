//! Particle Canvas CLI - Render the particle system until stopped.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::Path;

use particle_canvas::{
    output::LogDisplay,
    render::{ChannelStop, FrameLoop, NeverStop, StopSignal},
    schema::{Palette, RenderConfig},
};

fn print_usage(program: &str) {
    eprintln!("Usage: {} [options]", program);
    eprintln!();
    eprintln!("Render a GPU particle system. Press Enter (or close stdin) to stop.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --number N     Number of particles (default: 200)");
    eprintln!("  --fire         Use the fire palette");
    eprintln!("  --dump         Write every frame to dump/<n>.png");
    eprintln!("  --debug        Full shader compiler diagnostics");
    eprintln!("  --frames N     Stop after N frames");
    eprintln!("  --seed N       Fixed random seed");
    eprintln!("  --config FILE  Load settings from a JSON file");
    eprintln!("  --example      Print the default configuration");
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> T {
    value
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            eprintln!("Error: {} expects a number", flag);
            std::process::exit(1);
        })
}

fn load_config(path: &Path) -> RenderConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    // --config is applied first so the other flags override it.
    let mut config = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => load_config(Path::new(path)),
            None => {
                eprintln!("Error: --config expects a file");
                std::process::exit(1);
            }
        },
        None => RenderConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--number" => {
                config.particles = parse_value("--number", args.get(i + 1));
                i += 1;
            }
            "--frames" => {
                config.max_frames = Some(parse_value("--frames", args.get(i + 1)));
                i += 1;
            }
            "--seed" => {
                config.random_seed = Some(parse_value("--seed", args.get(i + 1)));
                i += 1;
            }
            "--config" => i += 1,
            "--fire" => config.palette = Palette::Fire,
            "--dump" => config.dump_frames = true,
            "--debug" => config.diagnostics = true,
            "--example" => {
                print_example_config();
                return;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                return;
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // With a frame budget the run ends on its own.
    let mut stop: Box<dyn StopSignal> = if config.max_frames.is_some() {
        Box::new(NeverStop)
    } else {
        Box::new(ChannelStop::stdin())
    };

    let mut frame_loop = FrameLoop::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let config = frame_loop.config();
    println!("Particle Canvas");
    println!("===============");
    println!("Particles: {}", config.particles);
    println!("Palette: {:?}", config.palette);
    println!("Canvas: {0}x{0}", config.window_size);
    println!("Warm-up: {} iterations", config.warmup_iterations);
    if config.dump_frames {
        println!("Dumping frames to {}", config.dump_dir.display());
    }
    if config.max_frames.is_none() {
        println!("Press Enter to stop.");
    }
    println!();

    let mut display = LogDisplay::default();
    match frame_loop.run(&mut display, stop.as_mut()) {
        Ok(summary) => {
            println!();
            println!("Adapter: {}", summary.adapter);
            println!("Frames rendered: {}", summary.frames_rendered);
            if summary.frames_dumped > 0 {
                println!("Frames dumped: {}", summary.frames_dumped);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_example_config() {
    let config = RenderConfig::default();

    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
