//! Life GPU CLI - Run the simulation in a window or headless.

mod app;

use std::time::Instant;

use life_gpu::{
    compute::gpu::{DeviceContext, FrameOutcome, GpuSimulation},
    schema::{ControlStore, Controls, SimulationConfig, live_count},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--example") => print_example_config(),
        Some("--help") | Some("-h") => print_usage(&args[0]),
        Some("--headless") => {
            let steps: u64 = match args.get(2).and_then(|s| s.parse().ok()) {
                Some(steps) => steps,
                None => {
                    print_usage(&args[0]);
                    std::process::exit(1);
                }
            };
            let config = load_config(args.get(3));
            if let Err(e) = run_headless(config, steps) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        path => {
            let config = load_config(path.map(String::from).as_ref());
            if let Err(e) = app::run(config) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [config.json]", program);
    eprintln!("       {} --headless <steps> [config.json]", program);
    eprintln!("       {} --example", program);
    eprintln!();
    eprintln!("Run a toroidal Game of Life on the GPU.");
    eprintln!();
    eprintln!("Window controls:");
    eprintln!("  Space        play / pause");
    eprintln!("  Up / Down    slower / faster stepping");
    eprintln!("  [ / ]        smaller / larger grid");
    eprintln!("  R / G / C    random / gliders / clear");
    eprintln!("  Escape       quit");
}

fn load_config(path: Option<&String>) -> SimulationConfig {
    let Some(path) = path else {
        return SimulationConfig::default();
    };
    SimulationConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error in config: {}", e);
        std::process::exit(1);
    })
}

/// Step the simulation offscreen as fast as the scheduler allows.
fn run_headless(mut config: SimulationConfig, steps: u64) -> Result<(), Box<dyn std::error::Error>> {
    config.playing = true;
    let controls = ControlStore::new(&config)?;
    let grid = controls.grid();

    println!("Life GPU (headless)");
    println!("===================");
    println!("Grid: {}x{}", grid.width, grid.height);
    println!("Pattern: {:?}", config.pattern);
    println!("Steps: {}", steps);
    println!();

    let context = pollster::block_on(DeviceContext::headless(grid.width, grid.height))?;
    println!("Adapter: {}", context.adapter_info().name);

    let mut simulation = GpuSimulation::new(context, &controls)?;
    let initial = live_count(&simulation.read_cells()?);
    println!("Initial live cells: {}", initial);

    // Synthetic clock: every tick is exactly one interval later
    let interval = controls.update_interval();
    let mut now = Instant::now();
    let start = Instant::now();

    simulation.frame(now, &controls)?;
    while simulation.step() < steps {
        now += interval;
        if let FrameOutcome::Stopped = simulation.frame(now, &controls)? {
            break;
        }
    }
    let cells = simulation.read_cells()?;
    let elapsed = start.elapsed();

    println!("Final live cells: {}", live_count(&cells));
    println!(
        "Time: {:.2}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        simulation.step() as f32 / elapsed.as_secs_f32()
    );
    Ok(())
}

fn print_example_config() {
    let config = SimulationConfig::default();
    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
