//! Virtual memory trace driver - Main Entry Point
//!
//! Usage: vmem-sim [OPTIONS] <trace_file> <output_file>
//!
//! Arguments:
//!   trace_file  - File of operations: `w <va> <value>` / `r <va>`
//!   output_file - File to write one outcome token per operation
//!
//! Options:
//!   -v, --verbose       Print detailed paging information
//!   -h, --help          Print help information
//!   --offset-width N    Bits per index/offset field
//!   --depth N           Number of table levels
//!   --frames N          Number of physical frames

use std::env;
use std::process;
use std::str::FromStr;

use log::LevelFilter;

use vmem_sim::geometry::Geometry;
use vmem_sim::io::{Trace, write_results};
use vmem_sim::logger;
use vmem_sim::vm::VirtualMemory;

/// Command-line configuration
struct Config {
    trace_file: String,
    output_file: String,
    verbose: bool,
    offset_width: Option<u32>,
    depth: Option<u32>,
    frames: Option<usize>,
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    logger::init(if config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn print_help(program: &str) {
    eprintln!("Virtual Memory Simulator - replays an access trace through paged memory");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <trace_file> <output_file>", program);
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  trace_file  - Operations, one per line: `w <va> <value>` or `r <va>`");
    eprintln!("  output_file - Output file for outcomes (word read, `ok`, or `err`)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -v, --verbose       Print detailed paging information");
    eprintln!("  -h, --help          Print this help message");
    eprintln!("  --offset-width N    Bits per index/offset field");
    eprintln!("  --depth N           Number of table levels");
    eprintln!("  --frames N          Number of physical frames");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} trace.txt output.txt", program);
    eprintln!("  {} -v --frames 8 trace.txt output.txt", program);
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];

    let mut verbose = false;
    let mut offset_width = None;
    let mut depth = None;
    let mut frames = None;
    let mut positional: Vec<&String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help(program);
                process::exit(0);
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "--offset-width" => {
                offset_width = Some(option_value(&args, &mut i)?);
            }
            "--depth" => {
                depth = Some(option_value(&args, &mut i)?);
            }
            "--frames" => {
                frames = Some(option_value(&args, &mut i)?);
            }
            arg if arg.starts_with('-') => {
                return Err(format!(
                    "Unknown option: {}\nUse --help for usage information.",
                    arg
                ));
            }
            _ => {
                positional.push(&args[i]);
            }
        }
        i += 1;
    }

    if positional.len() != 2 {
        print_help(program);
        return Err(format!(
            "\nError: Expected 2 arguments, got {}",
            positional.len()
        ));
    }

    Ok(Config {
        trace_file: positional[0].clone(),
        output_file: positional[1].clone(),
        verbose,
        offset_width,
        depth,
        frames,
    })
}

/// Consume the value of the option at `args[*i]`, advancing the cursor.
fn option_value<T: FromStr>(args: &[String], i: &mut usize) -> Result<T, String> {
    let name = args[*i].clone();
    *i += 1;
    let value = args
        .get(*i)
        .ok_or_else(|| format!("Option {} requires a value", name))?;
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", name, value))
}

/// Main logic separated from main() for cleaner error handling
fn run(config: &Config) -> Result<(), String> {
    let defaults = Geometry::default();
    let geometry = Geometry::new(
        config.offset_width.unwrap_or(defaults.offset_width()),
        config.depth.unwrap_or(defaults.tables_depth()),
        config.frames.unwrap_or(defaults.num_frames()),
    )
    .map_err(|e| e.to_string())?;

    if config.verbose {
        eprintln!("=== vmem-sim ===");
        eprintln!("Trace file:  {}", config.trace_file);
        eprintln!("Output file: {}", config.output_file);
        eprintln!(
            "Physical:    {} frames x {} words",
            geometry.num_frames(),
            geometry.page_size()
        );
        eprintln!(
            "Virtual:     {} words, {} pages, {} table levels",
            geometry.virtual_memory_size(),
            geometry.num_pages(),
            geometry.tables_depth()
        );
        eprintln!();
    }

    let trace = Trace::from_file(&config.trace_file).map_err(|e| e.to_string())?;

    if config.verbose {
        eprintln!("Operations to replay: {}", trace.ops.len());
        eprintln!();
    }

    let mut vm = VirtualMemory::new(geometry);
    let results = trace.replay(&mut vm);

    if config.verbose {
        let stats = vm.stats();
        eprintln!();
        eprintln!("=== Summary ===");
        eprintln!("Page faults:      {}", stats.page_faults);
        eprintln!("Reclaimed frames: {}", stats.reclaimed_frames);
        eprintln!("Fresh frames:     {}", stats.fresh_frames);
        eprintln!("Evictions:        {}", stats.evictions);
        eprintln!("Restores:         {}", stats.restores);
        eprintln!();
    }

    write_results(&config.output_file, &results).map_err(|e| e.to_string())?;

    if config.verbose {
        eprintln!("Results written to: {}", config.output_file);
    }

    Ok(())
}
