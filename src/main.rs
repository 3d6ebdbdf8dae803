mod digits;
mod search;
mod storage;
mod table;

use clap::{Parser, Subcommand};
use std::time::Instant;

use search::{CircularPrimeSearch, DEFAULT_LIMIT, DEFAULT_WORKERS};

#[derive(Parser)]
#[command(name = "circ")]
#[command(about = "Find circular primes with a two-phase parallel sieve", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search for every circular prime below a limit")]
    Search {
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_LIMIT,
            help = "Exclusive upper bound of the search"
        )]
        limit: u32,
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_WORKERS,
            help = "Number of worker threads"
        )]
        workers: usize,
        #[arg(long, help = "Save the result list to circular_primes.txt")]
        save: bool,
    },
    #[command(about = "Print the decimal rotation cycle of a number")]
    Rotations {
        #[arg(help = "The number to rotate")]
        number: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            limit,
            workers,
            save,
        } => {
            let search = match CircularPrimeSearch::new(limit, workers) {
                Ok(search) => search,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            println!(
                "Searching for circular primes below {} ({} workers)...\n",
                limit, workers
            );

            let start = Instant::now();
            let report = search.run();
            let duration = start.elapsed();
            let duration_us = duration.as_micros();

            report.print();

            println!(
                "\nExecution time: {}us ({:.2}ms)",
                duration_us,
                duration_us as f64 / 1000.0
            );

            if save {
                match storage::save_results(&report.circular_primes) {
                    Ok(_) => println!(
                        "Saved {} circular primes to circular_primes.txt",
                        report.circular_primes.len()
                    ),
                    Err(e) => eprintln!("Error saving circular_primes.txt: {}", e),
                }
            }

            if let Err(e) = storage::log_execution(
                "search",
                &format!("limit={} workers={}", limit, workers),
                duration_us,
            ) {
                eprintln!("Warning: Failed to log execution: {}", e);
            }
        }
        Commands::Rotations { number } => {
            if let Err(e) = digits::print_rotations(number) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
