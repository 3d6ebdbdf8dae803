use chrono::Local;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub fn get_circ_data_dir() -> PathBuf {
    let xdg_data_home = env::var("XDG_DATA_HOME")
        .ok()
        .and_then(|path| {
            if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            }
        })
        .or_else(|| {
            env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".local/share"))
        })
        .expect("Could not determine data directory");

    xdg_data_home.join("circ")
}

/// Write the result list to circular_primes.txt, one value per line,
/// replacing any previous run's file.
pub fn save_results(primes: &[u32]) -> std::io::Result<()> {
    let data_dir = get_circ_data_dir();
    fs::create_dir_all(&data_dir)?;

    let path = data_dir.join("circular_primes.txt");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;

    // Buffered writes with itoa for fast integer formatting
    let mut writer = BufWriter::new(file);
    let mut itoa_buf = itoa::Buffer::new();
    for &prime in primes {
        writer.write_all(itoa_buf.format(prime).as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush()
}

pub fn log_execution(subcommand: &str, args: &str, duration_us: u128) -> std::io::Result<()> {
    let data_dir = get_circ_data_dir();
    fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("execution_log.txt");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    writeln!(file, "{} | {} | {} | {}us", timestamp, subcommand, args, duration_us)?;

    Ok(())
}
