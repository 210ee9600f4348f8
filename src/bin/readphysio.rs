use clap::Parser;
use log::error;
use physio_importer::load;
use std::path::PathBuf;
use std::process::ExitCode;

/// Read active (i.e. non-zero) signals from SIEMENS advanced
/// physiological log files.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Basename of the physio log files: the full path without the
    /// _Info.log / _ECG.log / ... suffix
    basename: PathBuf,

    /// Print per-signal statistics of the decoded traces
    #[arg(short, long)]
    show: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let physio = match load(&args.basename) {
        Ok(physio) => physio,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("UUID:       {}", physio.uuid);
    println!(
        "Geometry:   {} volumes x {} slices x {} echoes",
        physio.info.volumes, physio.info.slices, physio.info.echoes
    );
    println!(
        "Duration:   {} ticks = {:.4} s",
        physio.info.actual_samples(),
        physio.duration()
    );

    let active = physio.active_signals();
    if active.is_empty() {
        println!("No active physiological signals.");
        return ExitCode::SUCCESS;
    }

    if args.show {
        for (name, trace) in &active {
            let min = trace.iter().copied().min().unwrap_or(0);
            let max = trace.iter().copied().max().unwrap_or(0);
            let nonzero = trace.iter().filter(|&&value| value != 0).count();
            println!(
                "  {:<4} min {:>6}  max {:>6}  ({} active ticks)",
                name, min, max, nonzero
            );
        }
    } else {
        let names: Vec<&str> = active.iter().map(|(name, _)| *name).collect();
        println!("Active:     {}", names.join(", "));
    }

    ExitCode::SUCCESS
}
