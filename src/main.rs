use std::env;
use std::io;
use std::path;
use std::process::exit;

use mzdb::io::mzdb::MzDbReader;

fn usage() -> ! {
    eprintln!("Usage: mzdb <path.mzDB> [spectra [ms level] | run-slices [min mz] [max mz] | windows]");
    exit(2)
}

fn parse_arg<T: std::str::FromStr>(arg: Option<&String>) -> Option<T> {
    match arg.map(|s| s.parse::<T>()) {
        Some(Ok(value)) => Some(value),
        Some(Err(_)) => usage(),
        None => None,
    }
}

fn main() -> io::Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage()
    }
    let path = path::Path::new(&args[1]);
    let reader = MzDbReader::open_path(path)?;
    eprintln!("Path: {} ({} spectra)", path.display(), reader.len());

    match args.get(2).map(|s| s.as_str()).unwrap_or("spectra") {
        "spectra" => {
            let ms_level = parse_arg::<u8>(args.get(3));
            for spectrum in reader.spectra(ms_level)? {
                let spectrum = spectrum?;
                let base_peak = spectrum
                    .data
                    .iter()
                    .max_by(|a, b| a.intensity.total_cmp(&b.intensity));
                match base_peak {
                    Some(peak) => println!(
                        "Spectrum {} (MS{}) at {:.3} => {} peaks, BP {:.4} ({:.1})",
                        spectrum.id(),
                        spectrum.ms_level(),
                        spectrum.header.time,
                        spectrum.peaks_count(),
                        peak.mz,
                        peak.intensity
                    ),
                    None => println!(
                        "Spectrum {} (MS{}) at {:.3} => no peaks",
                        spectrum.id(),
                        spectrum.ms_level(),
                        spectrum.header.time
                    ),
                }
            }
        }
        "run-slices" => {
            let mz_range = match (parse_arg::<f64>(args.get(3)), parse_arg::<f64>(args.get(4))) {
                (Some(lo), Some(hi)) => Some((lo, hi)),
                (None, None) => None,
                _ => usage(),
            };
            for run_slice in reader.lc_ms_run_slices(mz_range)? {
                let run_slice = run_slice?;
                println!(
                    "Run slice {} [{:.2}, {:.2}) => {} spectrum slices, {} peaks",
                    run_slice.id(),
                    run_slice.header.begin_mz,
                    run_slice.header.end_mz,
                    run_slice.spectrum_slices().len(),
                    run_slice.data.peaks_count()
                );
            }
        }
        "windows" => {
            for window in reader.isolation_windows()? {
                println!("{:.4}-{:.4}", window.min_mz, window.max_mz);
            }
        }
        _ => usage(),
    }
    Ok(())
}
