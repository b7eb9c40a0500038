//! beamtrace - interactive GPU ray tracer.

use std::path::PathBuf;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut verbosity: u8 = 1;
    let mut log_file: Option<PathBuf> = None;
    let mut initial_model: Option<PathBuf> = None;

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = 2,
            "-vv" | "--trace" => verbosity = 3,
            "-q" | "--quiet" => verbosity = 0,
            "--log-file" => {
                log_file = iter.next().map(PathBuf::from);
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                return;
            }
            other => {
                if other.starts_with('-') {
                    eprintln!("Unknown option: {other}");
                    print_usage(&args[0]);
                    std::process::exit(1);
                }
                initial_model = Some(PathBuf::from(other));
            }
        }
    }

    if let Err(e) = beamtrace::viewer::run(initial_model, verbosity, log_file) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Usage: {program} [options] [model.stl]");
    println!();
    println!("Options:");
    println!("  -v, --verbose      Debug logging");
    println!("  -vv, --trace       Trace logging");
    println!("  -q, --quiet        Warnings only");
    println!("  --log-file <path>  Redirect log output to a file");
    println!("  -h, --help         Show this help");
}
