use std::{env, process, time::Instant};

use ucompiler::{
    driver::{run, Failure, Options, USAGE},
    errors::errors::{Error, ErrorTip},
};

fn main() {
    let options = match Options::from_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}\n{}", message, USAGE);
            process::exit(2);
        }
    };

    let start = Instant::now();

    match run(&options) {
        Ok(()) => {
            if options.assemble {
                println!("Built {} in {:?}", options.output.display(), start.elapsed());
            } else {
                println!(
                    "Wrote {} in {:?}",
                    options.assembly_path().display(),
                    start.elapsed()
                );
            }
        }
        Err(Failure::Report(report)) => {
            print!("{}", report);
            println!("Compilation failed.");
            process::exit(1);
        }
        Err(Failure::Fatal(error)) => {
            display_error(&error);
            println!("Compilation failed.");
            process::exit(1);
        }
    }
}

fn display_error(error: &Error) {
    if let ErrorTip::None = error.get_tip() {
        println!("Error: {}", error.get_error_name());
    } else {
        println!("Error: {} ({})", error.get_error_name(), error.get_tip());
    }
    println!("-> {}", error);
}
