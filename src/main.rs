//! specrebase - Rebase RPM spec files to new upstream versions

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = specrebase::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
