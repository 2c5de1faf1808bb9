use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = pcoip_ls_cli::run(std::env::args()) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
