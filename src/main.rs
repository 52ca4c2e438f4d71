use std::process::ExitCode;

fn main() -> ExitCode {
    noxy::cli::run_cli()
}
