use std::process::ExitCode;

fn main() -> ExitCode {
    leave_cli::run()
}
