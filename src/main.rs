use std::process::ExitCode;

fn main() -> ExitCode {
    aicli::run()
}
