use std::process::ExitCode;

use dtmd::RunError;
use dtmd_admin::{init_logging, Config};
use tracing::error;

fn main() -> ExitCode {
    let config = match Config::parse_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dtmd: {e:?}");
            return ExitCode::from(1);
        }
    };

    init_logging(&config);

    match dtmd::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ RunError::Startup(_)) => {
            error!(error = %e, "dtmd failed to start");
            ExitCode::from(1)
        }
        Err(e @ RunError::Runtime(_)) => {
            error!(error = %e, "dtmd exited after a fatal runtime error");
            ExitCode::from(2)
        }
    }
}
