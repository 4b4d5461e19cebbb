#[path = "notify-hub/app.rs"]
mod app;
#[path = "notify-hub/cli.rs"]
mod cli;

use std::time::Duration;

// popups wait on a blocking thread until dismissed; do not hang on exit
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> std::process::ExitCode {
    let cli = cli::Cli::parse_args();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            report_error(&anyhow::Error::new(err).context("failed to start the async runtime"));
            return std::process::ExitCode::from(1);
        }
    };

    let result = runtime.block_on(app::run(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            report_error(&err);
            std::process::ExitCode::from(1)
        }
    }
}

fn report_error(err: &anyhow::Error) {
    eprintln!("Error: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}
