//! CLI entry point for the timelapse archive downloader.

mod app;
mod cli;
mod output;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub(crate) enum ProcessExit {
    /// Every archive was downloaded or skipped.
    Success = 0,
    /// At least one archive failed.
    Failure = 1,
    /// The archive listing could not be fetched.
    ListingFailed = 2,
    /// The run was stopped by Ctrl+C.
    Interrupted = 130,
}

impl ProcessExit {
    pub(crate) fn code(self) -> i32 {
        self as i32
    }
}

#[tokio::main]
async fn main() {
    let exit = match app::runtime::run_timelapse_dl().await {
        Ok(exit) => exit,
        Err(error) => {
            eprintln!("ERROR: {error:#}");
            ProcessExit::Failure
        }
    };
    std::process::exit(exit.code());
}
