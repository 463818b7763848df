// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr (
    all ( not(debug_assertions), target_os = "windows" ),
    windows_subsystem = "windows"
)]

use std::process::ExitCode;

use tabhop::config::Config;


fn main() -> ExitCode {

    let conf = Config::instance();

    // we want the non-blocking log-appender guard to be here in main, to ensure any pending logs get flushed upon crash etc
    // (hence also returning an exit code instead of exiting directly, so the guard gets dropped)
    let _guard = conf.setup_log_subscriber();

    tracing::info! ("Starting Tabhop {} ...", Config::TABHOP_VERSION);

    run (&conf)
}


#[cfg(windows)]
fn run (conf:&Config) -> ExitCode {
    match tabhop::app::run_tabhop (conf) {
        Ok(_)  => { tracing::info! ("Tabhop exited cleanly"); ExitCode::SUCCESS }
        Err(e) => { tracing::error! ("Tabhop could not start: {}", e); ExitCode::FAILURE }
    }
}

#[cfg(not(windows))]
fn run (_conf:&Config) -> ExitCode {
    tracing::error! ("Tabhop drives win32 global hotkeys, and only runs on windows");
    ExitCode::FAILURE
}
