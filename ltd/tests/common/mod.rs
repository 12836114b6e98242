#![allow(dead_code)]

pub mod assertions;
pub mod logging;

pub use assertions::assert_contains;
pub use logging::init_test_logging;

use std::process::{Command, Output};

/// Run the `ltd` binary without any connection settings from the outer environment.
pub fn ltd(args: &[&str]) -> Output {
    crate::test_log!("RUN: ltd {}", args.join(" "));
    Command::new(env!("CARGO_BIN_EXE_ltd"))
        .args(args)
        .env_remove("LTD_LT_URL")
        .env_remove("LTD_LT_TOKEN")
        .env_remove("LTD_TRIGGER_MANIFEST")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run ltd")
}
