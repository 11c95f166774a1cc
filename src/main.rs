//! Binary entrypoint for the helpdesk chat console.

use std::process::ExitCode;

use helpdesk_chat::console;

/// Chat with the helpdesk assistant configured through `HELPDESK_*` variables.
fn main() -> ExitCode {
    console::run()
}
