//! Send stdin to a unix stream socket and write the single reply to stdout.

use std::sync::Arc;

use arrrg::CommandLine;
use indicio::stdio::StdioEmitter;
use indicio::{clue, INFO};

use sockcat::{exchange_stdio, SockcatOptions, COLLECTOR};

const USAGE: &str = "Usage: sockcat [--half-close] [--verbose] <socket-path>";

fn main() {
    let (options, free) = SockcatOptions::from_command_line_relaxed(USAGE);
    if free.len() != 1 {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    if options.verbose {
        let emitter = Arc::new(StdioEmitter);
        COLLECTOR.register(Arc::clone(&emitter));
        COLLECTOR.set_verbosity(INFO);
        clue!(COLLECTOR, INFO, {
            socket: free[0].as_str(),
        });
    }
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    if let Err(err) = exchange_stdio(&options, free[0].as_str(), stdin, stdout) {
        eprintln!("sockcat: {err}");
        std::process::exit(1);
    }
}
