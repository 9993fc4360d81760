//! The read-parse-run loop: each line of input is parsed as its own module
//! and executed against a root object that survives across lines, so a
//! `var` declared on one line is visible to the next. Grounded on the
//! original REPL's `getline` / `parse_module` / `call_function` /
//! `vm_run` loop — a parse error is logged and the prompt simply comes
//! back, and a runtime error prints to stderr without tearing the session
//! down, matching that loop's `VM_ERRORED` handling.

use std::io::{self, BufRead, Write};

use faxc_drv::dump_module;
use faxc_runtime::build_root;
use fgc::{GcConfig, GcState};

pub fn run(verbose: bool) -> io::Result<()> {
    let mut gc = GcState::new(GcConfig::default());
    let (mut root, mut vcache) = build_root(&mut gc);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        let module = match faxc_drv::compile(&line) {
            Ok(module) => module,
            Err(e) => {
                tracing::debug!(error = %e, "line did not compile, skipping");
                continue;
            }
        };

        if verbose {
            dump_module(&module);
        }

        match faxc_drv::run_line(gc, vcache, root, module) {
            Ok((next_gc, next_vcache, next_root)) => {
                gc = next_gc;
                vcache = next_vcache;
                root = next_root;
            }
            Err((next_gc, next_vcache, msg)) => {
                eprintln!("{msg}");
                gc = next_gc;
                vcache = next_vcache;
            }
        }
    }

    Ok(())
}
