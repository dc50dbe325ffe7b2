//! Line-oriented command shell over a [`LinkHost`].

use std::io::{self, BufRead, Write};
use std::path::Path;

use super::link_host::{DynamicBindingReport, LinkHost};

const HELP: &str = "\
Commands:
  load PATH             load a UI description and apply its declared bindings
  bind A.attr:B.attr    link two attributes
  set OBJ.ATTR VALUE    write an attribute (VALUE is converted to its type)
  get OBJ.ATTR          read an attribute
  show OBJ              list an object's attributes
  list [FILTER]         list objects, optionally filtered by name
  links                 list active links
  unbind                remove every link
  flush                 deliver queued change notifications
  help                  show this text
  quit                  leave the shell";

enum Flow {
    Continue,
    Quit,
}

/// Read commands from `input` until `quit` or end of input.
pub fn run_shell<R: BufRead, W: Write>(host: &mut LinkHost, input: R, mut out: W) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Flow::Quit = execute(host, line, &mut out)? {
            break;
        }
        out.flush()?;
    }
    Ok(())
}

fn execute<W: Write>(host: &mut LinkHost, line: &str, out: &mut W) -> io::Result<Flow> {
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .unwrap_or((line, ""));
    log::debug!("shell: {} {}", command, rest);

    match command {
        "load" => {
            if rest.is_empty() {
                writeln!(out, "Usage: load PATH")?;
            } else {
                match host.load_file(Path::new(rest)) {
                    Ok(report) => {
                        writeln!(out, "Loaded file: {}", rest)?;
                        write_report(out, &report)?;
                    }
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
        }
        "bind" => match host.add_binding(rest) {
            Ok(message) | Err(message) => writeln!(out, "{}", message)?,
        },
        "set" => {
            let (reference, value) = rest
                .split_once(char::is_whitespace)
                .map(|(r, v)| (r, v.trim()))
                .unwrap_or((rest, ""));
            match host.set_value(reference, value) {
                Ok(true) => writeln!(out, "ok")?,
                Ok(false) => writeln!(out, "unchanged")?,
                Err(e) => writeln!(out, "Error: {}", e)?,
            }
        }
        "get" => match host.get_value(rest) {
            Ok(value) => writeln!(out, "{}", value)?,
            Err(e) => writeln!(out, "Error: {}", e)?,
        },
        "show" => match host.inspect(rest) {
            Ok(lines) => write_lines(out, &lines)?,
            Err(e) => writeln!(out, "Error: {}", e)?,
        },
        "list" => write_lines(out, &host.listing(rest))?,
        "links" => {
            if host.links().is_empty() {
                writeln!(out, "No links.")?;
            }
            for link in host.links() {
                writeln!(
                    out,
                    "{}  {}  <=>  {}{}",
                    link.id(),
                    link.a().pretty(),
                    link.b().pretty(),
                    if link.is_bidirectional() { "" } else { "  (one-way)" }
                )?;
            }
        }
        "unbind" => writeln!(out, "Removed {} link(s).", host.unbind_all())?,
        "flush" => {
            let mut delivered = 0;
            loop {
                let batch = host.dispatch_pending();
                if batch == 0 {
                    break;
                }
                delivered += batch;
            }
            writeln!(out, "Delivered {} event(s).", delivered)?;
        }
        "help" | "?" => writeln!(out, "{}", HELP)?,
        "quit" | "exit" => return Ok(Flow::Quit),
        other => writeln!(out, "Unknown command '{}'. Type 'help'.", other)?,
    }
    Ok(Flow::Continue)
}

fn write_report<W: Write>(out: &mut W, report: &DynamicBindingReport) -> io::Result<()> {
    write_lines(out, &report.messages)?;
    if let Some(summary) = report.summary() {
        writeln!(out, "{}", summary)?;
    }
    Ok(())
}

fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}
