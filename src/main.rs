//! uilink - bind attributes of a loaded UI and inspect the result

use std::io;
use std::path::PathBuf;

use clap::Parser;

use uilink::{Config, LinkHost};

#[derive(Debug, Parser)]
#[command(name = "uilink", version, about = "Two-way attribute links over a UI object tree")]
struct Cli {
    /// UI description (JSON) to load at startup
    ui_file: Option<PathBuf>,

    /// Link to create after loading, as `Obj1.attr1:Obj2.attr2` (repeatable)
    #[arg(long = "bind", value_name = "SPEC")]
    binds: Vec<String>,

    /// Only list objects whose name contains this text
    #[arg(long, default_value = "")]
    filter: String,

    /// Config file (defaults to <config dir>/uilink/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read commands from stdin after startup
    #[arg(short, long)]
    interactive: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());
    let mut host = LinkHost::new(config);

    if let Some(path) = &cli.ui_file {
        let report = host.load_file(path)?;
        for line in report.messages.iter().chain(report.summary().iter()) {
            println!("{}", line);
        }
    }

    let mut failed = 0;
    for spec in &cli.binds {
        match host.add_binding(spec) {
            Ok(message) => println!("{}", message),
            Err(message) => {
                eprintln!("{}", message);
                failed += 1;
            }
        }
    }

    if host.is_loaded() {
        for line in host.listing(&cli.filter) {
            println!("{}", line);
        }
    }

    if cli.interactive || cli.ui_file.is_none() {
        uilink::host::run_shell(&mut host, io::stdin().lock(), io::stdout().lock())?;
    }

    host.clear();
    if failed > 0 {
        return Err(format!("{} binding(s) failed", failed).into());
    }
    Ok(())
}
