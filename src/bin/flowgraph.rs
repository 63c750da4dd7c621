//! The thin CLI wrapper around the engine (`spec.md` §6): not core,
//! just a `clap`-based front door onto [`flowgraph::library::Library`].

use clap::{Parser, Subcommand};
use flowgraph::library::Library;
use flowgraph::log;

#[derive(Parser)]
#[command(name = "flowgraph", about = "Run and inspect flowgraph dags and blocks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every block key known to the library, optionally filtered
    /// by a name suffix.
    ListBlocks { name_suffix: Option<String> },
    /// List every dag key known to the library, optionally filtered by
    /// a name suffix.
    ListDags { name_suffix: Option<String> },
    /// Run a dag by key (or unambiguous key suffix).
    Run { dag_key: String },
}

fn main() {
    log::init_logger(log::Level::Info);

    let cli = Cli::parse();

    let result = match cli.command {
        Command::ListBlocks { name_suffix } => {
            for info in Library::list_blocks(name_suffix.as_deref()) {
                println!("{}\t{}", info.key, info.doc);
            }
            Ok(())
        }
        Command::ListDags { name_suffix } => {
            for info in Library::list_dags(name_suffix.as_deref()) {
                println!("{}\t{}", info.key, info.doc);
            }
            Ok(())
        }
        Command::Run { dag_key } => Library::run_dag(&dag_key).and_then(|mut dag| match dag.execute() {
            Ok(Some(paused_at)) => {
                log::info(format!("dag '{}' paused on '{paused_at}' waiting for input", dag.title));
                Ok(())
            }
            Ok(None) => {
                log::info(format!("dag '{}' finished", dag.title));
                Ok(())
            }
            Err(e) => Err(e),
        }),
    };

    if let Err(e) = result {
        log::error(format!("{e}"));
        std::process::exit(1);
    }
}
