use std::{io::stdout, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use serde::Serialize;
use wiki_history::{
    payload::PayloadStore, ContentKind, Error, NewRevision, Registry, RevisionId, StoreConfig,
};

#[derive(Parser, Debug)]
struct Arguments {
    #[arg(long, default_value = ".", help = "directory holding every namespace")]
    root: PathBuf,
    #[arg(short, long, default_value = "default", help = "wiki namespace")]
    namespace: String,
    #[arg(short, long, default_value = "page", help = "page, file or template")]
    kind: ContentKind,
    #[arg(long, help = "JSON file with step and depth")]
    config: Option<PathBuf>,
    #[arg(long, help = "shard prefix length, overrides the config file")]
    step: Option<usize>,
    #[arg(long, help = "shard directory depth, overrides the config file")]
    depth: Option<usize>,
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "lists the current revision of every name")]
    List,
    #[clap(about = "shows one revision record of a name")]
    Show {
        name: String,
        #[arg(short, long, help = "version to show instead of the current one")]
        version: Option<u64>,
    },
    #[clap(about = "prints the payload of a revision")]
    Cat {
        name: String,
        #[arg(short, long, help = "version to print instead of the current one")]
        version: Option<u64>,
    },
    #[clap(about = "walks the chain starting at a revision id")]
    Log {
        id: String,
        #[arg(short, long, help = "maximum number of revisions to show")]
        max: Option<usize>,
        #[arg(short, long, help = "walk towards newer revisions")]
        forward: bool,
    },
    #[clap(about = "stores a file as the new current revision of a name")]
    Put {
        name: String,
        file: PathBuf,
        #[arg(short, long, default_value = "", help = "comment to leave with this revision")]
        comment: String,
    },
    #[clap(about = "makes an earlier revision current again")]
    Revert { id: String },
}

fn print_json<A: Serialize>(thing: &A) -> Result<(), Error> {
    serde_json::to_writer_pretty(stdout(), thing)?;
    println!();
    Ok(())
}

fn run(args: Arguments) -> Result<(), Error> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(step) = args.step {
        config.step = step;
    }
    if let Some(depth) = args.depth {
        config.depth = depth;
    }
    let mut registry = Registry::new(args.root, config)?;
    let store = registry.store(&args.namespace, args.kind)?;

    use Command::*;
    match args.cmd {
        List => print_json(&store.get_current_list()?),
        Show { name, version } => {
            let revision = match version {
                Some(version) => store.get_by_version(&name, version)?,
                None => store.get_by_name(&name)?,
            };
            print_json(&revision)
        }
        Cat { name, version } => {
            let revision = match version {
                Some(version) => store.get_by_version(&name, version)?,
                None => store.get_by_name(&name)?,
            };
            let bytes = std::fs::read(&revision.filepath)?;
            std::io::Write::write_all(&mut stdout(), &bytes)?;
            Ok(())
        }
        Log { id, max, forward } => {
            let id = RevisionId::from(id);
            let revisions = if forward {
                store.get_next_of(&id, max)?
            } else {
                store.get_prev_of(&id, max)?
            };
            print_json(&revisions)
        }
        Put {
            name,
            file,
            comment,
        } => {
            let bytes = std::fs::read(&file)?;
            let filename = store.payloads().insert(&bytes)?;
            let revision = store.add(NewRevision::new(name, filename).comment(comment))?;
            print_json(&revision)
        }
        Revert { id } => print_json(&store.revert(&RevisionId::from(id))?),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Arguments::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
