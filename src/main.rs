use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use modwrap::db::SqliteStore;
use modwrap::descriptor::load::DescriptorLoader;
use modwrap::entry;
use modwrap::harness::ShellBackend;
use modwrap::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "modwrap")]
#[command(version = "0.1.0")]
#[command(about = "Wrap command line tools described by JSON module descriptors")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate every descriptor in a directory
    Check {
        #[arg(short, long, env = "MODWRAP_DESCRIPTOR_DIR")]
        descriptor_dir: PathBuf,
    },
    /// Generate one entry point program per descriptor
    Emit {
        #[arg(short, long, env = "MODWRAP_DESCRIPTOR_DIR")]
        descriptor_dir: PathBuf,
        #[arg(short, long)]
        out_dir: PathBuf,
    },
    /// Run a module directly from its descriptor
    Run {
        #[arg(short, long)]
        descriptor: PathBuf,
        /// Entry point arguments, after `--`
        #[arg(last = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List jobs recorded in a state database
    Jobs {
        #[arg(long, env = "MODWRAP_STATE_DB")]
        db: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    info!("terve! starting up :)");

    let args = Args::parse();

    match args.command {
        Command::Check { descriptor_dir } => {
            let loader = DescriptorLoader::new()?;
            let descriptors = loader.read_dir(&descriptor_dir)?;
            for (path, descriptor) in &descriptors {
                println!("{}: {} ({} parameters)", path.display(), descriptor.name(), descriptor.parameters().len());
            }
            info!("{} descriptors are valid", descriptors.len());
        }
        Command::Emit { descriptor_dir, out_dir } => {
            let entries = modwrap::emit::emit_all(&descriptor_dir, &out_dir)?;
            for entry in &entries {
                println!("{entry}\n");
            }
        }
        Command::Run { descriptor, args } => {
            let loader = DescriptorLoader::new()?;
            let module = loader.read(&descriptor)?;
            let settings = Settings::from_env();
            let program = module.name().to_string();
            let code = entry::run(&program, Arc::new(module), &args, &settings, Arc::new(ShellBackend::default()));
            info!("terminating with exit code {code}");
            std::process::exit(code);
        }
        Command::Jobs { db } => {
            let store = SqliteStore::open(&db).with_context(|| format!("Opening {}", db.display()))?;
            for job in store.load_jobs()? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    job.id, job.module, job.state, job.exit_code, job.command
                );
                for artifact in store.load_artifacts(job.id)? {
                    println!("\t{}\t{}\t{}", artifact.name, artifact.path, artifact.mime_type);
                }
            }
        }
    }

    Ok(())
}
