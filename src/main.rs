use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paxlog::console::{render_log, render_pledges, render_projects, ConsoleCommand};
use paxlog::{
    ClusterConfig, CrowdfundService, CrowdfundState, LogStorage, PeerDirectory, SiteDaemon,
    StartOptions,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "paxlog")]
#[command(about = "Crowdfunding ledger replicated with multi-decree Paxos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        /// Name of this site in the config's site list.
        #[arg(short, long, default_value = "alpha")]
        site: String,

        #[arg(short, long, default_value = "paxlog.toml")]
        config: PathBuf,

        /// Start from an empty log, ignoring persisted state.
        #[arg(long)]
        fresh: bool,
    },
    Init {
        #[arg(short, long, default_value = "paxlog.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paxlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            site,
            config,
            fresh,
        } => run_site(site, config, fresh).await?,
        Commands::Init { config } => init_config(config)?,
    }

    Ok(())
}

async fn run_site(site: String, config_path: PathBuf, fresh: bool) -> Result<()> {
    info!("Loading config from {:?}", config_path);
    let config = ClusterConfig::load(&config_path)?;
    let directory = PeerDirectory::new(&config, &site)?;

    let data_dir = config.site_data_dir(directory.local_id());
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {:?}", data_dir))?;
    let storage = LogStorage::open(&data_dir)?;

    let options = StartOptions {
        timing: config.timing,
        fresh,
    };
    let daemon = SiteDaemon::<CrowdfundState>::start(directory, storage, options).await?;
    let service = CrowdfundService::new(daemon.site_name().to_string(), daemon.proposer().clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                let command = match ConsoleCommand::parse(&line) {
                    Some(command) => command,
                    None => {
                        println!("Check your input!");
                        continue;
                    }
                };
                if command == ConsoleCommand::Quit {
                    break;
                }
                run_command(&daemon, &service, command).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    daemon.shutdown().await;
    Ok(())
}

async fn run_command(
    daemon: &SiteDaemon<CrowdfundState>,
    service: &CrowdfundService<paxlog::Proposer<CrowdfundState>>,
    command: ConsoleCommand,
) -> Result<()> {
    let store = daemon.store();
    match command {
        ConsoleCommand::Create { project, goal } => {
            println!("{}", service.create_project(&project, goal).await?);
        }
        ConsoleCommand::Pledge { user, project } => {
            println!("{}", service.create_pledge(&user, &project).await?);
        }
        ConsoleCommand::Withdraw { pledge_id } => {
            println!("{}", service.withdraw_pledge(&pledge_id).await?);
        }
        ConsoleCommand::Cancel { project } => {
            println!("{}", service.cancel_project(&project).await?);
        }
        ConsoleCommand::Projects => {
            for line in render_projects(&store.snapshot()) {
                println!("{}", line);
            }
        }
        ConsoleCommand::List { project } => {
            for line in render_pledges(&store.snapshot(), &project) {
                println!("{}", line);
            }
        }
        ConsoleCommand::Log => {
            for line in render_log(&store.log()) {
                println!("{}", line);
            }
        }
        ConsoleCommand::Debug => {
            println!("{:?} frontier={} holes={:?}", store.log(), store.frontier(), store.holes());
        }
        ConsoleCommand::Remove { slot } => {
            if !store.erase_slot(slot)? {
                println!("Slot {} is not decided", slot);
            }
        }
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn init_config(config_path: PathBuf) -> Result<()> {
    if config_path.exists() {
        anyhow::bail!("Config file already exists: {:?}", config_path);
    }

    let config = ClusterConfig::default();
    config.save(&config_path)?;
    println!("Created config file: {:?}", config_path);
    println!("\nEdit the config file to:");
    println!("  - List every site with its address and base port");
    println!("  - Point data_dir at durable storage");
    println!("  - Adjust round timing if sites are far apart");

    Ok(())
}
