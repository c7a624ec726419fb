//! Self-IP and gateway reconciliation CLI (l3ctl)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use l3ctl::commands::{read_subnet_info, show_config, Agent};
use l3ctl::config::AgentConfig;

#[derive(Parser)]
#[command(name = "l3ctl")]
#[command(about = "Self-IP and default gateway reconciliation for network appliances")]
#[command(long_about = "
Self-IP and default gateway reconciliation for network appliances

Assures per-device self-IPs and floating default gateways for tenant subnets
on the configured appliance, and removes gateways again. Subnets are described
by JSON files holding a `subnet` and an optional `network` object.

Examples:
  l3ctl register-subnet --subnet-info s1.json         # Make s1 allocatable
  l3ctl assure-selfip --subnet-info s1.json -t t1     # Local self-IP for tenant t1
  l3ctl assure-gateway --subnet-info s1.json -g tg1   # Floating gateway in tg1
  l3ctl delete-gateway --subnet-info s1.json          # Remove the gateway
  l3ctl -c /etc/l3-selfip/agent.toml show-config      # Show effective settings
")]
struct Cli {
    /// Agent configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assure the device's local self-IP on a subnet
    AssureSelfip {
        /// Subnet info JSON file
        #[arg(short, long)]
        subnet_info: PathBuf,

        /// Tenant the self-IP is assured for
        #[arg(short, long)]
        tenant: String,
    },

    /// Assure the floating default gateway of a subnet
    AssureGateway {
        /// Subnet info JSON file
        #[arg(short, long)]
        subnet_info: PathBuf,

        /// Traffic group owning the gateway address
        #[arg(short = 'g', long)]
        traffic_group: String,
    },

    /// Remove the floating default gateway of a subnet
    DeleteGateway {
        /// Subnet info JSON file
        #[arg(short, long)]
        subnet_info: PathBuf,
    },

    /// Register a subnet with the port registry
    RegisterSubnet {
        /// Subnet info JSON file
        #[arg(short, long)]
        subnet_info: PathBuf,
    },

    /// Show the effective configuration
    ShowConfig,
}

async fn run(cli: &Cli) -> Result<()> {
    let config = AgentConfig::load(cli.config.as_deref())?;

    if let Commands::ShowConfig = cli.command {
        return show_config(&config);
    }

    let agent = Agent::bootstrap(&config).await?;

    match &cli.command {
        Commands::AssureSelfip {
            subnet_info,
            tenant,
        } => {
            let info = read_subnet_info(subnet_info)?;
            agent.assure_selfip(&info, tenant).await
        }

        Commands::AssureGateway {
            subnet_info,
            traffic_group,
        } => {
            let info = read_subnet_info(subnet_info)?;
            agent.assure_gateway(&info, traffic_group).await
        }

        Commands::DeleteGateway { subnet_info } => {
            let info = read_subnet_info(subnet_info)?;
            agent.delete_gateway(&info).await
        }

        Commands::RegisterSubnet { subnet_info } => {
            let info = read_subnet_info(subnet_info)?;
            agent.register_subnet(&info).await
        }

        Commands::ShowConfig => show_config(&config),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Handle errors with appropriate exit codes
    match run(&cli).await {
        Ok(()) => {
            if !cli.quiet {
                log::info!("Command completed successfully");
            }
            std::process::exit(0);
        }
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {}", e);

                // Print error chain if in verbose mode
                if cli.verbose || cli.debug {
                    for cause in e.chain().skip(1) {
                        eprintln!("  Caused by: {}", cause);
                    }
                }
            }
            std::process::exit(1);
        }
    }
}
