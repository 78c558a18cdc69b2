use clap::{CommandFactory, Parser, Subcommand};
use questgate_core::Config;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "questgate", version, about = "Questgate CLI")]
struct Cli {
    /// Acting user id
    #[arg(long, global = true, env = "QUESTGATE_USER")]
    user: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Player account
    Account {
        #[command(subcommand)]
        action: commands::account::AccountAction,
    },
    /// Quest management
    Quest {
        #[command(subcommand)]
        action: commands::quest::QuestAction,
    },
    /// Open, close and review gates
    Gate {
        #[command(subcommand)]
        action: commands::gate::GateAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("questgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging.level);

    let result = match cli.command {
        Commands::Account { action } => commands::account::run(action, config, cli.user),
        Commands::Quest { action } => commands::quest::run(action, config, cli.user),
        Commands::Gate { action } => commands::gate::run(action, config, cli.user),
        Commands::Config { action } => commands::config::run(action, config),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "questgate", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
