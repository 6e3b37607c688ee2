// maintenance commands for a deployed database
use clap::{value_parser, Arg, Command};
use dotenv::dotenv;
use time::{Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use promptlab::{
    catalog,
    config::Config,
    store::{PgStore, Store},
};

/// Longest lifetime `token` will issue.
const MAX_TOKEN_DAYS: i64 = 3650;

fn cli() -> Command {
    Command::new("promptlab-admin")
        .subcommand_required(true)
        .subcommand(Command::new("migrate")
                        .aliases(["m"])
                        .about("Apply pending database migrations"))
        .subcommand(Command::new("seed")
                        .aliases(["s"])
                        .about("Write the default curriculum into the database"))
        .subcommand(Command::new("token")
                        .aliases(["t"])
                        .about("Issue an access token for a user id")
                        .arg(Arg::new("user")
                                .required(true)
                                .value_parser(value_parser!(Uuid)))
                        .arg(Arg::new("days")
                                .long("days")
                                .default_value("30")
                                .value_parser(value_parser!(i64).range(1..=MAX_TOKEN_DAYS))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promptlab=info")),
        )
        .init();

    let matches = cli().get_matches();

    let config = Config::from_env()?;
    let store = PgStore::connect(config.require_database_url()?).await?;

    match matches.subcommand() {
        Some(("migrate", _)) => {
            store.migrate().await?;
            println!("Migrations applied");
        }
        Some(("seed", _)) => {
            store.migrate().await?;
            let count = catalog::seed(&store).await?;
            println!("Seeded {} modules", count);
        }
        Some(("token", args)) => {
            let user = args.get_one::<Uuid>("user").copied().ok_or("missing user id")?;
            let days = args.get_one::<i64>("days").copied().unwrap_or(30);
            let expires_at = OffsetDateTime::now_utc() + Duration::days(days);
            let token = store.issue_token(user, expires_at).await?;
            println!("{}", token);
        }
        _ => {
            eprintln!("Invalid command, use promptlab-admin help");
        }
    }
    Ok(())
}
