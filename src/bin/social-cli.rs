use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use social_api::auth::TokenAuthenticator;
use social_api::config;

#[derive(Parser)]
#[command(name = "social-cli")]
#[command(about = "Operator CLI for the social API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a token for a user id with the configured secret
    Issue {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        subject: i64,
    },
    /// Validate a token and print its claims
    Verify {
        #[arg(short, long)]
        config: Option<PathBuf>,
        token: String,
    },
    /// Check a running server
    Health {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Issue { config, subject } => {
            let authenticator = authenticator(config)?;
            println!("{}", authenticator.issue(subject));
        }
        Commands::Verify { config, token } => {
            let authenticator = authenticator(config)?;
            match authenticator.validate(&token) {
                Ok(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
                Err(e) => {
                    eprintln!("Invalid token: {} ({})", e, e.kind());
                    std::process::exit(1);
                }
            }
        }
        Commands::Health { url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/v1/health", url.trim_end_matches('/')))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn authenticator(path: Option<PathBuf>) -> Result<TokenAuthenticator, Box<dyn std::error::Error>> {
    let config = config::load(path.as_deref())?;
    Ok(TokenAuthenticator::from_config(&config.auth.token)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
