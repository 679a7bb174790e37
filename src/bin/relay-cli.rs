use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the relay broker", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show broker status, executor connection and pending tasks
    Status,
    /// Relay one request through the broker
    Call {
        /// Path under the relay prefix, e.g. /v1beta/models/m:generateContent
        path: String,
        /// JSON body
        #[arg(default_value = "{}")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Call { path, body } => {
            let body: Value = serde_json::from_str(&body)?;
            let res = client
                .post(format!("{}{}", base, path))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        eprintln!("Status: {}", status);
        println!("{}", rendered);
    } else {
        eprintln!("Error: broker returned status {}", status);
        eprintln!("{}", rendered);
    }
    Ok(())
}
