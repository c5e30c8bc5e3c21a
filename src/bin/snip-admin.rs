use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use snip::config::Config;
use snip::models::{present_or_default, ShortUrlMapping};
use snip::storage;
use snip::validation::Validator;
use std::collections::BTreeMap;

#[derive(Parser)]
#[command(name = "snip-admin")]
#[command(about = "Snip short URL maintenance CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a stored mapping and its validation status
    Show {
        /// Short key
        key: String,
    },
    /// Run the safety and reachability checks again
    Revalidate {
        /// Short key
        key: String,
    },
    /// Print click counts by browser and platform
    Stats {
        /// Short key
        key: String,
    },
}

fn verdict(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

fn print_mapping(mapping: &ShortUrlMapping) {
    let validation = &mapping.validation;
    println!("{:<12} {}", "Key:", mapping.hash);
    println!("{:<12} {}", "Target:", mapping.redirection.target);
    println!("{:<12} {}", "Mode:", mapping.redirection.mode);
    println!("{:<12} {}", "Created:", mapping.created.to_rfc3339());
    println!("{:<12} {}", "Validated:", validation.validated);
    println!("{:<12} {}", "Safe:", verdict(validation.safe.as_option()));
    println!("{:<12} {}", "Reachable:", verdict(validation.reachable.as_option()));
    println!("{:<12} {}", "Country:", present_or_default(validation.country.clone()));
    println!("{:<12} {}", "Sponsor:", present_or_default(mapping.properties.sponsor.clone()));
    println!("{:<12} {}", "QR:", mapping.want_qr);
}

fn print_counts(title: &str, counts: &BTreeMap<String, i64>) {
    println!("{title}:");
    if counts.is_empty() {
        println!("  (none)");
    }
    for (label, count) in counts {
        println!("  {:<50} {}", label, count);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let storage = storage::connect(&config.database).await?;

    match cli.command {
        Commands::Show { key } => match storage.find_by_key(&key).await? {
            Some(mapping) => print_mapping(&mapping),
            None => bail!("Short Url with hash [{key}] doesn't exist"),
        },
        Commands::Revalidate { key } => {
            let Some(mapping) = storage.find_by_key(&key).await? else {
                bail!("Short Url with hash [{key}] doesn't exist");
            };
            let validator = Validator::from_config(storage.clone(), &config.validation)?;
            let status = validator.validate(&mapping).await?;
            println!(
                "✓ Revalidated '{}': safe={}, reachable={}",
                key,
                verdict(status.safe.as_option()),
                verdict(status.reachable.as_option())
            );
        }
        Commands::Stats { key } => {
            if !storage.exists(&key).await? {
                bail!("Short Url with hash [{key}] doesn't exist");
            }
            let stats = storage.click_stats(&key).await?;
            println!("Total clicks for '{}': {}", key, stats.total);
            print_counts("Browsers", &stats.browsers);
            print_counts("Platforms", &stats.platforms);
        }
    }

    Ok(())
}
