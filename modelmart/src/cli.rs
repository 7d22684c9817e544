//! CLI commands and output formatting.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use modelmart_client::{
    Address, ContractKind, InterfaceDescriptor, Listing, ListingId, PurchaseOutcome, RpcClient,
};
use tracing::warn;

use crate::config::ModelmartConfig;

/// Marketplace subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Connect the wallet and show the authorized account
    Account,

    /// Show a token balance
    Balance {
        /// Account to query instead of the connected one
        #[arg(short, long, value_name = "ADDRESS")]
        account: Option<Address>,
    },

    /// List marketplace listings
    Listings {
        /// Show only listings that are not sold
        #[arg(short, long)]
        available: bool,

        /// Show only listings of this seller
        #[arg(short, long, value_name = "ADDRESS")]
        seller: Option<Address>,

        /// Filter by name or description
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish a model listing
    Publish {
        /// Model name
        #[arg(short, long)]
        name: String,

        /// Model description
        #[arg(short, long)]
        description: String,

        /// Link to the model artifact
        #[arg(short, long)]
        link: String,

        /// Price in tokens, e.g. 12.5
        #[arg(short, long)]
        price: String,
    },

    /// Buy a listing at its catalog price
    Purchase {
        /// Listing id
        id: ListingId,

        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Validate the configured contract interface descriptors
    Descriptors,
}

/// Execute a command against the configured marketplace.
pub async fn execute(command: Command, config: &ModelmartConfig) -> Result<()> {
    let descriptors = validate_descriptors(config)?;
    let client =
        RpcClient::over_rpc(&config.rpc_options()).context("Failed to create marketplace client")?;
    let symbol = config.contracts.token_symbol.as_str();

    match command {
        Command::Account => handle_account(&client).await,
        Command::Balance { account } => handle_balance(&client, account, symbol).await,
        Command::Listings {
            available,
            seller,
            search,
            json,
        } => handle_listings(&client, available, seller, search, json, symbol).await,
        Command::Publish {
            name,
            description,
            link,
            price,
        } => handle_publish(&client, &name, &description, &link, &price, symbol).await,
        Command::Purchase { id, yes } => handle_purchase(&client, id, yes, symbol).await,
        Command::Descriptors => {
            print_descriptors(&descriptors);
            Ok(())
        }
    }
}

/// Fail fast on any configured descriptor that does not match the client's
/// interface.
pub fn validate_descriptors(config: &ModelmartConfig) -> Result<Vec<InterfaceDescriptor>> {
    let configured = [
        (ContractKind::Token, &config.contracts.token_descriptor),
        (
            ContractKind::Marketplace,
            &config.contracts.marketplace_descriptor,
        ),
    ];
    configured
        .into_iter()
        .filter_map(|(kind, path)| path.as_ref().map(|p| (kind, p)))
        .map(|(kind, path)| InterfaceDescriptor::load(kind, path).map_err(anyhow::Error::from))
        .collect()
}

fn print_descriptors(descriptors: &[InterfaceDescriptor]) {
    if descriptors.is_empty() {
        eprintln!("No interface descriptors configured");
        return;
    }

    let rows = descriptors
        .iter()
        .map(|d| {
            vec![
                d.kind().to_string(),
                d.contract_name().unwrap_or("-").to_string(),
                d.functions().len().to_string(),
                "ok".to_string(),
            ]
        })
        .collect();
    format_table(&["CONTRACT", "NAME", "FUNCTIONS", "STATUS"], rows);
}

async fn handle_account(client: &RpcClient) -> Result<()> {
    let session = client.connect().await?;
    if let Some(account) = session.account() {
        println!("{account}");
    }
    Ok(())
}

async fn handle_balance(client: &RpcClient, account: Option<Address>, symbol: &str) -> Result<()> {
    let account = match account {
        Some(account) => account,
        None => client
            .connect()
            .await?
            .account()
            .context("Wallet authorized no account")?,
    };
    let amount = client.balance_reader().read_balance(account).await?;
    println!("{amount} {symbol}");
    Ok(())
}

async fn handle_listings(
    client: &RpcClient,
    available: bool,
    seller: Option<Address>,
    search: Option<String>,
    json: bool,
    symbol: &str,
) -> Result<()> {
    let snapshot = client.catalog().fetch_all().await?;
    let listings: Vec<&Listing> = match &search {
        Some(query) => snapshot.search(query),
        None => snapshot.iter().collect(),
    };
    let filtered: Vec<&Listing> = listings
        .into_iter()
        .filter(|l| !available || !l.sold)
        .filter(|l| seller.is_none_or(|s| l.seller == s))
        .collect();

    if json {
        println!("{}", format_json(&filtered)?);
    } else {
        let rows = filtered
            .iter()
            .map(|l| {
                vec![
                    l.id.to_string(),
                    l.model_name.clone(),
                    format!("{} {symbol}", l.price),
                    l.seller.to_string(),
                    status(l).to_string(),
                    l.model_link.clone(),
                ]
            })
            .collect();
        format_table(&["ID", "NAME", "PRICE", "SELLER", "STATUS", "LINK"], rows);
    }
    Ok(())
}

async fn handle_publish(
    client: &RpcClient,
    name: &str,
    description: &str,
    link: &str,
    price: &str,
    symbol: &str,
) -> Result<()> {
    client.connect().await?;

    let spinner = spinner(&format!("Publishing {name} for {price} {symbol}"));
    let result = client.publish(name, description, link, price).await;
    spinner.finish_and_clear();

    let id = result?;
    eprintln!("Published listing {id}");
    println!("{id}");
    Ok(())
}

async fn handle_purchase(client: &RpcClient, id: ListingId, yes: bool, symbol: &str) -> Result<()> {
    let state = client.start().await?;
    let Some(listing) = state.catalog.get(id) else {
        bail!("Listing {id} does not exist");
    };
    if listing.sold {
        bail!("Listing {id} is already sold");
    }

    if !yes && is_tty() {
        let prompt = format!(
            "Buy {} (#{id}) for {} {symbol}?",
            listing.model_name, listing.price
        );
        if !confirm(&prompt)? {
            eprintln!("Purchase cancelled");
            return Ok(());
        }
    }

    let spinner = spinner(&format!("Approving and buying listing {id}"));
    let result = client.purchase(id, &listing.price.to_string()).await;
    spinner.finish_and_clear();

    print_outcome(&result?, symbol);
    Ok(())
}

fn print_outcome(outcome: &PurchaseOutcome, symbol: &str) {
    eprintln!(
        "Bought listing {} for {} {symbol}",
        outcome.listing_id, outcome.price
    );
    eprintln!("  approve:       {}", outcome.approval.hash);
    eprintln!("  purchaseModel: {}", outcome.purchase.hash);
    if let Some(balance) = &outcome.balance {
        eprintln!("  balance:       {} {symbol}", balance.amount);
    }
    if let Some(listing) = outcome
        .catalog
        .as_ref()
        .and_then(|c| c.get(outcome.listing_id))
    {
        eprintln!("  status:        {}", status(listing));
    }
    for error in &outcome.refresh_errors {
        warn!(error = %error, "State refresh after purchase failed");
    }
}

fn status(listing: &Listing) -> &'static str {
    if listing.sold { "sold" } else { "available" }
}

/// Spinner on stderr while waiting for confirmations.
fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Check if stdout is a TTY.
fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Prompt user for confirmation.
fn confirm(prompt: &str) -> Result<bool> {
    let result = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;
    Ok(result)
}

/// Render a table: header, separator, one line per row.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header: Vec<String> = headers.iter().map(ToString::to_string).collect();
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut lines = vec![pad_row(&header, &widths), pad_row(&separator, &widths)];
    lines.extend(rows.iter().map(|row| pad_row(row, &widths)));
    lines.join("\n")
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let width = widths.get(i).copied().unwrap_or(0);
            format!("{cell:width$}")
        })
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Format and print a table to stdout.
fn format_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        eprintln!("No items found");
        return;
    }
    println!("{}", render_table(headers, &rows));
}

/// Format data as JSON.
fn format_json<T: serde::Serialize>(data: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(data)?;
    Ok(json)
}
