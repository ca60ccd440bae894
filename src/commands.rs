use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{ApiClient, CategoryItem, StockItem};
use crate::auth;
use crate::config::Settings;
use crate::relay::run_relay;
use crate::scanner::ScanChannel;
use crate::session::SessionKey;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch interactive TUI dashboard
    #[command(name = "dashboard", alias = "tui")]
    Dashboard,

    /// Log in and remember the session
    #[command(name = "login")]
    Login {
        /// Account username
        username: String,
        /// Account password
        #[arg(long, env = "SMARTCHAIN_PASSWORD", hide_env_values = true)]
        password: String,
        /// Role to open: manufacturer, customer, ...
        #[arg(long)]
        role: String,
    },

    /// Revoke the refresh token and forget the session
    #[command(name = "logout")]
    Logout,

    /// Print the stock overview once
    #[command(name = "stock")]
    Stock,

    /// Print products per category once
    #[command(name = "categories")]
    Categories,

    /// Print QR scans as they arrive (Ctrl-C to stop)
    #[command(name = "scans")]
    Scans,

    /// Forward every QR scan to the backend for stock intake (Ctrl-C to stop)
    #[command(name = "relay")]
    Relay,
}

pub async fn handle_command(cmd: Command, client: &ApiClient, settings: &Settings) -> Result<()> {
    match cmd {
        Command::Login {
            username,
            password,
            role,
        } => {
            let route = auth::login(client, &username, &password, &role).await?;
            println!("✅ Logged in as {} ({})", username, route.role);
            println!("   Dashboard: {}", route.path);
        }

        Command::Logout => {
            auth::logout(client).await;
            println!("Logged out.");
        }

        Command::Stock => {
            require_session(client)?;
            let items = client.get_stock().await.context("Failed to load stock data")?;
            print_stock(&items);
        }

        Command::Categories => {
            require_session(client)?;
            let items = client
                .get_category_stock()
                .await
                .context("Failed to load category data")?;
            print_categories(&items);
        }

        Command::Scans => print_scans(settings).await?,

        Command::Relay => {
            let mut channel = ScanChannel::start(settings.broker())?;
            let cancel_token = CancellationToken::new();
            let relay = tokio::spawn(run_relay(
                client.clone(),
                channel.hub().scans(),
                cancel_token.clone(),
            ));

            println!("Relaying scans from {} to {}", settings.topic, client.endpoint("store_qr/"));
            tokio::signal::ctrl_c().await?;

            cancel_token.cancel();
            let stats = relay.await.context("relay task failed to join")?;
            channel.shutdown().await?;
            println!(
                "Relayed {} scans ({} failed)",
                stats.forwarded, stats.failed
            );
        }

        Command::Dashboard => bail!("dashboard runs in the terminal UI"),
    }

    Ok(())
}

fn require_session(client: &ApiClient) -> Result<()> {
    if client.session().get(SessionKey::AccessToken).is_none() {
        bail!("Not logged in. Run `smartchain login` first.");
    }
    Ok(())
}

fn print_stock(items: &[StockItem]) {
    if items.is_empty() {
        println!("No stock records.");
        return;
    }

    println!(
        "{:<28} {:>8} {:>10} {:>8} {:>9}",
        "Product", "Category", "Available", "Sold", "Demanded"
    );
    println!("{}", "─".repeat(67));
    for item in items {
        let marker = if item.demanded > item.available { " ⚠" } else { "" };
        println!(
            "{:<28} {:>8} {:>10} {:>8} {:>9}{}",
            item.product_name, item.category, item.available, item.sold, item.demanded, marker
        );
    }
}

fn print_categories(items: &[CategoryItem]) {
    if items.is_empty() {
        println!("No categories.");
        return;
    }

    let widest = items.iter().map(|item| item.product_count).max().unwrap_or(0).max(1);
    for item in items {
        let bar_len = (item.product_count.max(0) * 30 / widest) as usize;
        println!(
            "{:<20} {:>5}  {}",
            item.name,
            item.product_count,
            "█".repeat(bar_len)
        );
    }
}

async fn print_scans(settings: &Settings) -> Result<()> {
    let mut channel = ScanChannel::start(settings.broker())?;
    let mut scans = channel.hub().scans();
    let mut snapshots = channel.hub().watch();
    let mut last_status = snapshots.borrow().status.clone();

    println!("Listening on {} ({})", settings.topic, settings.broker_url);
    println!("Status: {}", last_status);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = scans.recv() => match received {
                Ok(scan) => println!("{}  {}", scan.timestamp, scan.value),
                Err(RecvError::Lagged(skipped)) => info!("skipped {} scans", skipped),
                Err(RecvError::Closed) => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = snapshots.borrow_and_update().status.clone();
                if status != last_status {
                    println!("Status: {}", status);
                    last_status = status;
                }
            }
        }
    }

    channel.shutdown().await
}
