mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    HttpOrderTransport, LoadOutcome, OrderListController, OrderStore, TransitionPolicy,
};
use shared::{Order, OrderDraft, OrderId, OrderItem, OrderRecord, OrderStatus, ProductId};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "orders", about = "Command-line client for the order management API")]
struct Args {
    /// Config file (defaults to ./orders.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Refuse status changes that skip or reverse the order lifecycle.
    #[arg(long, global = true)]
    lifecycle: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every order, optionally keeping only one status.
    List {
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    Show {
        id: i64,
    },
    Create {
        #[arg(long)]
        customer: String,
        /// PRODUCT_ID:NAME:QUANTITY:UNIT_PRICE, repeatable.
        #[arg(long = "item", required = true, value_parser = parse_item)]
        items: Vec<OrderItem>,
    },
    SetStatus {
        id: i64,
        status: OrderStatus,
    },
}

fn parse_item(raw: &str) -> Result<OrderItem, String> {
    let malformed = || format!("expected PRODUCT_ID:NAME:QUANTITY:UNIT_PRICE, got '{raw}'");
    let (product_id, rest) = raw.split_once(':').ok_or_else(malformed)?;
    let (rest, unit_price) = rest.rsplit_once(':').ok_or_else(malformed)?;
    let (name, quantity) = rest.rsplit_once(':').ok_or_else(malformed)?;

    let product_id = product_id
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid product id '{product_id}': {e}"))?;
    let quantity = quantity
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid quantity '{quantity}': {e}"))?;
    let unit_price = unit_price
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid unit price '{unit_price}': {e}"))?;

    Ok(OrderItem::new(
        ProductId(product_id),
        name.trim(),
        quantity,
        unit_price,
    ))
}

fn print_orders(orders: &[Order]) -> Result<()> {
    let records: Vec<OrderRecord> = orders.iter().map(OrderRecord::from).collect();
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn print_order(order: &Order) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&OrderRecord::from(order))?
    );
    Ok(())
}

async fn load_or_bail(controller: &OrderListController) -> Result<()> {
    match controller.load().await {
        LoadOutcome::Failed { message } => bail!("failed to load orders: {message}"),
        LoadOutcome::Loaded { count } => {
            info!(count, "orders loaded");
            Ok(())
        }
        LoadOutcome::Superseded => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
        settings.validate()?;
    }
    if args.lifecycle {
        settings.transition_policy = TransitionPolicy::Lifecycle;
    }
    info!(api_url = %settings.api_url, policy = ?settings.transition_policy, "orders client starting");

    let transport = HttpOrderTransport::new(settings.transport_config())
        .context("failed to build order transport")?;
    let store = Arc::new(OrderStore::with_config(
        Arc::new(transport),
        settings.store_config(),
    ));
    let controller = OrderListController::new(Arc::clone(&store));

    match args.command {
        Command::List { status } => {
            load_or_bail(&controller).await?;
            let orders = match status {
                Some(status) => controller.orders_with_status(status),
                None => controller.view().orders,
            };
            let items: usize = orders.iter().map(Order::item_count).sum();
            info!(orders = orders.len(), items, "orders listed");
            print_orders(&orders)?;
        }
        Command::Show { id } => {
            let order = store
                .fetch_one(OrderId(id))
                .await
                .with_context(|| format!("failed to fetch order {id}"))?;
            print_order(&order)?;
        }
        Command::Create { customer, items } => {
            let order = store
                .create(OrderDraft::new(customer, items))
                .await
                .context("failed to create order")?;
            print_order(&order)?;
        }
        Command::SetStatus { id, status } => {
            // The lifecycle check needs the current status in the local cache.
            if settings.transition_policy == TransitionPolicy::Lifecycle {
                load_or_bail(&controller).await?;
            }
            let order = controller
                .change_status(OrderId(id), status)
                .await
                .with_context(|| format!("failed to set order {id} to {status}"))?;
            print_order(&order)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_item_with_colon_in_name() {
        let item = parse_item("12:Cable: USB-C:3:19.90").expect("item");
        assert_eq!(item.product_id, ProductId(12));
        assert_eq!(item.product_name, "Cable: USB-C");
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price, 19.90);
    }

    #[test]
    fn rejects_malformed_items() {
        assert!(parse_item("12:Cable").is_err());
        assert!(parse_item("x:Cable:1:2.0").is_err());
        assert!(parse_item("1:Cable:-1:2.0").is_err());
    }

    #[test]
    fn cli_parses_set_status() {
        let args = Args::try_parse_from(["orders", "set-status", "42", "confirmed", "--lifecycle"])
            .expect("args");
        assert!(args.lifecycle);
        match args.command {
            Command::SetStatus { id, status } => {
                assert_eq!(id, 42);
                assert_eq!(status, OrderStatus::Confirmed);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
