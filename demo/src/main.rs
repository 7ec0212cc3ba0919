//! interpose demo
//!
//! Builds an interceptor chain from `plugins.toml` (metrics, an
//! application-defined fraud check and tracing), puts it in front of an
//! in-memory order service and runs a few orders through it.
//!
//! ```bash
//! cargo run -p interpose-demo -- --config demo/plugins.toml -v
//! ```

mod fraud;
mod orders;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use interpose::{ChainConfig, Component, InterceptorRegistry, MetricsInterceptor, SurfaceCatalog};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use fraud::FraudCheck;
use orders::{Auditable, InMemoryOrders, Order, OrderService};

#[derive(Parser, Debug)]
#[command(name = "interpose-demo", version, about = "Order service behind an interceptor chain")]
struct Cli {
    /// Chain configuration (TOML, YAML or JSON)
    #[arg(short, long, default_value = "demo/plugins.toml")]
    config: PathBuf,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// `RUST_LOG` wins; otherwise the verbosity flags pick the level
    fn init_tracing(&self) {
        let level = match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_tracing();

    let metrics = MetricsInterceptor::new();
    let shared = metrics.clone();
    let registry = InterceptorRegistry::with_builtins()
        .with("metrics", move || Box::new(shared.clone()))
        .with("fraud-check", || Box::new(FraudCheck::default()));

    let catalog = SurfaceCatalog::new()
        .with::<dyn OrderService>()?
        .with::<dyn Auditable>()?;

    let config = ChainConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let chain = config
        .build_chain(&registry, &catalog)
        .context("building interceptor chain")?;
    tracing::info!(interceptors = ?chain.names(), "Chain ready");

    let service = Arc::new(InMemoryOrders::default());
    let component = Component::builder("InMemoryOrders")
        .expose::<dyn OrderService>(service.clone())
        .extends("AuditedService")
        .expose::<dyn Auditable>(service)
        .build();
    let component = chain.plugin_all(component)?;

    let orders = component
        .surface::<dyn OrderService>()
        .context("component does not present OrderService")?;

    let requests = [
        Order {
            id: 1,
            customer: "ada".into(),
            amount: 1_200,
        },
        Order {
            id: 2,
            customer: "grace".into(),
            amount: 9_000,
        },
        Order {
            id: 3,
            customer: "linus".into(),
            amount: -5,
        },
    ];
    for order in requests {
        let (id, customer) = (order.id, order.customer.clone());
        match orders.charge(order) {
            Ok(receipt) => println!(
                "order {} ({customer}): charged {}",
                receipt.order_id, receipt.charged
            ),
            Err(e) => println!("order {id} ({customer}): {e}"),
        }
    }

    match orders.refund(1, 200) {
        Ok(balance) => println!("order 1: refunded 200, balance {balance}"),
        Err(e) => println!("order 1: refund failed: {e}"),
    }
    println!("order 1 balance: {:?}", orders.balance(1));

    if let Some(audited) = component.surface::<dyn Auditable>() {
        println!("audit id: {}", audited.audit_id());
    }

    metrics.report();
    for (operation, stats) in metrics.snapshot() {
        println!(
            "{operation}: {} calls, avg {:?}",
            stats.calls,
            stats.average()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["interpose-demo", "--config", "chain.yaml", "-vv"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("chain.yaml"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_fraud_check_declines_large_orders() {
        let orders: Arc<dyn OrderService> = Arc::new(InMemoryOrders::default());
        let orders = interpose::Plugin::wrap_surface(orders, Arc::new(FraudCheck::default()))
            .unwrap();

        let declined = orders.charge(Order {
            id: 9,
            customer: "eve".into(),
            amount: 50_000,
        });
        assert!(matches!(
            declined,
            Err(crate::orders::PaymentError::Declined(_))
        ));
        assert_eq!(orders.balance(9), None);
    }
}
