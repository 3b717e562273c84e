//! Demo 2: Order Lifecycle
//!
//! Showcases: placing an order, status transitions, lifecycle validation,
//! simulated delivery and terminal notifications
//!
//! Run: cargo run --bin order_lifecycle
//!
//! Uses an in-process order store, so no backend is needed. The tracking
//! feed points at an unused local port and every order runs on simulation.

use colored::*;
use courier_sdk::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

const STEP_PAUSE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  ORDER LIFECYCLE".cyan().bold());
    println!("{}", "  Courier SDK Demo - Status Transitions and Simulation".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let api = Arc::new(InMemoryOrderApi::new());
    let client = TrackingClient::builder("ws://127.0.0.1:9")
        .with_order_api(api.clone())
        .with_simulator_interval(Duration::from_millis(500))
        .with_route_steps(12)
        .without_reconnect()
        .build()?;

    // Place an order
    let order = client
        .create_order(
            vec![
                OrderItem::new("rice-5", "Basmati Rice 5kg", 2, dec!(540)),
                OrderItem::new("oil-1", "Groundnut Oil 1L", 3, dec!(185)),
            ],
            DeliveryAddress {
                line: "14 Linking Road, Khar West".into(),
                location: Some(GeoPoint::new(19.0714, 72.8347)),
            },
        )
        .await?;

    println!("{}", "  ORDER PLACED".white().bold());
    println!("  {}", "─".repeat(50));
    for item in &order.items {
        println!(
            "  {:<22} x{:<3} {:>10}",
            item.product_name,
            item.quantity,
            format!("₹{}", item.total).cyan()
        );
    }
    println!("  {:<26} {:>10}", "Total".bold(), format!("₹{}", order.total_amount).green());
    println!();

    let _sub = client.subscribe(&order.id, |s| {
        if s.connection_quality == ConnectionQuality::Simulated {
            println!(
                "  {} {:>5.1}%  eta {:>2} min  {}",
                "●".yellow(),
                s.progress_percent.unwrap_or(0.0),
                s.eta_minutes.unwrap_or(0),
                s.current_position
                    .map(|p| p.to_string())
                    .unwrap_or_default()
                    .dimmed()
            );
        }
    });
    let handle = client.track(&order);

    println!("{}", "  STATUS TRANSITIONS".white().bold());
    println!("  {}", "─".repeat(50));

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Packed,
        OrderStatus::OutForDelivery,
    ] {
        tokio::time::sleep(STEP_PAUSE).await;
        match client.update_status(&order.id, next).await {
            Ok(Some(change)) => println!("  {} {} → {}", "★".magenta(), change.from, change.to.to_string().bold()),
            Ok(None) => println!("  {} {} (backend only)", "★".magenta(), next),
            Err(e) => println!("  {} {}", "✗".red(), e),
        }
    }

    // Going backwards is refused before the backend sees it
    match client.update_status(&order.id, OrderStatus::Placed).await {
        Err(e) => println!("  {} {}", "✗".red(), e.to_string().red()),
        Ok(_) => println!("  {} backwards transition was accepted", "!".red()),
    }

    tokio::time::sleep(STEP_PAUSE * 2).await;
    client.update_status(&order.id, OrderStatus::Delivered).await?;
    handle.closed().await;

    let last = handle.snapshot();
    let stored = api.get(&order.id).map(|o| o.status);

    println!();
    println!("{}", "  FINAL STATE".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  Session status: {}", last.status.to_string().green());
    println!("  Backend status: {}", stored.map(|s| s.to_string()).unwrap_or_default().green());
    println!("  Progress:       {:.0}%", last.progress_percent.unwrap_or(0.0));
    println!("  Revisions:      {}", last.revision);
    println!();
    println!("  {} Delivered orders are closed; late feed messages are ignored", "Note:".dimmed());

    Ok(())
}
