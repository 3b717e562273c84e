//! Demo 1: Live Order Tracking
//!
//! Showcases: live feed, simulated fallback, ETA, progress bar, reconnects
//!
//! Run: cargo run --bin track_order -- <order_id> [lat] [lng]
//!
//! Set `COURIER_ENDPOINT` to point at a backend (default `ws://localhost:8000`).
//! Without a reachable backend the demo keeps moving on simulated positions.

use colored::*;
use courier_sdk::prelude::*;
use courier_types::StatusStep;
use std::time::Duration;

const RUN_FOR: Duration = Duration::from_secs(120);

fn progress_bar(percent: Option<f64>) -> String {
    match percent {
        Some(p) => {
            let filled = (p / 5.0).round().clamp(0.0, 20.0) as usize;
            format!("{}{} {:>5.1}%", "█".repeat(filled).green(), "░".repeat(20 - filled), p)
        }
        None => format!("{} {:>6}", "░".repeat(20), "--"),
    }
}

fn step_line(steps: &[StatusStep]) -> String {
    steps
        .iter()
        .map(|step| {
            let name = step.status.as_str();
            if step.current {
                name.cyan().bold().to_string()
            } else if step.done {
                name.green().to_string()
            } else {
                name.dimmed().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" → ")
}

fn quality_badge(quality: ConnectionQuality) -> ColoredString {
    match quality {
        ConnectionQuality::Live => "LIVE".green().bold(),
        ConnectionQuality::Simulated => "SIM".yellow().bold(),
        ConnectionQuality::Disconnected => "OFF".red().bold(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let order_id = args.next().unwrap_or_else(|| "demo-order".to_string());
    let lat = args.next().and_then(|s| s.parse().ok()).unwrap_or(19.1136);
    let lng = args.next().and_then(|s| s.parse().ok()).unwrap_or(72.8697);
    let endpoint =
        std::env::var("COURIER_ENDPOINT").unwrap_or_else(|_| Endpoint::LOCAL.to_string());

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  LIVE ORDER TRACKING".cyan().bold());
    println!("{}", "  Courier SDK Demo - Live Feed with Simulated Fallback".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();
    println!("  Order:       {}", order_id.cyan());
    println!("  Endpoint:    {}", endpoint.cyan());
    println!("  Destination: {}", GeoPoint::new(lat, lng).to_string().cyan());
    println!();

    let mut client = TrackingClient::builder(endpoint)
        .with_simulator_interval(Duration::from_secs(1))
        .build()?;

    let order = Order::new(order_id.clone(), vec![])
        .with_status(OrderStatus::OutForDelivery)
        .with_destination(GeoPoint::new(lat, lng));

    let _sub = client.subscribe(&order_id, |s| {
        let eta = s
            .eta_minutes
            .map(|m| format!("{} min", m))
            .unwrap_or_else(|| "--".into());
        println!(
            "  {} {:<5} {} {:<18} ETA {}",
            format!("[{}]", chrono::Local::now().format("%H:%M:%S")).dimmed(),
            quality_badge(s.connection_quality),
            progress_bar(s.progress_percent),
            s.status.to_string().white(),
            eta.cyan()
        );
    });

    let mut events = client.events().ok_or("events already taken")?;
    let handle = client.track(&order);

    let deadline = tokio::time::sleep(RUN_FOR);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                Event::Connection(ConnectionEvent::Connected { is_reconnection, .. }) => {
                    let msg = if is_reconnection { "Live feed resumed" } else { "Live feed connected" };
                    println!("  {} {}", "●".green(), msg.green());
                }
                Event::Connection(ConnectionEvent::FallbackStarted { reason, .. }) => {
                    println!("  {} Simulating positions ({})", "●".yellow(), reason.dimmed());
                }
                Event::Connection(ConnectionEvent::Reconnecting { attempt, delay, .. }) => {
                    println!(
                        "  {} Reconnect attempt {} in {:.1}s",
                        "↻".blue(),
                        attempt,
                        delay.as_secs_f64()
                    );
                }
                Event::Session(SessionEvent::StatusChanged { from, to, .. }) => {
                    println!("  {} {} → {}", "★".magenta(), from, to.to_string().bold());
                }
                Event::Connection(ConnectionEvent::Closed { .. }) => break,
                _ => {}
            },
            _ = &mut deadline => {
                println!();
                println!("  {} Demo time limit reached", "Note:".dimmed());
                break;
            }
        }
    }

    let last = handle.snapshot();
    client.shutdown();

    println!();
    println!("{}", "  FINAL STATE".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  Status:   {}", last.status.to_string().cyan());
    println!("  Steps:    {}", step_line(&last.steps()));
    println!("  Progress: {}", progress_bar(last.progress_percent));
    println!("  Revision: {}", last.revision);

    Ok(())
}
