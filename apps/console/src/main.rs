use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use shared::domain::TabIndex;
use tab_sync::{
    connect_push_channel, EventHub, RenderMode, SessionDeps, TabSession, TabSyncConfig,
    ToastQueue, UiAction,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8090")]
    server_url: String,
    /// Restart the tab at this index once the config is loaded.
    #[arg(long)]
    restart: Option<usize>,
    #[arg(long, default_value_t = 10)]
    watch_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let config = TabSyncConfig::new(&args.server_url)?;
    let hub = EventHub::new();
    let pump = match connect_push_channel(&config.ws_url(), Arc::clone(&hub)).await {
        Ok(pump) => Some(pump),
        Err(err) => {
            warn!(error = %err, "push channel unavailable; statuses will not update");
            None
        }
    };
    let toasts = Arc::new(ToastQueue::default());
    let session = TabSession::new(SessionDeps::http(config, hub, toasts.clone()));

    let mut mode = session.start().await;
    print_mode(&mode);
    if let RenderMode::Error { retry, .. } = mode {
        session.dispatch(retry).await;
        mode = session.render();
        print_mode(&mode);
    }

    let mut changes = session.store().subscribe_changes();
    let printer = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => println!(
                    "tab {}: {} -> {} ({:?})",
                    change.index, change.previous, change.current, change.source
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(index) = args.restart {
        let outcome = session.dispatch(UiAction::Restart(TabIndex(index))).await;
        println!("restart tab {index}: {outcome:?}");
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.watch_seconds);
    while tokio::time::Instant::now() < deadline {
        for toast in toasts.drain() {
            println!(
                "[{}] {}: {}",
                toast.raised_at.format("%H:%M:%S"),
                toast.caption,
                toast.detail
            );
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    print_mode(&session.render());
    session.teardown();
    printer.abort();
    if let Some(pump) = pump {
        pump.abort();
    }
    Ok(())
}

fn print_mode(mode: &RenderMode) {
    match mode {
        RenderMode::Loading => println!("loading tabs..."),
        RenderMode::Error {
            message,
            requires_reauth,
            ..
        } => {
            println!("failed to load tabs: {message}");
            if *requires_reauth {
                println!("sign in again and retry");
            }
        }
        RenderMode::Empty => println!("no tabs configured"),
        RenderMode::Populated(views) => {
            for view in views {
                let control = match view.restart {
                    Some(control) if control.enabled => "[restart]",
                    Some(_) => "[restart disabled]",
                    None => "",
                };
                println!(
                    "{:>2} {:<20} {:<10} {} {control}",
                    view.descriptor.index.0,
                    view.descriptor.label,
                    view.status,
                    view.descriptor.iframe_url
                );
            }
        }
    }
}
