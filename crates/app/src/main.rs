//! Vitrine CLI

use std::{io, process, sync::Arc};

use tokio::sync::{mpsc::UnboundedReceiver, watch};
use tracing::info;
use vitrine::channel::Channel;
use vitrine_app::{
    clock::SystemClock,
    config::{Cli, Command, PricesArgs, ServeArgs},
    context::AppContext,
    domain::payments::{ChannelPaidEventSink, ChargeOutbox, OrderPaid},
    fixtures::StoreFixture,
    listing, observability, shutdown,
};

#[tokio::main]
pub async fn main() {
    let cli = match Cli::load() {
        Ok(cli) => cli,
        Err(error) => error.exit(),
    };

    if let Err(error) = run(cli).await {
        eprintln!("{error}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    observability::init(&cli.logging)
        .map_err(|error| format!("failed to initialise logging: {error}"))?;

    let (sink, paid) = ChannelPaidEventSink::new();
    let ctx = AppContext::in_memory(
        Arc::new(SystemClock),
        cli.checkout.settings(),
        Arc::new(ChargeOutbox::new()),
        Arc::new(sink),
    );

    if let Some(path) = &cli.store_fixture {
        StoreFixture::load(path)
            .map_err(|error| format!("failed to load {}: {error}", path.display()))?
            .seed(&ctx)
            .await
            .map_err(|error| format!("failed to seed the store: {error}"))?;
    }

    match cli.command {
        Command::Serve(args) => serve(&ctx, args, paid).await,
        Command::Prices(args) => prices(&ctx, args).await,
    }
}

async fn serve(
    ctx: &AppContext,
    args: ServeArgs,
    paid: UnboundedReceiver<OrderPaid>,
) -> Result<(), String> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ctx.sweeper(args.sweeper.sweep_batch_size);
    let interval = args.sweeper.interval();

    let sweeping = tokio::spawn(async move { sweeper.run(interval, shutdown_rx).await });
    let consumer = tokio::spawn(log_paid_orders(paid));

    info!("vitrine serving, press Ctrl+C to stop");

    shutdown::listen(shutdown_tx)
        .await
        .map_err(|error| format!("failed to listen for shutdown: {error}"))?;

    sweeping
        .await
        .map_err(|error| format!("expiry sweeper failed: {error}"))?;
    consumer.abort();

    info!("vitrine stopped");

    Ok(())
}

async fn log_paid_orders(mut paid: UnboundedReceiver<OrderPaid>) {
    while let Some(event) = paid.recv().await {
        info!(
            reference = %event.reference,
            customer_uuid = %event.customer,
            amount_paid = event.amount_paid,
            channel = %event.channel,
            "order paid"
        );
    }
}

async fn prices(ctx: &AppContext, args: PricesArgs) -> Result<(), String> {
    let channel = Channel::from(args.channel);

    let entries = match args.at {
        Some(at) => ctx.pricing.list_at(channel, at).await,
        None => ctx.pricing.list(channel).await,
    }
    .map_err(|error| format!("failed to list {channel} prices: {error}"))?;

    listing::write_listing(&mut io::stdout().lock(), &entries)
        .map_err(|error| format!("failed to write the listing: {error}"))
}
