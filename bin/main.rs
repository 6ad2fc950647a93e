use tracing::info;
use tracing_subscriber;

use clap::{App, Arg};

use auctioneer::server::{node, Settings};
use auctioneer::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("auctioneer")
        .version("0.1")
        .about("Runs one auction replica")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("CONFIG_FILE")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("listener-ip")
                .short("a")
                .long("listener-ip")
                .value_name("LISTENER_IP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("peer-ip")
                .short("p")
                .long("peer-ip")
                .value_name("PEER_IP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("max-connections")
                .long("max-connections")
                .value_name("MAX_CONNECTIONS")
                .takes_value(true),
        )
        .arg(Arg::with_name("items").long("items").value_name("ITEMS_FILE").takes_value(true))
        .arg(
            Arg::with_name("interval-ms")
                .long("interval-ms")
                .value_name("MILLISECONDS")
                .takes_value(true),
        )
        .arg(Arg::with_name("max-rounds").long("max-rounds").value_name("M").takes_value(true))
        .get_matches();

    let flags = [
        ("listener-ip", "listener_ip"),
        ("peer-ip", "peer_ip"),
        ("max-connections", "max_connections"),
        ("items", "items_file"),
        ("interval-ms", "timeout_interval_ms"),
        ("max-rounds", "max_rounds"),
    ];
    let overrides = flags
        .iter()
        .filter_map(|(flag, key)| matches.value_of(flag).map(|value| (*key, value.to_owned())))
        .collect();
    let settings = Settings::load(matches.value_of("config"), overrides)?;

    let sys = actix::System::new();
    sys.block_on(async move {
        node::run(settings).unwrap_or_else(|err| {
            eprintln!("{}", err);
            std::process::exit(1)
        });

        let sig = if cfg!(unix) {
            use futures::future::FutureExt;
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = signal(SignalKind::interrupt()).unwrap();
            let mut sigterm = signal(SignalKind::terminate()).unwrap();

            futures::select! {
                _ = sigint.recv().fuse() => "SIGINT",
                _ = sigterm.recv().fuse() => "SIGTERM"
            }
        } else {
            tokio::signal::ctrl_c().await.unwrap();
            "Ctrl+C"
        };
        info!(target: "auctioneer", "Got {}, stopping...", sig);

        actix::System::current().stop();
    });
    sys.run().unwrap();

    Ok(())
}
