use tracing::info;
use tracing_subscriber;

use clap::{value_t, App, Arg};

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

    let matches = App::new("auctioneer-pair")
        .version("0.1")
        .about("Runs both auction replicas in one process")
        .arg(
            Arg::with_name("first-ip")
                .long("first-ip")
                .value_name("IP")
                .default_value("127.0.0.1:5000"),
        )
        .arg(
            Arg::with_name("second-ip")
                .long("second-ip")
                .value_name("IP")
                .default_value("127.0.0.1:5001"),
        )
        .arg(Arg::with_name("items").long("items").value_name("ITEMS_FILE").takes_value(true))
        .arg(
            Arg::with_name("interval-ms")
                .long("interval-ms")
                .value_name("MILLISECONDS")
                .default_value("2000"),
        )
        .arg(Arg::with_name("max-rounds").long("max-rounds").value_name("M").default_value("2"))
        .get_matches();

    let first_ip = value_t!(matches.value_of("first-ip"), String).unwrap_or_else(|e| e.exit());
    let second_ip = value_t!(matches.value_of("second-ip"), String).unwrap_or_else(|e| e.exit());
    let interval_ms = value_t!(matches.value_of("interval-ms"), u64).unwrap_or_else(|e| e.exit());
    let max_rounds = value_t!(matches.value_of("max-rounds"), u32).unwrap_or_else(|e| e.exit());
    let items_file = matches.value_of("items").map(String::from);

    let replicas: Vec<Settings> = vec![(&first_ip, &second_ip), (&second_ip, &first_ip)]
        .into_iter()
        .map(|(listener_ip, peer_ip)| {
            let mut settings = Settings::pair(listener_ip, peer_ip);
            settings.items_file = items_file.clone();
            settings.timeout_interval_ms = interval_ms;
            settings.max_rounds = max_rounds;
            settings
        })
        .collect();

    let sys = actix::System::new();
    sys.block_on(async move {
        for settings in replicas.into_iter() {
            node::run(settings).unwrap_or_else(|err| {
                eprintln!("{}", err);
                std::process::exit(1)
            });
        }

        tokio::signal::ctrl_c().await.unwrap();
        info!(target: "auctioneer", "Got Ctrl+C, stopping...");

        actix::System::current().stop();
    });
    sys.run().unwrap();

    Ok(())
}
