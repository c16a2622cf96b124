use clap::{Arg, ArgMatches, Command};
use composer_tools::compose::{FileComposeStore, TargetId};
use composer_tools::config::{Settings, SharedConfig};
use composer_tools::quote_remover::QuoteRemover;
use composer_tools::recipient_watch;
use composer_tools::signature::Direction;
use composer_tools::signature_switch::SignatureSwitch;
use log::LevelFilter;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let target_arg = Arg::new("target")
        .value_name("TARGET")
        .help("JSON file holding the composed message")
        .required(true);

    let matches = Command::new("composer-tools")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Removes nested quotes and switches signatures in composed messages")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file path")
                .default_value("composer-tools.yaml"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("reduce-quotes")
                .about("Remove quotes nested deeper than the allowed depth")
                .arg(target_arg.clone())
                .arg(
                    Arg::new("depth")
                        .long("depth")
                        .value_name("N")
                        .help("Maximum allowed quote depth (overrides the settings file)")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("signature")
                .about("Detect, insert, remove or rotate the signature")
                .arg(target_arg.clone())
                .arg(
                    Arg::new("action")
                        .value_name("ACTION")
                        .required(true)
                        .value_parser([
                            "detect", "insert", "remove", "toggle", "next", "previous", "auto",
                        ]),
                )
                .arg(
                    Arg::new("id")
                        .value_name("ID")
                        .help("Signature id for insert (default signature when omitted)"),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Auto-switch the signature while the recipients change")
                .arg(target_arg)
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_name("MS")
                        .help("Poll interval in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("1000"),
                ),
        )
        .subcommand(
            Command::new("generate-config")
                .about("Write an example settings file")
                .arg(Arg::new("file").value_name("FILE").required(true)),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(("generate-config", sub)) = matches.subcommand() {
        let path = sub.get_one::<String>("file").map(String::as_str).unwrap_or_default();
        generate_default_config(path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or_default();
    let settings = match load_config(config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&matches, settings).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches, mut settings: Settings) -> anyhow::Result<()> {
    let compose = Arc::new(FileComposeStore::new());

    match matches.subcommand() {
        Some(("reduce-quotes", sub)) => {
            if let Some(depth) = sub.get_one::<usize>("depth") {
                settings.max_allowed_quote_depth = *depth;
            }
            let remover = QuoteRemover::new(compose, Arc::new(SharedConfig::new(settings)));
            let changed = remover.remove_nested_quotes(&target(sub)).await?;
            println!("{}", if changed { "changed" } else { "unchanged" });
        }
        Some(("signature", sub)) => {
            let switch = SignatureSwitch::new(compose, Arc::new(SharedConfig::new(settings)));
            let target = target(sub);
            let action = sub
                .get_one::<String>("action")
                .map(String::as_str)
                .unwrap_or_default();

            let changed = match action {
                "detect" => {
                    match switch.current_signature(&target).await? {
                        Some(entry) => println!("{}", entry.id),
                        None => println!("none"),
                    }
                    return Ok(());
                }
                "insert" => match sub.get_one::<String>("id") {
                    Some(id) => switch.insert_signature(&target, id).await?,
                    None => switch.insert_default_signature(&target).await?,
                },
                "remove" => switch.remove_signature(&target).await?,
                "toggle" => switch.toggle(&target).await?,
                "next" => switch.rotate(&target, Direction::Next).await?,
                "previous" => switch.rotate(&target, Direction::Previous).await?,
                "auto" => switch.auto_switch(&target).await?,
                other => anyhow::bail!("unknown signature action '{}'", other),
            };
            println!("{}", if changed { "changed" } else { "unchanged" });
        }
        Some(("watch", sub)) => {
            let interval = sub.get_one::<u64>("interval-ms").copied().unwrap_or(1000);
            let switch = SignatureSwitch::new(compose, Arc::new(SharedConfig::new(settings)));
            let target = target(sub);

            log::info!("Watching recipients of {}", target);
            let switches =
                recipient_watch::watch_recipients(switch, target, Duration::from_millis(interval))
                    .await;
            log::info!("Target closed after {} signature switches", switches);
        }
        _ => anyhow::bail!("no command given"),
    }

    Ok(())
}

fn target(matches: &ArgMatches) -> TargetId {
    TargetId(matches.get_one::<String>("target").cloned().unwrap_or_default())
}

fn load_config(path: &str) -> anyhow::Result<Settings> {
    if std::path::Path::new(path).exists() {
        Settings::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default settings");
        Ok(Settings::default())
    }
}

fn generate_default_config(path: &str) {
    match Settings::example().to_file(path) {
        Ok(()) => {
            println!("Example settings written to: {path}");
            println!("Please edit the signatures to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
