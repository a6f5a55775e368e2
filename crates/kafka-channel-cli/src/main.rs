//! Kafka SASL Channel CLI
//!
//! Operator tool for the SASL channel builder: validates configuration,
//! previews principal mapping rules, and runs a listener that builds a
//! channel for every accepted connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kafka_channel_core::auth::kerberos::{resolve_default_realm, KerberosShortNamer};
use kafka_channel_core::config::{ChannelConfig, LoggingConfig};
use kafka_channel_core::network::SaslChannelBuilder;

/// Kafka SASL channel builder.
#[derive(Parser)]
#[command(name = "kafka-channel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate a configuration file.
    CheckConfig {
        /// Path to configuration file.
        config: String,
    },

    /// Map Kerberos principals to local names using the configured rules.
    ShortName {
        /// Path to configuration file.
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Principals to map.
        #[arg(required = true)]
        principals: Vec<String>,
    },

    /// Accept connections and build a channel for each.
    Listen {
        /// Path to configuration file.
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Override listen address.
        #[arg(long)]
        address: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::CheckConfig { config } => {
            setup_tracing(&log_config(&LoggingConfig::quiet(), args.verbose));
            check_config(&config)
        }
        Command::ShortName { config, principals } => {
            setup_tracing(&log_config(&LoggingConfig::quiet(), args.verbose));
            short_names(&config, &principals)
        }
        Command::Listen { config, address } => {
            let mut config = load(&config)?;
            if let Some(address) = address {
                config.listen.address = address;
            }
            setup_tracing(&log_config(&config.logging, args.verbose));

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async move { listen(config).await })
        }
    }
}

fn load(path: &str) -> anyhow::Result<ChannelConfig> {
    ChannelConfig::from_file(path).with_context(|| format!("invalid configuration '{path}'"))
}

/// Override the configured log level from the verbosity flag.
fn log_config(base: &LoggingConfig, verbose: u8) -> LoggingConfig {
    match verbose {
        0 => base.clone(),
        1 => LoggingConfig {
            level: "debug".to_string(),
            ..base.clone()
        },
        _ => LoggingConfig {
            level: "trace".to_string(),
            ..base.clone()
        },
    }
}

fn setup_tracing(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn compile_rules(config: &ChannelConfig) -> anyhow::Result<KerberosShortNamer> {
    let kerberos = &config.sasl.kerberos;
    let realm = resolve_default_realm(kerberos).unwrap_or_else(|| {
        warn!("cannot determine default Kerberos realm, DEFAULT rules will not match");
        String::new()
    });
    KerberosShortNamer::from_unparsed_rules(&realm, kerberos.principal_to_local_rules.as_deref())
        .context("invalid principal_to_local_rules")
}

fn check_config(path: &str) -> anyhow::Result<()> {
    let config = load(path)?;
    let namer = compile_rules(&config)?;

    let mechanisms: Vec<&str> = config
        .mechanisms()
        .iter()
        .map(|m| m.mechanism_name())
        .collect();

    println!("configuration OK: {path}");
    println!("  security_protocol: {:?}", config.security_protocol);
    println!("  mode:              {:?}", config.mode);
    println!("  mechanisms:        {}", mechanisms.join(", "));
    println!(
        "  principal:         {}",
        config.sasl.kerberos.principal().as_deref().unwrap_or("<none>")
    );
    println!(
        "  default realm:     {}",
        if namer.default_realm().is_empty() {
            "<unknown>"
        } else {
            namer.default_realm()
        }
    );
    if namer.is_identity() {
        println!("  principal mapping: identity");
    } else {
        println!("  principal mapping: {} rules", namer.rule_count());
    }
    Ok(())
}

fn short_names(path: &str, principals: &[String]) -> anyhow::Result<()> {
    let config = load(path)?;
    let namer = compile_rules(&config)?;

    let mut failed = 0usize;
    for principal in principals {
        match namer.short_name(principal) {
            Ok(short) => println!("{principal} -> {short}"),
            Err(e) => {
                failed += 1;
                println!("{principal} -> error: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} principals could not be mapped", principals.len());
    }
    Ok(())
}

async fn listen(config: ChannelConfig) -> anyhow::Result<()> {
    let address = config.listen.address.clone();
    let max_receive_size = config.listen.max_receive_size;

    let builder = Arc::new(SaslChannelBuilder::new(config.mode, config.security_protocol));
    builder.configure(config)?;

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %address,
        mode = ?builder.mode(),
        protocol = ?builder.security_protocol(),
        "listening for connections"
    );

    let connections = AtomicU64::new(0);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received, closing channel builder");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let seq = connections.fetch_add(1, Ordering::Relaxed);
                let id = format!("{address}-{peer}-{seq}");
                let stream = match stream.into_std() {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(id = %id, error = %e, "failed to detach socket from runtime");
                        continue;
                    }
                };

                let builder = Arc::clone(&builder);
                tokio::task::spawn_blocking(move || {
                    match builder.build_channel(&id, stream, max_receive_size) {
                        Ok(mut channel) => {
                            info!(
                                id = %id,
                                encrypted = channel.transport().is_encrypted(),
                                role = ?channel.authenticator().role(),
                                "built channel"
                            );
                            // No event loop drives the handshake here
                            if let Err(e) = channel.close() {
                                warn!(id = %id, error = %e, "failed to close channel");
                            }
                        }
                        Err(e) => warn!(id = %id, error = %e, "channel construction failed"),
                    }
                });
            }
        }
    }

    builder.close();
    info!(connections = connections.load(Ordering::Relaxed), "listener shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
