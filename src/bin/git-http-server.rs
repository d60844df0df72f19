use clap::Parser;
use git_http_server::{cli, service, update};

use std::io;

fn init_trace() {
    use tracing_subscriber::Layer;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(false)
        .with_writer(io::stderr);

    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::EnvFilter::from_default_env(),
        _ => tracing_subscriber::EnvFilter::new("git_http_server=info,tower_http=info"),
    };

    let subscriber = filter
        .and_then(fmt_layer)
        .with_subscriber(tracing_subscriber::Registry::default());

    tracing::subscriber::set_global_default(subscriber).expect("can't set_global_default");
}

fn main() {
    let args = match cli::Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            use clap::error::ErrorKind;
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    print!("{}", e);
                    std::process::exit(0);
                }
                _ => {
                    eprint!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let exit_code = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async {
            init_trace();

            if args.updates {
                return match update::check().await {
                    Ok(status) => {
                        println!("{}", status.message());
                        if status.is_current() { 0 } else { 1 }
                    }
                    Err(e) => {
                        eprintln!("update check failed: {:#}", e);
                        1
                    }
                };
            }

            let config = match args.into_config() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{:#}", e);
                    return 1;
                }
            };

            match service::run(config).await {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("{:#}", e);
                    1
                }
            }
        });

    std::process::exit(exit_code);
}
