//! tewn - chromatic CLI tuner

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use tewn::audio::CpalBackend;
use tewn::cli::{self, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<ExitCode> {
    let _cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tewn=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("tewn v{}", env!("CARGO_PKG_VERSION"));

    let backend = CpalBackend::new();
    tracing::debug!("Input devices: {:?}", backend.list_devices());

    let stdout = std::io::stdout();
    let color = stdout.is_terminal();
    let code = cli::run(
        backend,
        &mut stdout.lock(),
        &mut std::io::stderr().lock(),
        color,
    )?;

    Ok(ExitCode::from(code))
}
