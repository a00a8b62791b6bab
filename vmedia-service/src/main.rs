// SPDX-License-Identifier: GPL-3.0-only

//! virtual-media - D-Bus daemon exposing remote disk images as USB mass
//! storage through the NBD stack.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use vmedia_service::{App, Platform};
use vmedia_types::{config, Configuration};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vmedia_service=info,vmedia_sys=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "Starting virtual media service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Gadget configuration and CIFS mounts need root.
    if unsafe { libc::geteuid() } != 0 {
        tracing::error!("virtual media service must run as root");
        anyhow::bail!("service must run with root privileges");
    }

    let config = Configuration::load(config::DEFAULT_PATH)?;
    let _app = App::start(config, Platform::system()).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");

    Ok(())
}
