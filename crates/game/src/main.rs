mod app;

use tracing::{error, info};

fn main() {
    app::bootstrap::init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "=== Dwarfhold Startup ===");

    if let Err(err) = app::run() {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}
