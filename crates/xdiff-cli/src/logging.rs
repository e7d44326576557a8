//! Tracing setup: `RUST_LOG` honored as usual, `-v`/`-vv` raise the default
//! filter when the env var is unset. Mirrors the teacher's debug-flag
//! handling in `sherpack_cli::main`, generalized to a real subscriber since
//! this crate's pipeline emits spans per stage (§[AMBIENT] Logging).

use tracing_subscriber::EnvFilter;

pub fn init(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "xdiff=info",
        1 => "xdiff=debug",
        _ => "xdiff=trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
