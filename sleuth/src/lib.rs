//! Automatically compile documentation on how a data source is used.
//!
//! A survey queries academic literature and the open web for evidence of usage of a
//! [`DataSource`](source::DataSource), sorts that evidence into the four
//! [`Category`](collect::Category) sections, and renders a [`report`] meant to be refined by
//! humans before it is published through one of the [`docs`] targets.

use tracing_subscriber::{fmt, EnvFilter};

pub mod archive;
pub mod collect;
pub mod docs;
pub mod literature;
pub mod report;
pub mod source;
pub mod web;

mod http;
mod throttle;

#[cfg(test)]
mod testing;

/// Install a global `tracing` subscriber.
///
/// The filter is read from `RUST_LOG`, defaulting to `info`. Logs go to stderr so that reports
/// written to stdout stay clean. Calling this more than once is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
