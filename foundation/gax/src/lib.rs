//! # gconnector-gax
//!
//! Call plumbing shared by the connector crates: HTTP status classification,
//! a cancellable fixed-delay retry loop and concurrent fan-out.
pub mod cancel;
pub mod fanout;
pub mod retry;
pub mod status;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
