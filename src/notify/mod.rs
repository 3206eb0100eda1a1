pub mod render;
pub mod sink;

pub use sink::{NotifySink, ResendSink, StdoutSink};

use crate::config::NotifyConfig;

/// Builds the configured notification sinks: stdout when enabled, email
/// when Resend credentials are present.
pub fn build_sinks(config: &NotifyConfig) -> Vec<Box<dyn NotifySink>> {
    let mut sinks: Vec<Box<dyn NotifySink>> = Vec::new();
    if config.enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }
    if !config.resend_api_key.trim().is_empty() && !config.to_email.trim().is_empty() {
        sinks.push(Box::new(ResendSink::new(
            config.resend_api_key.clone(),
            config.from_email.clone(),
            config.to_email.clone(),
        )));
    }
    sinks
}
