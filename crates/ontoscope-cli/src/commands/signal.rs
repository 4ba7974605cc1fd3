use anyhow::{Context, Result};
use ontoscope_core::CancelFlag;

/// First Ctrl+C stops the run between steps; a second one exits right away.
pub(super) fn cancel_on_interrupt(flag: CancelFlag) -> impl Fn() + Send + 'static {
    move || {
        if flag.is_cancelled() {
            std::process::exit(130);
        }
        tracing::warn!("received Ctrl+C; stopping after the current step");
        flag.cancel();
    }
}

pub(super) fn install_interrupt_handler(flag: CancelFlag) -> Result<()> {
    ctrlc::set_handler(cancel_on_interrupt(flag)).context("install Ctrl+C handler")
}
