//! Collector failure reports, posted to the operator channel.

use std::sync::Arc;

use serenity::model::id::ChannelId;
use tally_collector::HandlerFailure;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Discord rejects messages over 2000 characters.
const REPORT_MAX: usize = 1900;

pub fn format_failure(failure: &HandlerFailure) -> String {
    let mut error = failure.error.clone();
    if error.len() > REPORT_MAX {
        let mut cut = REPORT_MAX;
        while !error.is_char_boundary(cut) {
            cut -= 1;
        }
        error.truncate(cut);
        error.push('\u{2026}');
    }
    format!(
        "\u{26a0}\u{fe0f} Collector on message `{}` failed during {}:\n```\n{}\n```",
        failure.message_id,
        failure.phase.as_str(),
        error
    )
}

/// Drain failures for the lifetime of the process.
///
/// Spawned once in `adapter.rs`. `Arc<Http>` is a REST client, so it stays
/// valid across gateway reconnects. Without a channel failures are only logged
/// (the engine already logged them once).
pub async fn run_failure_reporter(
    http: Arc<serenity::http::Http>,
    channel_id: Option<u64>,
    mut rx: mpsc::UnboundedReceiver<HandlerFailure>,
) {
    while let Some(failure) = rx.recv().await {
        let Some(channel_id) = channel_id else {
            continue;
        };
        let text = format_failure(&failure);
        if let Err(e) = ChannelId::new(channel_id).say(&http, &text).await {
            warn!(
                message_id = %failure.message_id,
                channel_id,
                error = %e,
                "failure report could not be delivered"
            );
        }
    }

    info!("failure reporter exiting (channel closed)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_collector::Phase;
    use tally_core::MessageId;

    #[test]
    fn report_names_message_and_phase() {
        let failure = HandlerFailure {
            message_id: MessageId(77),
            phase: Phase::Finalize,
            error: "edit prompt: Missing Access".into(),
        };
        let text = format_failure(&failure);
        assert!(text.contains("`77`"));
        assert!(text.contains("during finalize"));
        assert!(text.contains("Missing Access"));
    }

    #[test]
    fn long_errors_are_truncated() {
        let failure = HandlerFailure {
            message_id: MessageId(1),
            phase: Phase::Collect,
            error: "\u{e9}".repeat(3000),
        };
        assert!(format_failure(&failure).len() < 2000);
    }
}
