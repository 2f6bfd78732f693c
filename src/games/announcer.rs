use crate::games::types::BingoCall;
use tracing::info;

/// Receives every called number as it is drawn
pub trait CallAnnouncer: Send + Sync {
    fn announce(&self, round_id: &str, call: &BingoCall);
}

/// Silent announcer for rounds without audio
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnnouncer;

impl CallAnnouncer for NoopAnnouncer {
    fn announce(&self, _round_id: &str, _call: &BingoCall) {}
}

/// Logs each call with the clip a player would hear
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnnouncer;

impl CallAnnouncer for TracingAnnouncer {
    fn announce(&self, round_id: &str, call: &BingoCall) {
        info!("📣 Round {}: {} ({})", round_id, call.full_call, call.audio_file);
    }
}
