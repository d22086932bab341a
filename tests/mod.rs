//! Integration tests for the music bot
//! Playback is driven through in-memory fakes; Spotify runs against a local wiremock server.


pub use assert_matches::assert_matches;
pub use pretty_assertions::assert_eq;
pub use rstest::rstest;
pub use wiremock::{Mock, MockServer, ResponseTemplate};

pub mod test_utils {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    /// Routes crate logs into the test harness output, once per test binary.
    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("rusty_music=debug"))
                .with_test_writer()
                .try_init();
        });
    }
}
