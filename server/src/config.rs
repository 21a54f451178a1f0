//! Server configuration from the environment.
//!
//! Every knob has a default so the server starts with no environment at all:
//!
//! | Variable                  | Default          |
//! |---------------------------|------------------|
//! | `PORT`                    | `3000`           |
//! | `MEDIA_DIR`               | `./videos`       |
//! | `PLAY_LEAD_MS`            | `5000`           |
//! | `CLIENT_CHANNEL_CAPACITY` | `256`            |
//! | `DEFAULT_VIDEO`           | `video-vertical` |

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MEDIA_DIR: &str = "./videos";
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Root of the `<project>/<mediaType>/...` tree, also served under `/media`.
    pub media_dir: PathBuf,
    /// Lead added to `now` when a `play` arrives without a `targetTime`.
    pub play_lead_ms: i64,
    /// Outbound queue depth per connection. A full queue drops broadcasts.
    pub client_channel_capacity: usize,
    /// `video` sent with `play` when the commander names none.
    pub default_video: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            media_dir: PathBuf::from(DEFAULT_MEDIA_DIR),
            play_lead_ms: frames::DEFAULT_PLAY_DELAY_MS,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            default_video: frames::DEFAULT_VIDEO.to_owned(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("PORT", defaults.port),
            media_dir: std::env::var("MEDIA_DIR").map_or(defaults.media_dir, PathBuf::from),
            play_lead_ms: env_parse("PLAY_LEAD_MS", defaults.play_lead_ms).max(0),
            client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", defaults.client_channel_capacity).max(1),
            default_video: std::env::var("DEFAULT_VIDEO")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_video),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
