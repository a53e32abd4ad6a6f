use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use url::Url;

use crate::{auth::AuthMethod, errors::Error, Result};

/// Typed configuration, resolved once at startup from the environment
/// (with optional `.env` file support). Anything invalid here is fatal
/// before any background task starts.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,

    // Feed
    pub feed_url: String,
    /// Scheme + host of the feed URL; the login page is resolved against
    /// this. Only derived (and required) for cookie auth.
    pub feed_origin: Option<String>,
    pub auth_method: AuthMethod,
    pub auth_user: Option<String>,
    pub auth_password: Option<String>,
    pub login_path: String,

    // On-demand page dump (/fetch)
    pub site_url: Option<String>,

    // Persistence
    pub state_file: PathBuf,

    // Timing
    pub check_interval: Duration,
    pub notification_delay: Duration,

    // Pipeline intake
    pub notification_queue_size: usize,

    // Transport limit, used by the adapter when truncating page dumps
    pub message_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let feed_url = env_str("FEED_URL").and_then(non_empty).ok_or_else(|| {
            Error::Config("FEED_URL environment variable is required".to_string())
        })?;

        let auth_user = env_str("FEED_AUTH_USER").and_then(non_empty);
        let auth_password = env_str("FEED_AUTH_PASSWORD").and_then(non_empty);

        let auth_method = match env_str("FEED_AUTH_METHOD").and_then(non_empty) {
            Some(raw) => AuthMethod::parse(&raw)?,
            // No explicit method: a full credential pair most likely means a
            // session-cookie login is expected; anything else stays basic.
            None => {
                if auth_user.is_some() && auth_password.is_some() {
                    AuthMethod::Cookie
                } else {
                    if auth_user.is_some() != auth_password.is_some() {
                        tracing::warn!(
                            "only one of FEED_AUTH_USER/FEED_AUTH_PASSWORD is set; using basic auth"
                        );
                    }
                    AuthMethod::Basic
                }
            }
        };

        let feed_origin = match auth_method {
            AuthMethod::Cookie => Some(origin_of(&feed_url)?),
            AuthMethod::Basic => None,
        };

        let login_path = env_str("FEED_LOGIN_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "/user/login".to_string());

        let site_url = env_str("SITE_URL").and_then(non_empty);

        let state_file =
            PathBuf::from(env_str("STATE_FILE").unwrap_or_else(|| "state.json".to_string()));

        let check_interval = Duration::from_secs(env_u64("CHECK_INTERVAL_SECS").unwrap_or(3600));
        let notification_delay =
            Duration::from_secs(env_u64("NOTIFICATION_DELAY_SECS").unwrap_or(900));
        let notification_queue_size = env_usize("NOTIFICATION_QUEUE_SIZE").unwrap_or(100).max(1);

        let message_limit = env_usize("MESSAGE_LIMIT").unwrap_or(4096);

        Ok(Self {
            telegram_bot_token,
            feed_url,
            feed_origin,
            auth_method,
            auth_user,
            auth_password,
            login_path,
            site_url,
            state_file,
            check_interval,
            notification_delay,
            notification_queue_size,
            message_limit,
        })
    }
}

/// Scheme + host (+ explicit port) of a URL, e.g. `https://news.example.org`.
fn origin_of(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("failed to parse FEED_URL {raw:?}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Config(format!("FEED_URL must include scheme and host: {raw:?}")))?;
    match parsed.port() {
        Some(port) => Ok(format!("{}://{}:{}", parsed.scheme(), host, port)),
        None => Ok(format!("{}://{}", parsed.scheme(), host)),
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_keeps_scheme_and_host_only() {
        assert_eq!(
            origin_of("https://news.example.org/feeds/all.xml?page=1").unwrap(),
            "https://news.example.org"
        );
    }

    #[test]
    fn origin_keeps_an_explicit_port() {
        assert_eq!(
            origin_of("http://127.0.0.1:8080/feed.xml").unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn origin_rejects_bare_paths() {
        assert!(origin_of("/feeds/all.xml").is_err());
    }
}
