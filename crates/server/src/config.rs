use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub upload_dir: String,
    pub max_upload_bytes: u64,
    pub session_ttl_hours: i64,
    /// Where the browser is sent after an OAuth sign-in completes.
    pub app_url: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    /// Hosted file service API base, used to delete files it stores.
    pub file_service_url: String,
    pub file_service_secret: String,
    pub whiteboard_save_debounce_ms: u64,
    pub chat_poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            database_path: "./tabletop.db".into(),
            upload_dir: "./uploads".into(),
            max_upload_bytes: 104_857_600, // 100MB
            session_ttl_hours: 4,
            app_url: "http://localhost:3000".into(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_uri: "http://localhost:3001/api/auth/google/callback".into(),
            file_service_url: "https://uploadthing.com/api".into(),
            file_service_secret: String::new(),
            whiteboard_save_debounce_ms: 1000,
            chat_poll_interval_secs: tabletop_shared::constants::CHAT_POLL_INTERVAL_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT").unwrap_or(defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
            session_ttl_hours: parse_var("SESSION_TTL_HOURS")
                .filter(|h: &i64| *h > 0)
                .unwrap_or(defaults.session_ttl_hours),
            app_url: env::var("APP_URL").unwrap_or(defaults.app_url),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                .unwrap_or(defaults.google_redirect_uri),
            file_service_url: env::var("FILE_SERVICE_URL").unwrap_or(defaults.file_service_url),
            file_service_secret: env::var("FILE_SERVICE_SECRET").unwrap_or_default(),
            whiteboard_save_debounce_ms: parse_var("WHITEBOARD_SAVE_DEBOUNCE_MS")
                .unwrap_or(defaults.whiteboard_save_debounce_ms),
            chat_poll_interval_secs: parse_var("CHAT_POLL_INTERVAL_SECS")
                .unwrap_or(defaults.chat_poll_interval_secs),
        }
    }

    pub fn google_enabled(&self) -> bool {
        !self.google_client_id.is_empty() && !self.google_client_secret.is_empty()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
