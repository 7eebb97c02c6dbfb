pub const APP_NAME: &str = "Tabletop";

// Campaign roles
pub const ROLE_GM: &str = "GM";
pub const ROLE_PLAYER: &str = "PLAYER";

// Account roles
pub const USER_ROLE_ADMIN: &str = "admin";
pub const USER_ROLE_USER: &str = "user";

pub const THEMES: [&str; 3] = ["light", "dark", "system"];
pub const DEFAULT_THEME: &str = "system";

// Limits
pub const MAX_CAMPAIGN_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;
pub const MAX_NOTE_TITLE_LENGTH: usize = 200;
pub const MAX_CHAT_MESSAGE_LENGTH: usize = 2000;
pub const MAX_FILE_NAME_LENGTH: usize = 255;
pub const MAX_BIO_LENGTH: usize = 1000;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const NOTE_SEARCH_LIMIT: i64 = 10;
pub const NOTE_PREVIEW_LENGTH: usize = 100;

// Dice
pub const DIE_SIZES: [u32; 7] = [4, 6, 8, 10, 12, 20, 100];
pub const MAX_DICE_PER_ROLL: u32 = 100;
pub const MAX_DICE_MODIFIER: i64 = 1000;

// Chat polling
pub const CHAT_POLL_INTERVAL_SECS: u64 = 5;
