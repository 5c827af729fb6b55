/// Application constants

// API version
pub const API_VERSION: &str = "v1";

// Team / beast shape
pub const MAX_TEAM_SIZE: usize = 3;
pub const MAX_MOVE_SLOTS: usize = 4;

// Damage formula
pub const DEFAULT_ATTACKER_POWER: i32 = 50;
pub const BASE_CRIT_CHANCE: f64 = 0.0625;
pub const CRIT_CHANCE_PER_POWER: f64 = 1.0 / 1000.0;
pub const CRIT_MULTIPLIER: f64 = 1.5;
pub const DAMAGE_VARIANCE_MIN: f64 = 0.85;
pub const DAMAGE_VARIANCE_MAX: f64 = 1.15;
pub const SUPER_EFFECTIVE: f64 = 2.0;
pub const NOT_VERY_EFFECTIVE: f64 = 0.5;
pub const NEUTRAL: f64 = 1.0;

// Battle
pub const FIRST_TURN: i32 = 1;

// Matchmaking
pub const SLUG_INSERT_ATTEMPTS: usize = 5;
pub const ROOM_FEED_CAPACITY: usize = 32;
pub const JOIN_RATE_LIMIT_WINDOW_SECS: u64 = 60;

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const WS_CLIENT_TIMEOUT_SECS: u64 = 60;
