use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND '{}'", other),
        }
    }
}

/// How battle creation treats a team id that does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamResolution {
    /// Refuse to create the battle.
    Strict,
    /// Log and keep the team id on the battle so it can resolve at move time.
    Lenient,
}

impl FromStr for TeamResolution {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => anyhow::bail!("Unknown TEAM_RESOLUTION '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Storage
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub seed_demo_roster: bool,

    // Redis
    pub redis_url: Option<String>,

    // Matchmaking
    pub team_resolution: TeamResolution,
    pub waiting_room_ttl_secs: u64,
    pub room_sweep_interval_secs: u64,
    pub room_wait_timeout_secs: u64,
    pub room_recheck_interval_secs: u64,
    pub join_rate_limit_per_minute: u32,

    // CORS
    pub cors_allowed_origins: String,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| {
            let normalized = v.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
        })
        .unwrap_or(false)
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            store_backend: env::var("STORE_BACKEND")
                .unwrap_or_else(|_| "postgres".to_string())
                .parse()?,
            database_url: env_non_empty("DATABASE_URL"),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            seed_demo_roster: env_flag("SEED_DEMO_ROSTER"),

            redis_url: env_non_empty("REDIS_URL"),

            team_resolution: env::var("TEAM_RESOLUTION")
                .unwrap_or_else(|_| "lenient".to_string())
                .parse()?,
            waiting_room_ttl_secs: env::var("WAITING_ROOM_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()?,
            room_sweep_interval_secs: env::var("ROOM_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            room_wait_timeout_secs: env::var("ROOM_WAIT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "25".to_string())
                .parse()?,
            room_recheck_interval_secs: env::var("ROOM_RECHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            join_rate_limit_per_minute: env::var("JOIN_RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }
        if self.room_wait_timeout_secs == 0 {
            anyhow::bail!("ROOM_WAIT_TIMEOUT_SECS must be > 0");
        }
        if self.room_recheck_interval_secs == 0 {
            anyhow::bail!("ROOM_RECHECK_INTERVAL_SECS must be > 0");
        }
        if self.room_sweep_interval_secs == 0 {
            anyhow::bail!("ROOM_SWEEP_INTERVAL_SECS must be > 0");
        }

        if self.waiting_room_ttl_secs == 0 {
            tracing::warn!("WAITING_ROOM_TTL_SECS is 0; abandoned waiting rooms are never reclaimed");
        }
        if self.join_rate_limit_per_minute == 0 {
            tracing::warn!("JOIN_RATE_LIMIT_PER_MINUTE is 0; join rate limiting disabled");
        }
        if self.redis_url.is_none() {
            tracing::warn!("REDIS_URL not set; join rate limiting disabled");
        }
        if self.seed_demo_roster && self.store_backend != StoreBackend::Memory {
            tracing::warn!("SEED_DEMO_ROSTER only applies to STORE_BACKEND=memory; ignoring");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "development".to_string(),
        store_backend: StoreBackend::Memory,
        database_url: None,
        database_max_connections: 1,
        seed_demo_roster: false,
        redis_url: None,
        team_resolution: TeamResolution::Lenient,
        waiting_room_ttl_secs: 900,
        room_sweep_interval_secs: 30,
        room_wait_timeout_secs: 5,
        room_recheck_interval_secs: 1,
        join_rate_limit_per_minute: 30,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_aliases() {
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!(" memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn team_resolution_parses() {
        assert_eq!("STRICT".parse::<TeamResolution>().unwrap(), TeamResolution::Strict);
        assert_eq!("lenient".parse::<TeamResolution>().unwrap(), TeamResolution::Lenient);
        assert!("loose".parse::<TeamResolution>().is_err());
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let mut config = test_config();
        config.store_backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());

        config.database_url = Some("postgres://localhost/arena".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_wait_timeout_is_rejected() {
        let mut config = test_config();
        config.room_wait_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
