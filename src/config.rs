use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub frontend_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PORT", "4000"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            frontend_url: try_load("FRONTEND_URL", "http://localhost:5173"),
            jwt_secret: read_secret("JWT_SECRET"),
            bcrypt_cost: try_load("BCRYPT_COST", "12"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn read_secret(secret_name: &str) -> String {
    if let Ok(value) = env::var(secret_name) {
        return value;
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .expect("Secrets misconfigured!")
}
