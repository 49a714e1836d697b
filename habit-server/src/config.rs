use std::env;

use habit_types::DEFAULT_ACTIVITY_LIMIT;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub activity_feed_limit: usize,
    pub connection_timeout_seconds: u64,
    pub change_bus_capacity: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            activity_feed_limit: env::var("ACTIVITY_FEED_LIMIT")
                .unwrap_or_else(|_| DEFAULT_ACTIVITY_LIMIT.to_string())
                .parse()
                .expect("Invalid ACTIVITY_FEED_LIMIT"),
            connection_timeout_seconds: env::var("CONNECTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid CONNECTION_TIMEOUT_SECONDS"),
            change_bus_capacity: env::var("CHANGE_BUS_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .expect("Invalid CHANGE_BUS_CAPACITY"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
