use std::env;

use crate::availability::DEFAULT_BUFFER_MINUTES;
use crate::error::{invalid_input_error, Error};

pub const BUFFER_MINUTES_VAR: &str = "VECTURA_BUFFER_MINUTES";

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub buffer_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_minutes: DEFAULT_BUFFER_MINUTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        match env::var(BUFFER_MINUTES_VAR) {
            Ok(value) => {
                config.buffer_minutes = value.parse().map_err(|_| invalid_input_error())?;
            }
            Err(env::VarError::NotPresent) => {}
            Err(err) => return Err(err.into()),
        }

        Ok(config)
    }
}

#[test]
fn test_default_buffer() {
    assert_eq!(Config::default().buffer_minutes, 60);
}

#[test]
fn test_from_env_override() {
    env::set_var(BUFFER_MINUTES_VAR, "90");
    assert_eq!(Config::from_env().unwrap().buffer_minutes, 90);

    env::set_var(BUFFER_MINUTES_VAR, "soon");
    assert!(Config::from_env().is_err());

    env::remove_var(BUFFER_MINUTES_VAR);
    assert_eq!(Config::from_env().unwrap().buffer_minutes, 60);
}
