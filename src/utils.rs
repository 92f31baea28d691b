use crate::error::PvWeatherError;
use chrono_tz::Tz;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "pvweather";

pub fn get_data_dir() -> io::Result<PathBuf> {
    dirs::cache_dir()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system cache directory",
            )
        })
        .map(|p| p.join(DATA_DIR_NAME))
}

pub async fn ensure_data_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Data path exists but is not a directory: {}", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating data directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

/// Parses an IANA timezone name such as `Europe/Berlin`.
pub fn parse_timezone(name: &str) -> Result<Tz, PvWeatherError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| PvWeatherError::InvalidTimezone(name.to_string()))
}
