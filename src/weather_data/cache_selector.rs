use crate::weather_data::error::WeatherDataError;
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Marker of post-processed output files that share the cache directory.
const YIELD_MARKER: &str = "_yield";

/// Encodes an instant as the `YYYYMMDDHH` integer used in cache file names.
pub fn encode_issue(time: &DateTime<Utc>) -> i64 {
    // an all-digit, fixed-width format always parses
    time.format("%Y%m%d%H").to_string().parse().unwrap_or_default()
}

/// Finds the `KEY_<YYYYMMDDHH>.csv` file in `dir` whose embedded timestamp is
/// numerically closest to `target`.
///
/// Ties resolve to the earlier issue timestamp.
///
/// # Errors
///
/// [`WeatherDataError::CacheDirRead`] if `dir` cannot be listed,
/// [`WeatherDataError::CacheNotFound`] if it holds no candidate.
pub async fn select_nearest_cache(
    dir: &Path,
    key: &str,
    target: &DateTime<Utc>,
) -> Result<PathBuf, WeatherDataError> {
    let reference = encode_issue(target);
    let prefix = format!("{key}_");

    let mut read_dir = fs::read_dir(dir).await.map_err(|e| {
        error!("Unable to read forecast cache directory {:?}", dir);
        WeatherDataError::CacheDirRead(dir.to_path_buf(), e)
    })?;

    let mut candidates: Vec<(i64, PathBuf)> = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| WeatherDataError::CacheDirRead(dir.to_path_buf(), e))?
    {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.contains(YIELD_MARKER) {
            continue;
        }
        let Some(issue) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".csv"))
            .and_then(|digits| digits.parse::<i64>().ok())
        else {
            continue;
        };
        candidates.push((issue, path));
    }

    candidates.sort();
    let mut best: Option<(i64, PathBuf)> = None;
    for (issue, path) in candidates {
        let diff = (reference - issue).abs();
        if best.as_ref().map_or(true, |(best_diff, _)| diff < *best_diff) {
            best = Some((diff, path));
        }
    }

    match best {
        Some((diff, path)) => {
            debug!("Selected forecast cache {:?} ({} from target)", path, diff);
            Ok(path)
        }
        None => Err(WeatherDataError::CacheNotFound {
            key: key.to_string(),
            dir: dir.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"time\n").await.unwrap();
    }

    #[test]
    fn test_encode_issue() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 7, 45, 0).unwrap();
        assert_eq!(encode_issue(&t), 2024030907);
    }

    #[tokio::test]
    async fn test_selects_minimal_difference() -> Result<(), WeatherDataError> {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "DWD_2024060100.csv").await;
        touch(dir.path(), "DWD_2024060106.csv").await;
        touch(dir.path(), "DWD_2024060112.csv").await;
        touch(dir.path(), "DWD_2024060107_yield.csv").await;
        touch(dir.path(), "OTHER_2024060107.csv").await;
        touch(dir.path(), "DWD_notes.txt").await;

        let target = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
        let path = select_nearest_cache(dir.path(), "DWD", &target).await?;
        assert_eq!(path, dir.path().join("DWD_2024060106.csv"));
        Ok(())
    }

    #[tokio::test]
    async fn test_tie_resolves_to_earlier_issue() -> Result<(), WeatherDataError> {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "DWD_2024060112.csv").await;
        touch(dir.path(), "DWD_2024060100.csv").await;

        let target = Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap();
        let path = select_nearest_cache(dir.path(), "DWD", &target).await?;
        assert_eq!(path, dir.path().join("DWD_2024060100.csv"));
        Ok(())
    }

    #[tokio::test]
    async fn test_not_found() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "DWD_2024060100_yield.csv").await;
        let target = Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap();

        let empty = select_nearest_cache(dir.path(), "DWD", &target).await;
        assert!(matches!(empty, Err(WeatherDataError::CacheNotFound { .. })));

        let missing = select_nearest_cache(&dir.path().join("nope"), "DWD", &target).await;
        assert!(matches!(missing, Err(WeatherDataError::CacheDirRead(..))));
    }
}
