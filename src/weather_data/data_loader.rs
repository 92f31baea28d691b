use crate::weather_data::error::WeatherDataError;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, TryStreamExt};
use log::{info, warn};
use polars::frame::DataFrame;
use polars::prelude::*;
use reqwest::Client;
use std::io::{Cursor, Read, Write};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::task;
use tokio_util::io::StreamReader;

/// Fetches the raw bytes behind a URL.
///
/// The public archive reader goes through this trait so tests and offline
/// deployments can serve archives without a network.
pub trait ArchiveFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, WeatherDataError>>;
}

/// [`ArchiveFetcher`] over HTTP(S).
pub struct ReqwestArchiveFetcher {
    download_client: Client,
}

impl ReqwestArchiveFetcher {
    pub fn new() -> Self {
        Self {
            download_client: Client::new(),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, WeatherDataError> {
        info!("Downloading archive from {}", url);

        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| WeatherDataError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    WeatherDataError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    WeatherDataError::NetworkRequest(url.to_string(), e)
                });
            }
        };

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut stream_reader = StreamReader::new(stream);
        let mut bytes = Vec::new();
        stream_reader.read_to_end(&mut bytes).await?;
        info!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}

impl Default for ReqwestArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher for ReqwestArchiveFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, WeatherDataError>> {
        self.download(url).boxed()
    }
}

/// Extracts the first zip member whose file name starts with `prefix`.
///
/// Member names are matched on their last path component.
pub fn extract_member(bytes: &[u8], prefix: &str, url: &str) -> Result<Vec<u8>, WeatherDataError> {
    let mut archive =
        ::zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| WeatherDataError::ArchiveOpen {
            url: url.to_string(),
            source: e,
        })?;

    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    let Some(name) = names
        .into_iter()
        .find(|n| n.rsplit('/').next().is_some_and(|file| file.starts_with(prefix)))
    else {
        return Err(WeatherDataError::ArchiveMemberNotFound {
            url: url.to_string(),
            prefix: prefix.to_string(),
        });
    };

    let mut member = archive
        .by_name(&name)
        .map_err(|e| WeatherDataError::ArchiveOpen {
            url: url.to_string(),
            source: e,
        })?;
    let mut content = Vec::new();
    member.read_to_end(&mut content)?;
    info!("Extracted {} ({} bytes) from {}", name, content.len(), url);
    Ok(content)
}

/// Parses delimited text into a `DataFrame` with every column read as a string.
///
/// Runs in a blocking task. Values are parsed by the callers, which need
/// per-column sentinel and timestamp handling that schema inference would defeat.
pub async fn csv_to_dataframe(
    bytes: Vec<u8>,
    separator: u8,
    source_name: &str,
) -> Result<DataFrame, WeatherDataError> {
    let source_owned = source_name.to_string();

    task::spawn_blocking(move || {
        let mut temp_file = NamedTempFile::new().map_err(|e| WeatherDataError::CsvReadIo {
            source_name: source_owned.clone(),
            source: e,
        })?;
        temp_file
            .write_all(&bytes)
            .and_then(|_| temp_file.flush())
            .map_err(|e| WeatherDataError::CsvReadIo {
                source_name: source_owned.clone(),
                source: e,
            })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .map_parse_options(|options| {
                options
                    .with_separator(separator)
                    .with_encoding(CsvEncoding::LossyUtf8)
            })
            .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
            .map_err(|e| WeatherDataError::CsvReadPolars {
                source_name: source_owned.clone(),
                source: e,
            })?
            .finish()
            .map_err(|e| WeatherDataError::CsvReadPolars {
                source_name: source_owned,
                source: e,
            })
    })
    .await?
}

/// Looks up a string column by its whitespace-trimmed name.
pub fn string_column<'a>(
    df: &'a DataFrame,
    column: &str,
    source_name: &str,
) -> Result<&'a StringChunked, WeatherDataError> {
    let found = df
        .get_columns()
        .iter()
        .find(|c| c.name().trim() == column)
        .ok_or_else(|| WeatherDataError::MissingColumnError {
            source_name: source_name.to_string(),
            column: column.to_string(),
        })?;
    Ok(found.as_materialized_series().str()?)
}

/// Parses an optional numeric cell. Empty cells and `sentinel` become `None`.
pub fn parse_value(
    cell: Option<&str>,
    sentinel: Option<f64>,
    column: &str,
    source_name: &str,
) -> Result<Option<f64>, WeatherDataError> {
    let Some(raw) = cell.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value: f64 = raw.parse().map_err(|_| WeatherDataError::InvalidValue {
        source_name: source_name.to_string(),
        column: column.to_string(),
        value: raw.to_string(),
    })?;
    if sentinel.is_some_and(|s| value == s) || !value.is_finite() {
        return Ok(None);
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::zip::write::FileOptions;

    fn zip_with(members: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in members {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_member_by_prefix() -> Result<(), WeatherDataError> {
        let bytes = zip_with(&[
            ("Metadaten_Geographie_00001.txt", "meta"),
            ("produkt_tu_stunde_00001.txt", "data"),
        ]);
        let content = extract_member(&bytes, "produkt_tu_", "mem://a.zip")?;
        assert_eq!(content, b"data");

        let missing = extract_member(&bytes, "produkt_st_", "mem://a.zip");
        assert!(matches!(
            missing,
            Err(WeatherDataError::ArchiveMemberNotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_parse_value() -> Result<(), WeatherDataError> {
        assert_eq!(parse_value(Some(" 12.5"), Some(-999.0), "x", "t")?, Some(12.5));
        assert_eq!(parse_value(Some("-999"), Some(-999.0), "x", "t")?, None);
        assert_eq!(parse_value(Some("  "), None, "x", "t")?, None);
        assert_eq!(parse_value(None, None, "x", "t")?, None);
        assert!(parse_value(Some("abc"), None, "x", "t").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_csv_columns_are_trimmed_strings() -> Result<(), WeatherDataError> {
        let text = "STATIONS_ID; MESS_DATUM;  TT_TU;eor\n1;2024060100;  12.3;eor\n";
        let df = csv_to_dataframe(text.as_bytes().to_vec(), b';', "fixture").await?;
        let column = string_column(&df, "TT_TU", "fixture")?;
        assert_eq!(column.get(0).map(str::trim), Some("12.3"));
        assert!(string_column(&df, "RF_TU", "fixture").is_err());
        Ok(())
    }
}
