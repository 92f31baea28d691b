use crate::error::PvWeatherError;
use std::fmt;
use std::str::FromStr;

/// The supported ways of obtaining a [`WeatherSeries`](crate::WeatherSeries).
///
/// Forecast methods are valid for [`PvWeather::forecast`](crate::PvWeather::forecast),
/// reference methods for [`PvWeather::reference`](crate::PvWeather::reference).
/// Parsing is case-insensitive.
///
/// # Examples
///
/// ```
/// use pvweather::RetrievalMethod;
///
/// let method: RetrievalMethod = "DWD_CSV".parse().unwrap();
/// assert_eq!(method, RetrievalMethod::DwdCsv);
/// assert!("ecmwf".parse::<RetrievalMethod>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrievalMethod {
    /// Convert the latest GRIB2 forecast run into the CSV cache, then read from the cache.
    DwdGrib2,
    /// Read the cached forecast CSV closest to the requested time.
    DwdCsv,
    /// Download the public hourly station archives.
    DwdPub,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::DwdGrib2 => "dwd_grib2",
            RetrievalMethod::DwdCsv => "dwd_csv",
            RetrievalMethod::DwdPub => "dwd_pub",
        }
    }

    pub fn is_forecast(&self) -> bool {
        matches!(self, RetrievalMethod::DwdGrib2 | RetrievalMethod::DwdCsv)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, RetrievalMethod::DwdPub)
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMethod {
    type Err = PvWeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dwd_grib2" => Ok(RetrievalMethod::DwdGrib2),
            "dwd_csv" => Ok(RetrievalMethod::DwdCsv),
            "dwd_pub" => Ok(RetrievalMethod::DwdPub),
            _ => Err(PvWeatherError::InvalidMethod {
                method: s.to_string(),
                operation: "weather retrieval",
            }),
        }
    }
}
