mod error;
mod grid;
mod irradiance;
mod pv_weather;
mod types;
mod utils;
mod weather_data;

pub use error::PvWeatherError;
pub use pv_weather::*;
pub use utils::parse_timezone;

pub use types::into_utc_trait::IntoUtcDateTime;
pub use types::irradiation::{HourlyIrradiation, HourlyValue};
pub use types::location::{LatLon, Location, SystemGeometry};
pub use types::method::RetrievalMethod;
pub use types::weather_series::{Variable, WeatherRecord, WeatherSeries};

pub use grid::decoder::{GridCell, GridDecoder, GridMessage, LatLonGrid};
pub use grid::geo_distance::{arc_distance, distance_km, nearest_cell};
pub use grid::reader::{deaccumulate, GridForecastReader, GridRunConfig, GridRunOutcome};

pub use weather_data::archive_reader::{joules_per_cm2_to_watts, ArchiveSource, PublicArchiveReader};
pub use weather_data::cache_reader::{kelvin_to_celsius, read_cache_csv};
pub use weather_data::cache_selector::select_nearest_cache;
pub use weather_data::data_loader::{ArchiveFetcher, ReqwestArchiveFetcher};

pub use irradiance::decomposition::{dirint, disc, DiscOutput};
pub use irradiance::engine::transpose;
pub use irradiance::perez::{poa_components, PoaComponents, SkyConditions};
pub use irradiance::solar_geometry::{solar_angles, SolarAngles};

pub use grid::error::GridForecastError;
pub use irradiance::error::TranspositionError;
pub use weather_data::error::WeatherDataError;
