pub mod into_utc_trait;
pub mod irradiation;
pub mod location;
pub mod method;
pub mod weather_series;
