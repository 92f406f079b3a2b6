use clap::Parser;
use fjord_map_lib::{Coordinate, DEFAULT_GEOCODER_URL, DEFAULT_SEARCH_LIMIT};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Fjord Map - Offline map of the Flåm valley trip with the rail track, itinerary stops and your own saved places
pub struct Settings {
    /// Itinerary JSON file (the bundled trip is used when omitted)
    #[clap(long, value_name = "FILE")]
    pub itinerary: Option<PathBuf>,

    /// GPX track drawn as the static route line (the bundled Flåmsbana track when omitted)
    #[clap(long, value_name = "FILE")]
    pub track: Option<PathBuf>,

    /// File holding saved points of interest
    #[clap(long, value_name = "FILE")]
    pub storage: Option<PathBuf>,

    /// Current position, shown as a dot on the map
    #[clap(long, value_name = "LAT,LON")]
    pub location: Option<Coordinate>,

    /// Nominatim-compatible search endpoint
    #[clap(long, value_name = "URL", default_value = DEFAULT_GEOCODER_URL)]
    pub geocoder_url: String,

    /// Maximum number of search results shown
    #[clap(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub search_limit: usize,

    /// Start with the satellite base layer
    #[clap(long, default_value = "false")]
    pub satellite: bool,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}
