//! Bounded-region place search
//!
//! Queries a Nominatim-compatible `/search` endpoint restricted to the valley's
//! bounding box. Failures never propagate to the map: they are logged and turn
//! into an empty result list the user can retry.
//!
//! [`SearchState`] is the caller side: it hands out a ticket per request and
//! only lets the most recently issued one populate the result list.

use crate::{Coordinate, MapError, Result};
use geo::{Coord, Rect};
use serde::Deserialize;
use std::time::Duration;

/// Default Nominatim search endpoint
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Default maximum number of results per query
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Geographic box in degrees (x = longitude, y = latitude)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionBounds {
    rect: Rect<f64>,
}

impl RegionBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            rect: Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north }),
        }
    }

    pub fn west(&self) -> f64 {
        self.rect.min().x
    }

    pub fn east(&self) -> f64 {
        self.rect.max().x
    }

    pub fn south(&self) -> f64 {
        self.rect.min().y
    }

    pub fn north(&self) -> f64 {
        self.rect.max().y
    }

    /// Nominatim `viewbox` value: `left,top,right,bottom`
    pub fn viewbox(&self) -> String {
        format!(
            "{:.2},{:.2},{:.2},{:.2}",
            self.west(),
            self.north(),
            self.east(),
            self.south()
        )
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.west()..=self.east()).contains(&coordinate.longitude)
            && (self.south()..=self.north()).contains(&coordinate.latitude)
    }
}

impl Default for RegionBounds {
    /// Gudvangen in the west to Flåm/Aurland in the east
    fn default() -> Self {
        Self::new(6.70, 60.60, 7.30, 61.00)
    }
}

/// Search client configuration
#[derive(Clone, Debug)]
pub struct GeocodingConfig {
    /// Search endpoint URL
    pub endpoint: String,
    /// Results are restricted to this box
    pub region: RegionBounds,
    /// Maximum number of results returned
    pub limit: usize,
    /// Sent as `User-Agent`; Nominatim's usage policy requires one
    pub user_agent: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GEOCODER_URL.to_string(),
            region: RegionBounds::default(),
            limit: DEFAULT_SEARCH_LIMIT,
            user_agent: concat!("fjord-map/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// One geocoder hit
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub id: u64,
    pub coordinate: Coordinate,
    pub display_name: String,
}

impl SearchResult {
    /// Text before the first comma of the display name
    pub fn short_name(&self) -> &str {
        self.display_name
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or(&self.display_name)
    }
}

/// Wire format of a Nominatim hit; coordinates arrive as strings
#[derive(Deserialize)]
struct RawPlace {
    place_id: u64,
    lat: String,
    lon: String,
    display_name: String,
}

/// Decode a response body, keeping service order and at most `limit` hits
///
/// Entries whose coordinates do not parse or fall outside `region` are
/// skipped; endpoints that ignore `bounded=1` still only yield valley hits.
pub fn parse_results(
    body: &str,
    region: &RegionBounds,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let places: Vec<RawPlace> = serde_json::from_str(body)
        .map_err(|e| MapError::Network(format!("invalid response body: {e}")))?;

    let results = places
        .into_iter()
        .filter_map(|place| {
            let latitude = place.lat.trim().parse::<f64>().ok();
            let longitude = place.lon.trim().parse::<f64>().ok();
            match (latitude, longitude) {
                (Some(latitude), Some(longitude))
                    if region.contains(&Coordinate::new(latitude, longitude)) =>
                {
                    Some(SearchResult {
                        id: place.place_id,
                        coordinate: Coordinate::new(latitude, longitude),
                        display_name: place.display_name,
                    })
                }
                (Some(_), Some(_)) => {
                    tracing::debug!(
                        "Skipping place {} outside the search region",
                        place.place_id
                    );
                    None
                }
                _ => {
                    tracing::debug!(
                        "Skipping place {} with unreadable coordinates ({}, {})",
                        place.place_id,
                        place.lat,
                        place.lon
                    );
                    None
                }
            }
        })
        .take(limit)
        .collect();

    Ok(results)
}

/// HTTP client for the geocoder
#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    config: GeocodingConfig,
}

impl SearchClient {
    pub fn new(config: GeocodingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MapError::Network(format!("http client init failed: {e}")))?;
        Ok(Self::with_http(config, http))
    }

    /// Use a preconfigured `reqwest::Client`
    pub fn with_http(config: GeocodingConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &GeocodingConfig {
        &self.config
    }

    /// The GET request for `query`
    pub fn request(&self, query: &str) -> reqwest::RequestBuilder {
        let viewbox = self.config.region.viewbox();
        let limit = self.config.limit.to_string();
        self.http.get(&self.config.endpoint).query(&[
            ("format", "json"),
            ("q", query.trim()),
            ("viewbox", viewbox.as_str()),
            ("bounded", "1"),
            ("limit", limit.as_str()),
        ])
    }

    /// Search the configured region
    ///
    /// A blank query returns immediately without a request. Any failure is
    /// logged and yields an empty list.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        match self.fetch(query).await {
            Ok(results) => {
                tracing::debug!("Search '{}' returned {} results", query.trim(), results.len());
                results
            }
            Err(e) => {
                tracing::warn!("Search '{}' failed: {e}", query.trim());
                Vec::new()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .request(query)
            .send()
            .await
            .map_err(|e| MapError::Network(format!("request error: {e}")))?;

        if !response.status().is_success() {
            return Err(MapError::Network(format!("HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MapError::Network(format!("invalid body: {e}")))?;

        parse_results(&body, &self.config.region, self.config.limit)
    }
}

/// Identifies one search request issued through [`SearchState::begin`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchTicket(u64);

/// Search box state: query text, results dropdown and the request guard
#[derive(Debug, Default)]
pub struct SearchState {
    /// Text in the search box
    pub query: String,
    results: Vec<SearchResult>,
    searching: bool,
    /// Last ticket handed out
    latest: u64,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for the current query
    ///
    /// Returns `None` and leaves the results untouched for a blank query.
    /// Otherwise clears the results and supersedes any request in flight.
    pub fn begin(&mut self) -> Option<SearchTicket> {
        if self.query.trim().is_empty() {
            return None;
        }
        self.latest += 1;
        self.results.clear();
        self.searching = true;
        Some(SearchTicket(self.latest))
    }

    /// Apply the results of `ticket`; returns false if a newer request was
    /// issued since, in which case nothing changes
    pub fn complete(&mut self, ticket: SearchTicket, results: Vec<SearchResult>) -> bool {
        if ticket.0 != self.latest {
            tracing::debug!(
                "Discarding stale search results (ticket {}, latest {})",
                ticket.0,
                self.latest
            );
            return false;
        }
        self.results = results;
        self.searching = false;
        true
    }

    #[inline]
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    #[inline]
    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Remove and return result `index`, closing the dropdown
    pub fn take_result(&mut self, index: usize) -> Option<SearchResult> {
        if index >= self.results.len() {
            return None;
        }
        let result = self.results.swap_remove(index);
        self.results.clear();
        Some(result)
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    const BODY: &str = r#"[
        {"place_id": 101, "lat": "60.8627", "lon": "7.1149", "display_name": "Flåm stasjon, Flåm, Aurland, Vestland, Norge"},
        {"place_id": 102, "lat": "not-a-number", "lon": "7.1", "display_name": "Broken"},
        {"place_id": 103, "lat": "60.9035", "lon": "7.1930", "display_name": "Stegastein, Aurland"}
    ]"#;

    fn test_client(endpoint: String) -> SearchClient {
        let config = GeocodingConfig {
            endpoint,
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        SearchClient::with_http(config, http)
    }

    /// Serve exactly one HTTP response; the handle yields the request head
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/search", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (url, handle)
    }

    #[test]
    fn test_viewbox_order() {
        let region = RegionBounds::default();
        assert_eq!(region.viewbox(), "6.70,61.00,7.30,60.60");
        assert!(region.contains(&Coordinate::new(60.8638, 7.1187)));
        assert!(!region.contains(&Coordinate::new(59.91, 10.75)));
    }

    #[test]
    fn test_request_parameters() {
        let client = test_client(DEFAULT_GEOCODER_URL.to_string());
        let request = client.request("  Stegastein ").build().unwrap();
        let pairs: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("format"), Some("json"));
        assert_eq!(get("q"), Some("Stegastein"));
        assert_eq!(get("viewbox"), Some("6.70,61.00,7.30,60.60"));
        assert_eq!(get("bounded"), Some("1"));
        assert_eq!(get("limit"), Some("5"));
    }

    #[test]
    fn test_parse_results_drops_hits_outside_region() {
        let body = r#"[
            {"place_id": 201, "lat": "59.9139", "lon": "10.7522", "display_name": "Oslo, Norge"},
            {"place_id": 202, "lat": "60.8770", "lon": "6.8420", "display_name": "Gudvangen, Aurland"}
        ]"#;
        let results = parse_results(body, &RegionBounds::default(), 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 202);
        assert_eq!(results[0].short_name(), "Gudvangen");
    }

    #[test]
    fn test_parse_results_skips_bad_entries() {
        let region = RegionBounds::default();
        let results = parse_results(BODY, &region, 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 101);
        assert_eq!(results[0].coordinate, Coordinate::new(60.8627, 7.1149));
        assert_eq!(results[0].short_name(), "Flåm stasjon");
        assert_eq!(results[1].id, 103);

        let limited = parse_results(BODY, &region, 1).unwrap();
        assert_eq!(limited.len(), 1);

        assert!(parse_results("<html>", &region, 5).is_err());
        assert!(parse_results("[]", &region, 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_makes_no_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let client = test_client(format!("http://{}/search", listener.local_addr().unwrap()));

        assert!(client.search("").await.is_empty());
        assert!(client.search("   \t").await.is_empty());

        let accepted = listener.accept();
        assert!(matches!(
            accepted,
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock
        ));
    }

    #[tokio::test]
    async fn test_search_success() {
        let (url, server) = serve_once("200 OK", BODY);
        let client = test_client(url);

        let results = client.search("Flåm").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].short_name(), "Flåm stasjon");

        let head = server.join().unwrap();
        assert!(head.starts_with("GET /search?"));
        assert!(head.contains("bounded=1"));
    }

    #[tokio::test]
    async fn test_http_error_yields_empty() {
        let (url, server) = serve_once("503 Service Unavailable", "[]");
        let client = test_client(url);
        assert!(client.search("Flåm").await.is_empty());
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_connection_failure_yields_empty() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = test_client(format!("http://{addr}/search"));
        assert!(client.search("Flåm").await.is_empty());
    }

    fn result(id: u64) -> SearchResult {
        SearchResult {
            id,
            coordinate: Coordinate::new(60.86, 7.11),
            display_name: format!("Place {id}, Aurland"),
        }
    }

    #[test]
    fn test_blank_begin_keeps_results() {
        let mut state = SearchState::new();
        state.query = "Flåm".to_string();
        let ticket = state.begin().unwrap();
        assert!(state.complete(ticket, vec![result(1)]));

        state.query = "  ".to_string();
        assert!(state.begin().is_none());
        assert_eq!(state.results().len(), 1);
        assert!(!state.is_searching());
    }

    #[test]
    fn test_latest_request_wins() {
        let mut state = SearchState::new();
        state.query = "Fl".to_string();
        let first = state.begin().unwrap();
        state.query = "Flåm".to_string();
        let second = state.begin().unwrap();
        assert!(second > first);

        // Older response arriving first is ignored
        assert!(!state.complete(first, vec![result(1)]));
        assert!(state.results().is_empty());
        assert!(state.is_searching());

        assert!(state.complete(second, vec![result(2)]));
        assert_eq!(state.results()[0].id, 2);

        // ...and so is one arriving late
        assert!(!state.complete(first, vec![result(1)]));
        assert_eq!(state.results()[0].id, 2);
        assert!(!state.is_searching());
    }

    #[test]
    fn test_take_result_closes_dropdown() {
        let mut state = SearchState::new();
        state.query = "x".to_string();
        let ticket = state.begin().unwrap();
        state.complete(ticket, vec![result(1), result(2), result(3)]);

        assert!(state.take_result(7).is_none());
        assert_eq!(state.results().len(), 3);

        let taken = state.take_result(1).unwrap();
        assert_eq!(taken.id, 2);
        assert!(state.results().is_empty());
    }
}
