//! Cached OMDb API client
//!
//! Fetches movie and TV listings, search results and detail records from the
//! OMDb API through a `CachedFetcher`, and maps OMDb records onto `Movie` and
//! `TvShow`. Bodies are cached exactly as OMDb sent them, and only when they
//! carry `"Response": "True"`.

use chrono::{Datelike, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheError, Substrate};
use crate::config::{OmdbConfig, TtlClass};
use crate::fetch::CachedFetcher;

/// Poster shown when OMDb has none
const PLACEHOLDER_POSTER: &str = "/netflix-inspired-poster.png";

/// Search terms rotated through for the "popular" row
pub const POPULAR_TERMS: [&str; 5] = ["Batman", "Spider", "Avengers", "Star", "Marvel"];

/// Search terms rotated through for the "trending" row
pub const TRENDING_TERMS: [&str; 5] = ["Action", "Adventure", "Thriller", "Comedy", "Drama"];

/// Search terms rotated through for the "top rated" row
pub const TOP_RATED_TERMS: [&str; 5] = ["Godfather", "Shawshank", "Dark", "Pulp", "Forrest"];

pub const POPULAR_TV_TERMS: [&str; 5] = ["Breaking", "Game", "Friends", "Office", "Stranger"];

pub const TRENDING_TV_TERMS: [&str; 5] = ["Netflix", "HBO", "Comedy", "Drama", "Crime"];

pub const TOP_RATED_TV_TERMS: [&str; 5] = ["Sopranos", "Wire", "Mad", "Breaking", "Better"];

/// OMDb returns at most this many results per page
const PAGE_SIZE: u32 = 10;

const DRAMA_GENRE_ID: u32 = 18;

/// Errors that can occur when fetching from OMDb
#[derive(Debug, Error)]
pub enum OmdbError {
    /// No API key was configured and the request was not cached
    #[error("OMDb API key not configured")]
    MissingApiKey,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The cache rejected the request key
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// OMDb reported the item does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A movie as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    /// Position within the listing, starting at 1
    pub id: u32,
    pub imdb_id: Option<String>,
    pub title: String,
    pub overview: String,
    pub poster_path: String,
    pub release_date: String,
    pub vote_average: f64,
    pub genre_ids: Vec<u32>,
    pub original_language: String,
}

/// A TV series as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvShow {
    /// Position within the listing, starting at 1
    pub id: u32,
    pub imdb_id: Option<String>,
    pub name: String,
    pub overview: String,
    pub poster_path: String,
    pub first_air_date: String,
    pub vote_average: f64,
    pub genre_ids: Vec<u32>,
    pub original_language: String,
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total_results: u32,
    pub total_pages: u32,
}

pub type MoviePage = Page<Movie>;
pub type TvPage = Page<TvShow>;

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            total_results: 0,
            total_pages: 0,
        }
    }
}

/// A genre in the static taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

/// The OMDb fields read when converting a record
///
/// Parsed out of the cached body after lookup; fields not listed here stay
/// in the cached body untouched.
#[derive(Debug, Clone, Default, Deserialize)]
struct OmdbItem {
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "Year", default)]
    year: Option<String>,
    #[serde(rename = "imdbID", default)]
    imdb_id: Option<String>,
    #[serde(rename = "Poster", default)]
    poster: Option<String>,
    #[serde(rename = "Plot", default)]
    plot: Option<String>,
    #[serde(rename = "Genre", default)]
    genre: Option<String>,
    #[serde(rename = "imdbRating", default)]
    imdb_rating: Option<String>,
}

/// Listing part of an OMDb search (`s=`) body
#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbItem>,
    #[serde(rename = "totalResults", default)]
    total_results: Option<String>,
}

/// OMDb signals success in the body, not the status code
fn is_success(body: &Value) -> bool {
    body["Response"] == "True"
}

fn error_message(body: &Value) -> Option<String> {
    body.get("Error").and_then(Value::as_str).map(str::to_string)
}

/// OMDb `type=` filter for searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    fn as_param(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }
}

/// Client for the OMDb API with a cache in front of every request
pub struct OmdbClient<S> {
    /// HTTP client for making requests
    http_client: Client,
    /// Cache-first request wrapper
    fetcher: CachedFetcher<S>,
    /// Base URL for the API (allows override for testing)
    base_url: String,
    api_key: Option<String>,
}

impl<S: Substrate> OmdbClient<S> {
    pub fn new(config: OmdbConfig, fetcher: CachedFetcher<S>) -> Self {
        Self {
            http_client: Client::new(),
            fetcher,
            base_url: config.base_url,
            api_key: config.api_key,
        }
    }

    pub fn fetcher(&self) -> &CachedFetcher<S> {
        &self.fetcher
    }

    /// Generates the cache key for a free-text search
    fn search_key(prefix: &str, query: &str) -> String {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        format!("{}_{}", prefix, words.join("_"))
    }

    /// Sends a GET with the given query parameters and parses the JSON body
    async fn request(&self, params: &[(&str, &str)]) -> Result<Value, OmdbError> {
        let api_key = self.api_key.as_deref().ok_or(OmdbError::MissingApiKey)?;

        let mut query = vec![("apikey", api_key)];
        query.extend(params.iter().filter(|(_, v)| !v.is_empty()).copied());

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&query)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("reelcache/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OmdbError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Runs a cached search and returns the listing part of a successful body
    ///
    /// `Ok(None)` means OMDb answered with `"Response": "False"`.
    async fn cached_search(
        &self,
        key: &str,
        term: &str,
        class: TtlClass,
        media: MediaType,
    ) -> Result<Option<SearchResponse>, OmdbError> {
        let body: Value = self
            .fetcher
            .fetch(key, class, is_success, || async move {
                self.request(&[("s", term), ("type", media.as_param()), ("page", "1")])
                    .await
            })
            .await?;

        if !is_success(&body) {
            debug!(key, error = ?error_message(&body), "OMDb search returned no results");
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(body)?))
    }

    async fn movie_page(
        &self,
        key: &str,
        term: &str,
        class: TtlClass,
    ) -> Result<MoviePage, OmdbError> {
        let body = self.cached_search(key, term, class, MediaType::Movie).await?;
        Ok(body.map_or_else(Page::empty, |b| page_from_search(b, convert_item)))
    }

    async fn tv_page(&self, key: &str, term: &str, class: TtlClass) -> Result<TvPage, OmdbError> {
        let body = self.cached_search(key, term, class, MediaType::Series).await?;
        Ok(body.map_or_else(Page::empty, |b| page_from_search(b, convert_show)))
    }

    /// Fetches the "popular" row, seeded by `term` or today's rotation
    ///
    /// Cached under `popular_movies_{term}` for the catalog TTL.
    pub async fn popular_movies(&self, term: Option<&str>) -> Result<MoviePage, OmdbError> {
        let term = term.unwrap_or_else(|| todays_term(&POPULAR_TERMS));
        let key = format!("popular_movies_{}", term);
        self.movie_page(&key, term, TtlClass::Catalog).await
    }

    /// Fetches the "trending" row, seeded by `term` or today's rotation
    pub async fn trending_movies(&self, term: Option<&str>) -> Result<MoviePage, OmdbError> {
        let term = term.unwrap_or_else(|| todays_term(&TRENDING_TERMS));
        let key = format!("trending_movies_{}", term);
        self.movie_page(&key, term, TtlClass::Trending).await
    }

    pub async fn top_rated_movies(&self, term: Option<&str>) -> Result<MoviePage, OmdbError> {
        let term = term.unwrap_or_else(|| todays_term(&TOP_RATED_TERMS));
        let key = format!("top_rated_movies_{}", term);
        self.movie_page(&key, term, TtlClass::Catalog).await
    }

    /// Searches movies by free text
    ///
    /// A blank query returns an empty page without touching cache or network.
    pub async fn search_movies(&self, query: &str) -> Result<MoviePage, OmdbError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Page::empty());
        }
        let key = Self::search_key("search", query);
        self.movie_page(&key, query, TtlClass::Search).await
    }

    /// Searches TV series by free text, cached under `tv_search_{words}`
    pub async fn search_tv(&self, query: &str) -> Result<TvPage, OmdbError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Page::empty());
        }
        let key = Self::search_key("tv_search", query);
        self.tv_page(&key, query, TtlClass::Search).await
    }

    pub async fn popular_tv(&self, term: Option<&str>) -> Result<TvPage, OmdbError> {
        let term = term.unwrap_or_else(|| todays_term(&POPULAR_TV_TERMS));
        let key = format!("popular_tv_{}", term);
        self.tv_page(&key, term, TtlClass::Catalog).await
    }

    pub async fn trending_tv(&self, term: Option<&str>) -> Result<TvPage, OmdbError> {
        let term = term.unwrap_or_else(|| todays_term(&TRENDING_TV_TERMS));
        let key = format!("trending_tv_{}", term);
        self.tv_page(&key, term, TtlClass::Trending).await
    }

    pub async fn top_rated_tv(&self, term: Option<&str>) -> Result<TvPage, OmdbError> {
        let term = term.unwrap_or_else(|| todays_term(&TOP_RATED_TV_TERMS));
        let key = format!("top_rated_tv_{}", term);
        self.tv_page(&key, term, TtlClass::Catalog).await
    }

    /// Fetches a single movie's detail record by IMDb id
    pub async fn movie_details(&self, imdb_id: &str) -> Result<Movie, OmdbError> {
        let key = format!("details_{}", imdb_id);
        let body: Value = self
            .fetcher
            .fetch(&key, TtlClass::Detail, is_success, || async move {
                self.request(&[("i", imdb_id)]).await
            })
            .await?;

        if !is_success(&body) {
            return Err(OmdbError::NotFound(
                error_message(&body).unwrap_or_else(|| imdb_id.to_string()),
            ));
        }
        let item: OmdbItem = serde_json::from_value(body)?;
        Ok(convert_item(&item, 0))
    }

    /// Returns the movie genre taxonomy
    ///
    /// OMDb has no genre endpoint, so the list is static; it still goes
    /// through the cache under the taxonomy TTL.
    pub async fn movie_genres(&self) -> Result<Vec<Genre>, OmdbError> {
        self.fetcher
            .fetch(
                "genres_movie",
                TtlClass::Taxonomy,
                |g: &Vec<Genre>| !g.is_empty(),
                || async { Ok::<_, OmdbError>(genres(MOVIE_GENRES)) },
            )
            .await
    }

    /// Returns the TV genre taxonomy
    pub async fn tv_genres(&self) -> Result<Vec<Genre>, OmdbError> {
        self.fetcher
            .fetch(
                "genres_tv",
                TtlClass::Taxonomy,
                |g: &Vec<Genre>| !g.is_empty(),
                || async { Ok::<_, OmdbError>(genres(TV_GENRES)) },
            )
            .await
    }
}

/// Picks a seed term by day of year so the row changes daily
fn todays_term(terms: &'static [&'static str]) -> &'static str {
    terms[Utc::now().ordinal0() as usize % terms.len()]
}

fn page_from_search<T>(body: SearchResponse, convert: fn(&OmdbItem, usize) -> T) -> Page<T> {
    let results: Vec<T> = body
        .search
        .iter()
        .enumerate()
        .map(|(index, item)| convert(item, index))
        .collect();

    let total_results = body
        .total_results
        .as_deref()
        .and_then(|t| t.parse::<u32>().ok())
        .filter(|&t| t > 0)
        .unwrap_or(results.len() as u32);

    Page {
        results,
        total_results,
        total_pages: total_results.div_ceil(PAGE_SIZE),
    }
}

/// Returns the field's value unless it is missing, empty or "N/A"
fn present(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "N/A")
        .map(str::to_string)
}

/// `{start year}-01-01`; series years such as `2008–2013` keep the start
fn first_of_year(item: &OmdbItem) -> String {
    present(&item.year)
        .map(|y| format!("{}-01-01", y.chars().take(4).collect::<String>()))
        .unwrap_or_else(|| "2023-01-01".to_string())
}

fn rating(item: &OmdbItem) -> f64 {
    present(&item.imdb_rating)
        .and_then(|r| r.parse::<f64>().ok())
        .unwrap_or(7.0)
}

/// Maps an OMDb record onto `Movie`, numbering it `index + 1`
fn convert_item(item: &OmdbItem, index: usize) -> Movie {
    Movie {
        id: index as u32 + 1,
        imdb_id: item.imdb_id.clone(),
        title: present(&item.title).unwrap_or_else(|| "Unknown Title".to_string()),
        overview: present(&item.plot).unwrap_or_else(|| "No overview available.".to_string()),
        poster_path: present(&item.poster).unwrap_or_else(|| PLACEHOLDER_POSTER.to_string()),
        release_date: first_of_year(item),
        vote_average: rating(item),
        genre_ids: genre_ids(present(&item.genre).as_deref().unwrap_or("Drama")),
        original_language: "en".to_string(),
    }
}

/// Maps an OMDb series record onto `TvShow`; genres default to Comedy
fn convert_show(item: &OmdbItem, index: usize) -> TvShow {
    TvShow {
        id: index as u32 + 1,
        imdb_id: item.imdb_id.clone(),
        name: present(&item.title).unwrap_or_else(|| "Unknown Title".to_string()),
        overview: present(&item.plot).unwrap_or_else(|| "No overview available.".to_string()),
        poster_path: present(&item.poster).unwrap_or_else(|| PLACEHOLDER_POSTER.to_string()),
        first_air_date: first_of_year(item),
        vote_average: rating(item),
        genre_ids: genre_ids(present(&item.genre).as_deref().unwrap_or("Comedy")),
        original_language: "en".to_string(),
    }
}

/// Maps a comma-separated OMDb genre string to at most three genre ids
///
/// Unknown genres map to Drama.
pub fn genre_ids(genre: &str) -> Vec<u32> {
    genre
        .split(',')
        .map(str::trim)
        .map(|name| genre_id(name).unwrap_or(DRAMA_GENRE_ID))
        .take(3)
        .collect()
}

fn genre_id(name: &str) -> Option<u32> {
    if name == "Sci-Fi" {
        return Some(878);
    }
    MOVIE_GENRES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(id, _)| *id)
}

fn genres(table: &[(u32, &str)]) -> Vec<Genre> {
    table
        .iter()
        .map(|(id, name)| Genre {
            id: *id,
            name: name.to_string(),
        })
        .collect()
}

const MOVIE_GENRES: &[(u32, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

const TV_GENRES: &[(u32, &str)] = &[
    (10759, "Action & Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (10762, "Kids"),
    (9648, "Mystery"),
    (10763, "News"),
    (10764, "Reality"),
    (878, "Sci-Fi & Fantasy"),
    (10766, "Soap"),
    (10767, "Talk"),
    (10768, "War & Politics"),
    (37, "Western"),
];
