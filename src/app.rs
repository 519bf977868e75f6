//! Command execution for reelcache
//!
//! Runs one parsed subcommand against an `OmdbClient` and writes the result
//! to the given output.

use std::io::{self, Write};
use thiserror::Error;
use tracing::warn;

use crate::cache::Substrate;
use crate::cli::Command;
use crate::omdb::{Movie, OmdbClient, OmdbError, Page, TvShow};

/// Errors surfaced by a command
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Omdb(#[from] OmdbError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("failed to format payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Executes `command`, writing human-readable output to `out`
pub async fn run<S: Substrate, W: Write>(
    command: Command,
    client: &OmdbClient<S>,
    out: &mut W,
) -> Result<(), AppError> {
    let cache = client.fetcher().cache();

    match command {
        Command::Stats => {
            let stats = cache.stats();
            writeln!(out, "Cached Items: {}", stats.keys.len())?;
            writeln!(out, "Total Size: {}", stats.human_size())?;
            if !stats.keys.is_empty() {
                writeln!(out, "Cached Keys:")?;
                for key in &stats.keys {
                    writeln!(out, "  • {}", key)?;
                }
            }
        }
        Command::Clear => {
            let removed = cache.clear();
            writeln!(out, "Cleared {} entries", removed)?;
        }
        Command::ClearExpired => {
            let evicted = cache.clear_expired();
            writeln!(out, "Removed {} expired entries", evicted)?;
        }
        Command::Get { key } => match cache.get::<serde_json::Value>(&key) {
            Some(payload) => writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?,
            None => writeln!(out, "No fresh entry for '{}'", key)?,
        },
        Command::Remove { key } => {
            cache.remove(&key);
            writeln!(out, "Removed '{}'", key)?;
        }
        Command::Popular { term, tv: false } => {
            let page = client.popular_movies(term.as_deref()).await?;
            write_page(out, "Popular", &page)?;
        }
        Command::Popular { term, tv: true } => {
            let page = client.popular_tv(term.as_deref()).await?;
            write_page(out, "Popular TV", &page)?;
        }
        Command::Trending { term, tv: false } => {
            let page = client.trending_movies(term.as_deref()).await?;
            write_page(out, "Trending", &page)?;
        }
        Command::Trending { term, tv: true } => {
            let page = client.trending_tv(term.as_deref()).await?;
            write_page(out, "Trending TV", &page)?;
        }
        Command::TopRated { term, tv: false } => {
            let page = client.top_rated_movies(term.as_deref()).await?;
            write_page(out, "Top Rated", &page)?;
        }
        Command::TopRated { term, tv: true } => {
            let page = client.top_rated_tv(term.as_deref()).await?;
            write_page(out, "Top Rated TV", &page)?;
        }
        Command::Search { query, tv } => {
            let query = query.join(" ");
            let title = format!("Results for \"{}\"", query);
            if tv {
                write_page(out, &title, &client.search_tv(&query).await?)?;
            } else {
                write_page(out, &title, &client.search_movies(&query).await?)?;
            }
        }
        Command::Details { imdb_id } => {
            let movie = client.movie_details(&imdb_id).await?;
            write_details(out, &movie)?;
        }
        Command::Genres { tv } => {
            let genres = if tv {
                client.tv_genres().await?
            } else {
                client.movie_genres().await?
            };
            for genre in genres {
                writeln!(out, "{:>6}  {}", genre.id, genre.name)?;
            }
        }
        Command::Home => {
            let (popular, trending) =
                futures::join!(client.popular_movies(None), client.trending_movies(None));

            // A failed row is shown as empty; the other row still renders
            for (title, row) in [("Popular", popular), ("Trending", trending)] {
                match row {
                    Ok(page) => write_page(out, title, &page)?,
                    Err(e) => {
                        warn!(row = title, error = %e, "failed to load row");
                        write_page(out, title, &Page::<Movie>::empty())?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// The fields a listing line shows
trait ListingRow {
    fn id(&self) -> u32;
    fn label(&self) -> &str;
    fn date(&self) -> &str;
    fn rating(&self) -> f64;
}

impl ListingRow for Movie {
    fn id(&self) -> u32 {
        self.id
    }
    fn label(&self) -> &str {
        &self.title
    }
    fn date(&self) -> &str {
        &self.release_date
    }
    fn rating(&self) -> f64 {
        self.vote_average
    }
}

impl ListingRow for TvShow {
    fn id(&self) -> u32 {
        self.id
    }
    fn label(&self) -> &str {
        &self.name
    }
    fn date(&self) -> &str {
        &self.first_air_date
    }
    fn rating(&self) -> f64 {
        self.vote_average
    }
}

fn write_page<W: Write, T: ListingRow>(out: &mut W, title: &str, page: &Page<T>) -> io::Result<()> {
    writeln!(
        out,
        "{} ({} results, {} pages)",
        title, page.total_results, page.total_pages
    )?;
    if page.results.is_empty() {
        writeln!(out, "  (nothing to show)")?;
    }
    for row in &page.results {
        let date = row.date();
        writeln!(
            out,
            "{:>3}. {} ({}) ★ {:.1}",
            row.id(),
            row.label(),
            date.get(..4).unwrap_or(date),
            row.rating()
        )?;
    }
    Ok(())
}

fn write_details<W: Write>(out: &mut W, movie: &Movie) -> io::Result<()> {
    writeln!(out, "{}", movie.title)?;
    writeln!(out, "Released: {}", movie.release_date)?;
    writeln!(out, "Rating: {:.1}", movie.vote_average)?;
    writeln!(out, "Poster: {}", movie.poster_path)?;
    writeln!(out)?;
    writeln!(out, "{}", movie.overview)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, TtlCache};
    use crate::config::{OmdbConfig, TtlPolicy};
    use crate::fetch::CachedFetcher;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn offline_client() -> OmdbClient<MemoryStore> {
        let cache = Arc::new(TtlCache::new(MemoryStore::new()));
        OmdbClient::new(
            OmdbConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                api_key: None,
            },
            CachedFetcher::new(cache, TtlPolicy::default()),
        )
    }

    async fn run_to_string(command: Command, client: &OmdbClient<MemoryStore>) -> String {
        let mut out = Vec::new();
        run(command, client, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_stats_on_empty_cache() {
        let client = offline_client();
        let output = run_to_string(Command::Stats, &client).await;
        assert!(output.contains("Cached Items: 0"));
        assert!(output.contains("Total Size: 0 B"));
    }

    #[tokio::test]
    async fn test_genres_then_stats_lists_key() {
        let client = offline_client();
        let genres = run_to_string(Command::Genres { tv: false }, &client).await;
        assert!(genres.contains("Science Fiction"));

        let stats = run_to_string(Command::Stats, &client).await;
        assert!(stats.contains("Cached Items: 1"));
        assert!(stats.contains("• genres_movie"));
    }

    #[tokio::test]
    async fn test_get_prints_payload_or_miss() {
        let client = offline_client();
        client
            .fetcher()
            .cache()
            .set("custom", &json!({"titles": ["Batman Begins"]}), Duration::hours(1))
            .unwrap();

        let hit = run_to_string(Command::Get { key: "custom".to_string() }, &client).await;
        assert!(hit.contains("Batman Begins"));

        let miss = run_to_string(Command::Get { key: "absent".to_string() }, &client).await;
        assert!(miss.contains("No fresh entry for 'absent'"));
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let client = offline_client();
        let cache = client.fetcher().cache();
        cache.set("a", &1, Duration::hours(1)).unwrap();
        cache.set("b", &2, Duration::hours(1)).unwrap();

        run_to_string(Command::Remove { key: "a".to_string() }, &client).await;
        assert_eq!(cache.stats().keys, vec!["b"]);

        let output = run_to_string(Command::Clear, &client).await;
        assert!(output.contains("Cleared 1 entries"));
    }

    #[tokio::test]
    async fn test_home_survives_failed_rows() {
        let client = offline_client();
        let output = run_to_string(Command::Home, &client).await;
        assert!(output.contains("Popular (0 results, 0 pages)"));
        assert!(output.contains("Trending (0 results, 0 pages)"));
    }

    #[tokio::test]
    async fn test_search_without_key_or_cache_fails() {
        let client = offline_client();
        let mut out = Vec::new();
        let result = run(
            Command::Search {
                query: vec!["batman".to_string()],
                tv: false,
            },
            &client,
            &mut out,
        )
        .await;
        assert!(matches!(result, Err(AppError::Omdb(OmdbError::MissingApiKey))));
    }

    #[tokio::test]
    async fn test_top_rated_tv_lists_cached_series() {
        let client = offline_client();
        let body = json!({
            "Search": [{"Title": "The Sopranos", "Year": "1999–2007", "imdbRating": "9.2"}],
            "totalResults": "3",
            "Response": "True"
        });
        client
            .fetcher()
            .cache()
            .set("top_rated_tv_Sopranos", &body, Duration::hours(1))
            .unwrap();

        let output = run_to_string(
            Command::TopRated {
                term: Some("Sopranos".to_string()),
                tv: true,
            },
            &client,
        )
        .await;
        assert!(output.contains("Top Rated TV (3 results, 1 pages)"));
        assert!(output.contains("1. The Sopranos (1999) ★ 9.2"));
    }
}
