//! Multi-source aggregation with ranked fallback and cached read-through.
//!
//! For each signal family the aggregator walks its sources in priority order.
//! Every rank first gets a free fresh-cache read; network fetches are only
//! issued until the family has one fresh result (lazy fallback), and a fetch
//! failure falls back to that rank's stale cache entry when one exists.
//! The per-rank outcomes are then compacted rank-order-preserving: the primary
//! slot is the highest-ranked slot that produced anything at all, fresh or
//! stale.
//!
//! The whole family fails only when no rank yields either, which callers see
//! as [`AllSourcesUnavailable`].

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::cache::{CacheKey, TtlCache};
use crate::services::sources::{
    AuroraProvider, AuroraReading, Coordinate, FetchSource, SourceError, WeatherProvider,
    WeatherReading,
};

/// At most this many ranks are consulted per family.
const MAX_RANKS: usize = 3;

/// Every configured rank for a family produced neither a fresh nor a stale
/// result.
#[derive(Debug, thiserror::Error)]
#[error("all {family} sources unavailable")]
pub struct AllSourcesUnavailable {
    pub family: &'static str,
}

/// A reading plus whether it was served past its TTL because the source was
/// unreachable at refresh time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourcedReading<T> {
    #[serde(flatten)]
    pub reading: T,
    /// True when this value outlived its TTL and the refresh failed
    pub stale: bool,
}

/// Combined per-family result: up to three readings in promoted rank order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AggregateResult<T> {
    pub primary: SourcedReading<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SourcedReading<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tertiary: Option<SourcedReading<T>>,
}

/// Compact ordered per-rank outcomes into (primary, secondary, tertiary),
/// preserving rank order and skipping absent ranks.
fn promote<T>(slots: Vec<Option<T>>) -> Option<(T, Option<T>, Option<T>)> {
    let mut present = slots.into_iter().flatten();
    let primary = present.next()?;
    Some((primary, present.next(), present.next()))
}

/// Aggregates aurora and weather readings over ranked sources with a shared,
/// injected cache store per family.
pub struct DataAggregator<A, W> {
    aurora_sources: Vec<A>,
    weather_sources: Vec<W>,
    aurora_cache: TtlCache<AuroraReading>,
    weather_cache: TtlCache<WeatherReading>,
}

/// The aggregator as wired in production.
pub type AppAggregator = DataAggregator<AuroraProvider, WeatherProvider>;

impl<A, W> DataAggregator<A, W>
where
    A: FetchSource<Reading = AuroraReading>,
    W: FetchSource<Reading = WeatherReading>,
{
    pub fn new(
        aurora_sources: Vec<A>,
        weather_sources: Vec<W>,
        aurora_cache: TtlCache<AuroraReading>,
        weather_cache: TtlCache<WeatherReading>,
    ) -> Self {
        Self {
            aurora_sources,
            weather_sources,
            aurora_cache,
            weather_cache,
        }
    }

    /// Aurora readings for a coordinate, best source first.
    pub async fn get_aurora(
        &self,
        coord: Coordinate,
    ) -> Result<AggregateResult<AuroraReading>, AllSourcesUnavailable> {
        aggregate_family("aurora", &self.aurora_sources, &self.aurora_cache, coord).await
    }

    /// Weather readings for a coordinate, best source first.
    pub async fn get_weather(
        &self,
        coord: Coordinate,
    ) -> Result<AggregateResult<WeatherReading>, AllSourcesUnavailable> {
        aggregate_family("weather", &self.weather_sources, &self.weather_cache, coord).await
    }
}

/// Walk a family's ranked sources, performing a cached read-through per rank.
async fn aggregate_family<S: FetchSource>(
    family: &'static str,
    sources: &[S],
    cache: &TtlCache<S::Reading>,
    coord: Coordinate,
) -> Result<AggregateResult<S::Reading>, AllSourcesUnavailable> {
    let mut slots: Vec<Option<SourcedReading<S::Reading>>> = Vec::with_capacity(MAX_RANKS);
    let mut have_fresh = false;

    for (rank, source) in sources.iter().enumerate().take(MAX_RANKS) {
        let key = CacheKey::new(coord.lat(), coord.lon(), rank as u8);

        if let Some(value) = cache.get_fresh(key).await {
            tracing::debug!(
                "using cached {} reading from {} (rank {})",
                family,
                source.source_id(),
                rank
            );
            slots.push(Some(SourcedReading {
                reading: value,
                stale: false,
            }));
            have_fresh = true;
            continue;
        }

        // A fresh result already exists for this family; lower ranks get the
        // cache read above but no network call of their own.
        if have_fresh {
            slots.push(None);
            continue;
        }

        match source.fetch(coord).await {
            Ok(reading) => {
                tracing::info!(
                    "fetched {} reading from {} (rank {})",
                    family,
                    source.source_id(),
                    rank
                );
                cache.insert(key, reading.clone()).await;
                slots.push(Some(SourcedReading {
                    reading,
                    stale: false,
                }));
                have_fresh = true;
            }
            Err(err) => {
                match &err {
                    SourceError::Data { .. } => {
                        tracing::error!("{} source failed: {}", family, err)
                    }
                    SourceError::Unavailable { .. } => {
                        tracing::warn!("{} source failed: {}", family, err)
                    }
                }
                if let Some(value) = cache.get_stale(key).await {
                    tracing::warn!(
                        "{} unreachable, serving stale cached {} reading (rank {})",
                        source.source_id(),
                        family,
                        rank
                    );
                    slots.push(Some(SourcedReading {
                        reading: value,
                        stale: true,
                    }));
                } else {
                    slots.push(None);
                }
            }
        }
    }

    let (primary, secondary, tertiary) =
        promote(slots).ok_or(AllSourcesUnavailable { family })?;
    Ok(AggregateResult {
        primary,
        secondary,
        tertiary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn reading(source: &str) -> AuroraReading {
        AuroraReading {
            source: source.to_string(),
            kp_index: 4.0,
            probability: Some(30.0),
            observed_at: Utc::now(),
        }
    }

    fn weather_reading(source: &str) -> WeatherReading {
        WeatherReading {
            source: source.to_string(),
            cloud_cover_pct: 20.0,
            visibility_km: 25.0,
            precipitation_mm_per_h: 0.0,
            temperature_c: Some(-3.0),
            observed_at: Utc::now(),
        }
    }

    /// Scriptable source: fails while `failing` is set, counts every fetch.
    struct StubSource {
        id: &'static str,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn ok(id: &'static str) -> Self {
            Self {
                id,
                failing: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(id: &'static str) -> Self {
            Self {
                id,
                failing: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FetchSource for StubSource {
        type Reading = AuroraReading;

        fn source_id(&self) -> &'static str {
            self.id
        }

        async fn fetch(&self, _coord: Coordinate) -> Result<AuroraReading, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(SourceError::unavailable(self.id, "stubbed outage"))
            } else {
                Ok(reading(self.id))
            }
        }
    }

    /// Weather twin of StubSource so DataAggregator's two generics resolve.
    struct StubWeather;

    impl FetchSource for StubWeather {
        type Reading = WeatherReading;

        fn source_id(&self) -> &'static str {
            "stub_weather"
        }

        async fn fetch(&self, _coord: Coordinate) -> Result<WeatherReading, SourceError> {
            Ok(weather_reading("stub_weather"))
        }
    }

    fn coord() -> Coordinate {
        Coordinate::new(55.7, 13.4).unwrap()
    }

    #[test]
    fn test_promote_all_present() {
        let (p, s, t) = promote(vec![Some(1), Some(2), Some(3)]).unwrap();
        assert_eq!((p, s, t), (1, Some(2), Some(3)));
    }

    #[test]
    fn test_promote_rank_one_missing() {
        // [unavailable, available, available] → former rank 2 becomes primary,
        // former rank 3 becomes secondary
        let (p, s, t) = promote(vec![None, Some(2), Some(3)]).unwrap();
        assert_eq!((p, s, t), (2, Some(3), None));
    }

    #[test]
    fn test_promote_only_tertiary() {
        let (p, s, t) = promote(vec![None, None, Some(3)]).unwrap();
        assert_eq!((p, s, t), (3, None, None));
    }

    #[test]
    fn test_promote_gap_in_middle() {
        let (p, s, t) = promote(vec![Some(1), None, Some(3)]).unwrap();
        assert_eq!((p, s, t), (1, Some(3), None));
    }

    #[test]
    fn test_promote_all_absent() {
        assert!(promote::<u32>(vec![None, None, None]).is_none());
        assert!(promote::<u32>(vec![]).is_none());
    }

    #[tokio::test]
    async fn test_rank_one_success_short_circuits_lower_ranks() {
        let sources = vec![StubSource::ok("first"), StubSource::ok("second")];
        let cache = TtlCache::new(300);

        let result = aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();

        assert_eq!(result.primary.reading.source, "first");
        assert!(result.secondary.is_none());
        assert_eq!(sources[0].call_count(), 1);
        assert_eq!(sources[1].call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_rank_promotes_next() {
        let sources = vec![StubSource::failing("first"), StubSource::ok("second")];
        let cache = TtlCache::new(300);

        let result = aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();

        assert_eq!(result.primary.reading.source, "second");
        assert!(!result.primary.stale);
        assert!(result.secondary.is_none());
        assert!(result.tertiary.is_none());
    }

    #[tokio::test]
    async fn test_cached_value_prevents_second_fetch() {
        let sources = vec![StubSource::ok("first")];
        let cache = TtlCache::new(300);

        aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();
        aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();

        assert_eq!(sources[0].call_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_exactly_one_refresh() {
        let sources = vec![StubSource::ok("first")];
        // TTL 0: everything stored is immediately expired
        let cache = TtlCache::new(0);

        aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();
        aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();

        assert_eq!(sources[0].call_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_served_when_refresh_fails() {
        let sources = vec![StubSource::ok("first")];
        let cache = TtlCache::new(0);

        let first = aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();
        assert!(!first.primary.stale);

        sources[0].failing.store(true, Ordering::SeqCst);
        let second = aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();

        assert!(second.primary.stale);
        assert_eq!(second.primary.reading.source, "first");
        assert_eq!(sources[0].call_count(), 2);
    }

    #[tokio::test]
    async fn test_all_sources_unavailable() {
        let sources = vec![StubSource::failing("first"), StubSource::failing("second")];
        let cache = TtlCache::new(300);

        let err = aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap_err();
        assert_eq!(err.family, "aurora");
        assert_eq!(sources[0].call_count(), 1);
        assert_eq!(sources[1].call_count(), 1);
    }

    #[tokio::test]
    async fn test_fourth_rank_is_never_consulted() {
        let sources = vec![
            StubSource::failing("a"),
            StubSource::failing("b"),
            StubSource::failing("c"),
            StubSource::ok("d"),
        ];
        let cache = TtlCache::new(300);

        let err = aggregate_family("aurora", &sources, &cache, coord()).await;
        assert!(err.is_err());
        assert_eq!(sources[3].call_count(), 0);
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_cache_entries() {
        let sources = vec![StubSource::ok("first")];
        let cache = TtlCache::new(300);

        aggregate_family(
            "aurora",
            &sources,
            &cache,
            Coordinate::new(55.701, 13.399).unwrap(),
        )
        .await
        .unwrap();
        aggregate_family(
            "aurora",
            &sources,
            &cache,
            Coordinate::new(55.699, 13.401).unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(sources[0].call_count(), 1);
    }

    // --- End-to-end over real providers and a mock upstream ---

    use crate::services::auroras_live::AurorasLiveClient;
    use crate::services::noaa::NoaaClient;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_rank_one_failure_promotes_rank_two() {
        let noaa_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&noaa_server)
            .await;

        let live_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "kp": 4.2, "probability": 31.0 })),
            )
            .mount(&live_server)
            .await;

        let sources = vec![
            crate::services::sources::AuroraProvider::Noaa(
                NoaaClient::new(reqwest::Client::new()).with_base_url(noaa_server.uri()),
            ),
            crate::services::sources::AuroraProvider::AurorasLive(
                AurorasLiveClient::new(reqwest::Client::new()).with_base_url(live_server.uri()),
            ),
        ];
        let cache = TtlCache::new(300);

        let result = aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();

        assert_eq!(result.primary.reading.source, "auroras_live");
        assert!(!result.primary.stale);
        assert!(result.secondary.is_none());
    }

    #[tokio::test]
    async fn test_http_second_request_served_from_cache() {
        let live_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "kp": 2.0 })),
            )
            .expect(1)
            .mount(&live_server)
            .await;

        let sources = vec![crate::services::sources::AuroraProvider::AurorasLive(
            AurorasLiveClient::new(reqwest::Client::new()).with_base_url(live_server.uri()),
        )];
        let cache = TtlCache::new(300);

        aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();
        let second = aggregate_family("aurora", &sources, &cache, coord())
            .await
            .unwrap();

        assert_eq!(second.primary.reading.kp_index, 2.0);
        // MockServer verifies expect(1) on drop
    }

    #[tokio::test]
    async fn test_aggregator_families_are_independent() {
        let aggregator = DataAggregator::new(
            vec![StubSource::ok("aurora_stub")],
            vec![StubWeather],
            TtlCache::new(300),
            TtlCache::new(1800),
        );

        let aurora = aggregator.get_aurora(coord()).await.unwrap();
        let weather = aggregator.get_weather(coord()).await.unwrap();

        assert_eq!(aurora.primary.reading.source, "aurora_stub");
        assert_eq!(weather.primary.reading.source, "stub_weather");
    }
}
