//! Engine-level behaviour: ranking, feedback, persistence and recovery.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use mood_recommender::config::AppConfig;
use mood_recommender::engine::{FeedbackError, Restored};
use mood_recommender::index::{IndexError, SnapshotPaths};
use mood_recommender::ranker::RankError;
use mood_recommender::{
    ActionKind, Emotion, EmotionVector, RankRequest, RecommendationEngine, TitleCatalog,
    TitleKind, TitleRecord,
};

const DIMS: usize = 64;

fn config(data_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.embedding.dimensions = DIMS;
    config.storage.data_dir = data_dir.to_path_buf();
    config
}

fn affinity(weights: &[(Emotion, f32)]) -> EmotionVector {
    let map: BTreeMap<Emotion, f32> = weights.iter().copied().collect();
    EmotionVector::try_from(map).unwrap()
}

/// Joy-heavy A, sadness-heavy B and neutral C, with comparable text
fn seed(engine: &RecommendationEngine) {
    let titles = [
        TitleRecord::new("a", TitleKind::Movie, "Title A")
            .with_synopsis("A story about two neighbours and a garden")
            .with_genres(["Drama"])
            .with_emotion_affinity(affinity(&[(Emotion::Happy, 0.8), (Emotion::Excited, 0.2)])),
        TitleRecord::new("b", TitleKind::Movie, "Title B")
            .with_synopsis("A story about two neighbours and a river")
            .with_genres(["Drama"])
            .with_emotion_affinity(affinity(&[(Emotion::Sad, 0.8), (Emotion::Lonely, 0.2)])),
        TitleRecord::new("c", TitleKind::Series, "Title C")
            .with_synopsis("A story about two neighbours and a bakery")
            .with_genres(["Drama"])
            .with_emotion_affinity(EmotionVector::one_hot(Emotion::Neutral)),
    ];
    for title in titles {
        engine.ingest_title(title).unwrap();
    }
}

fn ids(recs: &mood_recommender::Recommendations) -> Vec<String> {
    recs.results.iter().map(|r| r.title_id.clone()).collect()
}

#[test]
fn test_sad_mood_ranks_sad_title_first() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&engine);

    let recs = engine
        .rank(&RankRequest::for_user("viewer").with_mood("I feel so sad and lonely tonight"))
        .unwrap();

    assert_eq!(recs.results[0].title_id, "b");
    let emotion_of = |id: &str| {
        recs.results
            .iter()
            .find(|r| r.title_id == id)
            .map(|r| r.components.emotion)
            .unwrap()
    };
    assert!(emotion_of("b") > emotion_of("a"));
    assert!(emotion_of("b") > emotion_of("c"));
    assert!(recs.degraded.is_empty());
}

#[test]
fn test_cold_user_has_zero_collaborative() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&engine);

    let recs = engine
        .rank(&RankRequest::for_user("fresh").with_mood("something calm"))
        .unwrap();
    assert_eq!(recs.results.len(), 3);
    for result in &recs.results {
        assert_eq!(result.components.collaborative, 0.0);
    }
}

#[test]
fn test_repeated_likes_raise_collaborative_score() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&engine);
    let title = engine.catalog().get("a").unwrap();

    let mut last = engine.profile("u").unwrap().collaborative_score(&title.embedding);
    for _ in 0..30 {
        engine.apply_feedback("u", "a", ActionKind::Liked, 1.0).unwrap();
        let score = engine.profile("u").unwrap().collaborative_score(&title.embedding);
        assert!(score >= last - 1e-6);
        last = score;
    }
    assert!(last > 0.9);
}

#[test]
fn test_dislike_moves_profile_less_than_like() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&engine);

    engine.apply_feedback("fan", "b", ActionKind::Liked, 0.7).unwrap();
    engine.apply_feedback("critic", "b", ActionKind::Disliked, 0.7).unwrap();

    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let liked = engine.profile("fan").unwrap();
    let disliked = engine.profile("critic").unwrap();
    assert!(norm(&disliked.preference) > 0.0);
    assert!(norm(&disliked.preference) < norm(&liked.preference));
}

#[test]
fn test_feedback_for_unknown_title() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&engine);

    let err = engine
        .apply_feedback("u", "zzz", ActionKind::Liked, 1.0)
        .unwrap_err();
    assert!(matches!(err, FeedbackError::UnknownTitle(id) if id == "zzz"));
    assert!(engine.profile("u").unwrap().is_cold());
}

#[test]
fn test_watched_titles_are_excluded() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&engine);
    engine.apply_feedback("u", "b", ActionKind::Viewed, 1.0).unwrap();

    let request = RankRequest::for_user("u").with_mood("sad").excluding_watched();
    let recs = engine.rank(&request).unwrap();
    assert!(!ids(&recs).contains(&"b".to_string()));
}

#[tokio::test]
async fn test_concurrent_identical_feedback_is_order_independent() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(RecommendationEngine::in_memory(config(dir.path())).unwrap());
    seed(&engine);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || {
                engine.apply_feedback("u", "a", ActionKind::Liked, 0.9)
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let sequential = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&sequential);
    for _ in 0..8 {
        sequential
            .apply_feedback("u", "a", ActionKind::Liked, 0.9)
            .unwrap();
    }

    let concurrent = engine.profile("u").unwrap();
    let expected = sequential.profile("u").unwrap();
    assert_eq!(concurrent.update_count, 8);
    assert_eq!(concurrent.version, expected.version);
    for (x, y) in concurrent.preference.iter().zip(&expected.preference) {
        assert!((x - y).abs() < 1e-6);
    }
    assert_eq!(concurrent.emotion_affinity, expected.emotion_affinity);
}

#[tokio::test]
async fn test_concurrent_mixed_feedback_matches_replay() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(RecommendationEngine::open(config(dir.path())).unwrap());
    seed(&engine);

    let feedback: [(&'static str, ActionKind, f32); 4] = [
        ("a", ActionKind::Liked, 1.0),
        ("b", ActionKind::Disliked, 0.8),
        ("c", ActionKind::Rated, 0.6),
        ("b", ActionKind::AddedToList, 0.9),
    ];
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let (title, action, strength) = feedback[i % feedback.len()];
            tokio::task::spawn_blocking(move || {
                engine.apply_feedback("u", title, action, strength)
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let incremental = engine.profile("u").unwrap();
    engine.recompute_profile("u").unwrap();
    let replayed = engine.profile("u").unwrap();

    assert_eq!(replayed.update_count, 16);
    assert_eq!(replayed.update_count, incremental.update_count);
    for (x, y) in replayed.preference.iter().zip(&incremental.preference) {
        assert!((x - y).abs() < 1e-6);
    }
    let affinity = |p: &mood_recommender::profile::UserTasteProfile| {
        p.emotion_affinity.as_slice().to_vec()
    };
    for (x, y) in affinity(&replayed).iter().zip(&affinity(&incremental)) {
        assert!((x - y).abs() < 1e-6);
    }
    assert_eq!(replayed.last_updated, incremental.last_updated);
}

#[tokio::test]
async fn test_rank_deadline_times_out() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    seed(&engine);

    let err = engine
        .rank_within(RankRequest::for_user("u").with_mood("happy"), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, RankError::Timeout(_)));

    // shared state is untouched; a normal request still succeeds
    let recs = engine
        .rank_with_timeout(RankRequest::for_user("u").with_mood("happy"))
        .await
        .unwrap();
    assert_eq!(recs.results.len(), 3);
}

#[test]
fn test_persist_and_restore() {
    let dir = TempDir::new().unwrap();
    let request = RankRequest::for_user("u").with_mood("a lonely rainy evening");

    let (before, profile_version) = {
        let engine = RecommendationEngine::open(config(dir.path())).unwrap();
        seed(&engine);
        engine.apply_feedback("u", "c", ActionKind::Liked, 1.0).unwrap();
        let report = engine.persist().unwrap();
        assert_eq!(report.titles, 3);
        assert_eq!(report.index_entries, 3);
        (engine.rank(&request).unwrap(), engine.profile("u").unwrap().version)
    };

    let engine = RecommendationEngine::open(config(dir.path())).unwrap();
    assert_eq!(engine.restore().unwrap(), Restored::Snapshot(3));
    assert_eq!(engine.profile("u").unwrap().version, profile_version);
    assert_eq!(engine.status().interactions, 1);
    assert_eq!(engine.status().profiles_stored, Some(1));

    let after = engine.rank(&request).unwrap();
    assert_eq!(ids(&before), ids(&after));
    for (x, y) in before.results.iter().zip(&after.results) {
        assert!((x.score - y.score).abs() < 1e-4);
    }
}

#[test]
fn test_missing_snapshot_starts_empty() {
    let dir = TempDir::new().unwrap();
    let engine = RecommendationEngine::in_memory(config(dir.path())).unwrap();
    assert!(matches!(engine.load(), Err(IndexError::SnapshotMissing(_))));
    assert_eq!(engine.restore().unwrap(), Restored::Empty);
}

#[test]
fn test_corrupt_snapshot_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    {
        let engine = RecommendationEngine::in_memory(cfg.clone()).unwrap();
        seed(&engine);
        engine.persist().unwrap();
    }

    let paths = SnapshotPaths::new(&cfg.storage.data_dir, &cfg.storage.snapshot_name);
    let mut bytes = std::fs::read(&paths.index).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&paths.index, bytes).unwrap();

    let engine = RecommendationEngine::in_memory(cfg).unwrap();
    assert!(matches!(engine.load(), Err(IndexError::Corruption(_))));
    assert_eq!(engine.restore().unwrap(), Restored::Rebuilt(3));

    let recs = engine
        .rank(&RankRequest::for_user("u").with_mood("sad"))
        .unwrap();
    assert_eq!(recs.results.len(), 3);
}

#[test]
fn test_mismatched_snapshot_leaves_live_state_untouched() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    {
        let engine = RecommendationEngine::in_memory(cfg.clone()).unwrap();
        seed(&engine);
        engine.persist().unwrap();
    }

    // catalog snapshot loses a title the index snapshot still lists
    let paths = SnapshotPaths::new(&cfg.storage.data_dir, &cfg.storage.snapshot_name);
    let titles = TitleCatalog::read_snapshot(&paths.catalog).unwrap();
    let partial = TitleCatalog::new();
    partial.replace_all(titles.into_iter().filter(|t| t.id() != "c"));
    partial.save_to(&paths.catalog).unwrap();

    let engine = RecommendationEngine::in_memory(cfg).unwrap();
    engine
        .ingest_title(TitleRecord::new("live", TitleKind::Movie, "Live Title"))
        .unwrap();

    assert!(matches!(engine.load(), Err(IndexError::Corruption(_))));
    assert_eq!(engine.index_stats().entries, 1);
    assert_eq!(engine.catalog().len(), 1);
    assert!(engine.catalog().contains("live"));
}

#[test]
fn test_template_change_invalidates_snapshot() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    {
        let engine = RecommendationEngine::in_memory(cfg.clone()).unwrap();
        seed(&engine);
        engine.persist().unwrap();
    }

    let mut changed = cfg;
    changed.embedding.leading_cast = 3;
    let engine = RecommendationEngine::in_memory(changed).unwrap();
    assert!(matches!(engine.load(), Err(IndexError::Corruption(_))));
    assert_eq!(engine.restore().unwrap(), Restored::Rebuilt(3));
}
