//! Index rebuild: retrievability and row-namespace invariants at scale

use hibikido_common::db::Database;
use hibikido_server::embedding;
use hibikido_server::engine::{HitDocument, RetrievalEngine, SegmentIngest};
use hibikido_server::index::VectorIndex;
use std::collections::HashSet;

const TEXTURES: [&str; 10] = [
    "amber", "brittle", "cavernous", "droning", "ethereal", "fractured", "granular", "hollow",
    "iridescent", "jagged",
];
const SOURCES: [&str; 5] = ["bell", "wind", "ember", "thunder", "tide"];

async fn test_engine() -> (RetrievalEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let index_file = dir.path().join("rebuild.index");
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let embedder = embedding::create("feature-hash").unwrap();
    let index = VectorIndex::load_or_create(&index_file, embedder.dim()).unwrap();
    (RetrievalEngine::new(db, embedder, index, index_file), dir)
}

#[tokio::test]
async fn rebuild_preserves_retrievability_of_fifty_segments() {
    let (engine, _dir) = test_engine().await;
    let db = engine.db();
    db.add_recording("test/archive.wav", "session archive").await.unwrap();
    db.add_segmentation("manual", "manual", "{}", "").await.unwrap();

    // 50 distinct two-word descriptions
    let mut recorded = Vec::new();
    for (i, texture) in TEXTURES.iter().enumerate() {
        for (j, source) in SOURCES.iter().enumerate() {
            let description = format!("{} {}", texture, source);
            let span = (i * 5 + j) as f64;
            let segment = engine
                .ingest_segment(SegmentIngest {
                    source_path: "test/archive.wav".to_string(),
                    segmentation_id: "manual".to_string(),
                    start: span / 51.0,
                    end: (span + 1.0) / 51.0,
                    description: description.clone(),
                    freq_low: None,
                    freq_high: None,
                    duration: None,
                })
                .await
                .unwrap();
            recorded.push((segment.id, description));
        }
    }

    let stats = engine.rebuild_index().await.unwrap();
    assert_eq!(stats.segments, 50);
    assert_eq!(stats.errors, 0);
    assert_eq!(engine.embeddings().await, 50);

    // Every description still retrieves its own segment at rank 1
    for (id, description) in &recorded {
        let hits = engine.search(description, 5, 0.0).await.unwrap();
        assert!(!hits.is_empty(), "no hits for '{}'", description);
        match &hits[0].document {
            HitDocument::Segment(segment) => {
                assert_eq!(&segment.id, id, "wrong rank-1 for '{}'", description)
            }
            other => panic!("unexpected hit: {:?}", other),
        }
    }
}

#[tokio::test]
async fn rebuild_rows_cover_the_index_exactly() {
    let (engine, _dir) = test_engine().await;

    for (path, desc) in [
        ("sounds/a.wav", "forest wind"),
        ("sounds/b.wav", "deep bell"),
        ("sounds/c.wav", "crackling embers"),
        ("sounds/d.wav", "rolling thunder"),
    ] {
        engine.ingest_recording(path, desc).await.unwrap();
    }
    engine
        .ingest_effect("effects/reverb.dll", "Reverb", "cavernous tail")
        .await
        .unwrap();
    engine
        .ingest_effect("effects/delay.dll", "Delay", "echoing repeats")
        .await
        .unwrap();

    engine.rebuild_index().await.unwrap();

    let mut rows = HashSet::new();
    for segment in engine.db().all_segments().await.unwrap() {
        assert!(rows.insert(segment.vector_row.unwrap()), "duplicate row");
    }
    for preset in engine.db().all_presets().await.unwrap() {
        assert!(rows.insert(preset.vector_row.unwrap()), "duplicate row");
    }

    let size = engine.embeddings().await as i64;
    assert_eq!(rows.len() as i64, size);
    assert_eq!(rows, (0..size).collect::<HashSet<_>>());

    // A second rebuild reproduces the same assignment
    let before: Vec<_> = engine
        .db()
        .all_segments()
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s.vector_row))
        .collect();
    engine.rebuild_index().await.unwrap();
    let after: Vec<_> = engine
        .db()
        .all_segments()
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s.vector_row))
        .collect();
    assert_eq!(before, after);
}
