mod helpers;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use helpers::{fixture, fixture_with, FakeEngine, FakeLoader, FakeTokenizer};
use spark_embed::embedding::{EmbeddingOptions, ModelCache};

#[test]
fn model_is_not_loaded_until_first_use() {
    let f = fixture(512, 4);
    assert_eq!(f.loads.load(Ordering::SeqCst), 0);
    assert!(!f.service.cache().is_loaded());

    f.service.generate_embeddings("", &["canoe".to_string()]).unwrap();

    assert_eq!(f.loads.load(Ordering::SeqCst), 1);
    assert!(f.service.cache().is_loaded());
}

#[test]
fn later_calls_reuse_the_same_handle() {
    let f = fixture(512, 4);
    let first = f.service.cache().ensure_loaded().unwrap();
    let second = f.service.cache().ensure_loaded().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(f.service.cache().load_count(), 1);
    assert_eq!(first.embedding_dimension, 4);
    assert_eq!(first.max_sequence_length, 512);
    assert_eq!(first.output_name, "sentence_embedding");
}

#[test]
fn parallel_first_calls_load_exactly_once() {
    const THREADS: usize = 16;
    // a slow load widens the window in which callers race
    let f = fixture_with(512, 4, EmbeddingOptions::default(), Duration::from_millis(100));
    let service = Arc::new(f.service);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service
                    .generate_embeddings("Boats; toys", &["canoe".to_string(), "kayak".to_string()])
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(f.loads.load(Ordering::SeqCst), 1);
    assert_eq!(service.cache().load_count(), 1);
    for r in &results {
        assert_eq!(r.len(), 4);
        assert_eq!(r, &results[0]);
    }
}

#[test]
fn caches_are_independent_per_instance() {
    let loads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let make = || {
        ModelCache::new(
            "/models/a/model.onnx",
            FakeLoader {
                tokenizer: Arc::new(FakeTokenizer::new(128)),
                engine: Arc::new(FakeEngine::new(3)),
                loads: loads.clone(),
                delay: Duration::ZERO,
            },
        )
    };
    let a = make();
    let b = make();

    a.ensure_loaded().unwrap();
    a.ensure_loaded().unwrap();
    b.ensure_loaded().unwrap();

    assert_eq!(a.load_count(), 1);
    assert_eq!(b.load_count(), 1);
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(a.model_path(), std::path::Path::new("/models/a/model.onnx"));
}
