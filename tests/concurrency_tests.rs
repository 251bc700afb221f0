//! Concurrency and thread safety tests for glyph matching

mod common;

use std::sync::Arc;
use std::thread;

use common::{catalog_with_tiers, fixture_catalog, glyph, stream, A_SHAPE, B_SHAPE, SEVEN_SHAPE};
use glyphmatch::{
    decode_glyphs, CancelToken, DispatchConfig, Dispatcher, GlyphId, GlyphMatcher, MatchError,
    MatchMode, MatcherConfig, PipelineError, Style, Tier,
};

#[test]
fn shared_matcher_answers_the_same_on_every_thread() {
    let matcher = Arc::new(
        GlyphMatcher::new(fixture_catalog(), MatcherConfig::default()).expect("matcher"),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let matcher = Arc::clone(&matcher);
            thread::spawn(move || {
                let (svg, expected) = [(A_SHAPE, 'A'), (B_SHAPE, 'B'), (SEVEN_SHAPE, '7')][i % 3];
                let result = matcher.resolve(&glyph(&format!("t{i}"), svg));
                (expected, result.mapped())
            })
        })
        .collect();

    for handle in handles {
        let (expected, mapped) = handle.join().expect("thread should not panic");
        assert_eq!(mapped, Some((expected, Style::Regular)));
    }
}

#[test]
fn one_catalog_serves_concurrent_runs() {
    let catalog = catalog_with_tiers(vec![Tier::T128, Tier::T256]);
    let glyphs = Arc::new(stream(20));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            let glyphs = Arc::clone(&glyphs);
            thread::spawn(move || {
                decode_glyphs(
                    &glyphs,
                    catalog,
                    MatcherConfig::new(MatchMode::Progressive),
                    DispatchConfig::default().with_workers(2),
                    &CancelToken::new(),
                )
                .expect("decode")
                .mapping
            })
        })
        .collect();

    let mappings: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread should not panic"))
        .collect();
    assert!(mappings.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(mappings[0].len(), 20);
}

#[test]
fn cancelled_run_returns_no_mapping() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = decode_glyphs(
        &stream(12),
        fixture_catalog(),
        MatcherConfig::default(),
        DispatchConfig::default(),
        &cancel,
    )
    .expect_err("cancelled run");
    assert!(matches!(err, PipelineError::Match(MatchError::Cancelled)));
}

#[test]
fn cancel_token_is_visible_across_clones() {
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    thread::spawn(move || remote.cancel())
        .join()
        .expect("thread should not panic");
    assert!(cancel.is_cancelled());
}

#[test]
fn first_occurrence_of_an_id_wins_under_parallel_dispatch() {
    let mut glyphs = stream(30);
    glyphs.push(glyph("s0000", SEVEN_SHAPE));
    let matcher = GlyphMatcher::new(
        fixture_catalog(),
        MatcherConfig::new(MatchMode::Standard),
    )
    .expect("matcher");
    let dispatcher = Dispatcher::new(DispatchConfig::default().with_workers(4).with_batch_size(1))
        .expect("dispatcher");
    assert_eq!(dispatcher.workers(), 4);

    let mapping = dispatcher
        .run(&matcher, &glyphs, &CancelToken::new())
        .expect("run");
    assert_eq!(mapping.len(), 30);
    assert_eq!(
        mapping.get(&GlyphId::from("s0000")).and_then(|r| r.mapped()),
        Some(('A', Style::Regular))
    );
}

#[test]
fn zero_workers_is_rejected() {
    let err = Dispatcher::new(DispatchConfig::default().with_workers(0)).expect_err("zero workers");
    assert!(matches!(err, MatchError::InvalidConfig(_)));
}
