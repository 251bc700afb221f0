mod common;

use std::fs;
use std::sync::Arc;

use common::{catalog_with_tiers, fixture_family, glyph, A_SHAPE};
use glyphmatch::{
    build_catalog, decode_book, decode_glyphs, BatchError, CancelToken, CatalogConfig,
    CatalogError, ConfigLoadError, DispatchConfig, FontFamily, GlyphId, GlyphMatcher,
    GlyphmatchConfig, MatchError, MatchMode, MatchStatus, MatcherConfig, OutlineFont,
    PipelineError, ReferenceFont, Style, Tier, UnresolvedReason,
};

#[test]
fn unrenderable_glyph_is_unresolved_not_fatal() {
    let glyphs = vec![glyph("ok", A_SHAPE), glyph("empty", "")];
    let report = decode_glyphs(
        &glyphs,
        catalog_with_tiers(vec![Tier::T128]),
        MatcherConfig::new(MatchMode::Standard),
        DispatchConfig::default(),
        &CancelToken::new(),
    )
    .expect("per-glyph failures do not abort the run");

    let empty = report.mapping.get(&GlyphId::from("empty")).expect("entry");
    assert_eq!(empty.status, MatchStatus::Unresolved);
    assert!(matches!(
        empty.reason,
        Some(UnresolvedReason::InvalidOutline { .. })
    ));
    assert_eq!(report.summary.accepted, 1);
}

#[test]
fn family_without_requested_styles_aborts_catalog_build() {
    let cfg = CatalogConfig::default().with_styles(vec![Style::Bold, Style::Italic]);
    let err = build_catalog(&fixture_family(), &cfg, None).expect_err("no usable style");
    assert!(matches!(
        err,
        PipelineError::Catalog(CatalogError::NoUsableStyle { .. })
    ));
}

#[test]
fn missing_styles_are_reported_but_not_fatal() {
    let report = decode_glyphs(
        &[glyph("g", A_SHAPE)],
        common::fixture_catalog(),
        MatcherConfig::default(),
        DispatchConfig::default(),
        &CancelToken::new(),
    )
    .expect("decode");
    assert!(report.missing_styles.contains(&Style::Bold));
    assert!(!report.missing_styles.contains(&Style::Regular));
}

#[test]
fn family_with_no_fonts_is_rejected() {
    let err = FontFamily::from_fonts("Nothing", Vec::<(Style, Arc<dyn ReferenceFont>)>::new())
        .expect_err("no fonts");
    assert!(matches!(err, CatalogError::NoUsableStyle { .. }));
}

#[test]
fn font_without_selected_characters_yields_an_empty_catalog() {
    let font = OutlineFont::new("Greek Only")
        .with_glyph('\u{03A9}', A_SHAPE)
        .expect("outline");
    let family = FontFamily::from_fonts(
        "Greek Only",
        [(Style::Regular, Arc::new(font) as Arc<dyn ReferenceFont>)],
    )
    .expect("family");
    let err = build_catalog(&family, &CatalogConfig::default(), None).expect_err("empty");
    assert!(matches!(
        err,
        PipelineError::Catalog(CatalogError::EmptyCatalog { tier: Tier::T128, .. })
    ));
}

#[test]
fn full_mode_on_curated_catalog_is_a_config_error() {
    let err = GlyphMatcher::new(
        catalog_with_tiers(vec![Tier::T128]),
        MatcherConfig::new(MatchMode::Full),
    )
    .expect_err("full mode needs a full catalog");
    assert!(matches!(err, MatchError::InvalidConfig(_)));
}

#[test]
fn fixed_tier_outside_catalog_is_rejected() {
    let err = GlyphMatcher::new(
        catalog_with_tiers(vec![Tier::T128]),
        MatcherConfig::new(MatchMode::Standard).with_fixed_tier(Tier::T512),
    )
    .expect_err("unknown tier");
    assert_eq!(err, MatchError::Catalog(CatalogError::UnknownTier(Tier::T512)));
}

#[test]
fn config_errors_are_reported_before_any_work() {
    assert!(matches!(
        GlyphmatchConfig::from_yaml("version: \"9\"\n"),
        Err(ConfigLoadError::UnsupportedVersion(v)) if v == "9"
    ));
    assert!(matches!(
        GlyphmatchConfig::from_yaml("version: \"1.0\"\nmatching:\n  mode: sideways\n"),
        Err(ConfigLoadError::Validation(_))
    ));
    assert!(matches!(
        GlyphmatchConfig::from_yaml("version: [\n"),
        Err(ConfigLoadError::YamlParse(_))
    ));
}

#[test]
fn book_without_batches_fails_to_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = decode_book(&GlyphmatchConfig::default(), dir.path(), &CancelToken::new())
        .expect_err("no batches");
    assert!(matches!(err, PipelineError::Batch(BatchError::NoBatches(_))));
}

#[test]
fn book_without_installed_fonts_fails_at_discovery() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = dir.path().join("batch_0");
    fs::create_dir_all(&batch).expect("batch dir");
    fs::write(
        batch.join("glyphs.json"),
        serde_json::json!({ "glyphs": [{ "id": 1, "path": A_SHAPE }] }).to_string(),
    )
    .expect("write batch");
    let fonts = dir.path().join("fonts");
    fs::create_dir_all(&fonts).expect("fonts dir");

    let mut cfg = GlyphmatchConfig::default();
    cfg.catalog.fonts_dir = fonts;
    let err = decode_book(&cfg, dir.path(), &CancelToken::new()).expect_err("no fonts");
    assert!(matches!(err, PipelineError::Catalog(_)), "{err}");
    assert!(!dir.path().join("ttf_character_mapping.json").exists());
}
