use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glyphmatch::{
    build_catalog, decode_glyphs, CancelToken, CatalogConfig, DispatchConfig, FontFamily,
    GlyphMetrics, GlyphOutline, HashConfig, MatchMode, MatcherConfig, OutlineFont, RasterConfig,
    ReferenceFont, Style, Tier,
};
use perceptual::{hash_raster, score, SimilarityConfig};
use raster::rasterize;

const A_SHAPE: &str = "M 0 1000 L 400 0 L 600 0 L 1000 1000 L 780 1000 L 680 720 L 320 720 L 220 1000 Z M 380 560 L 620 560 L 500 220 Z";
const B_SHAPE: &str = "M 0 0 L 600 0 C 900 0 900 480 650 500 C 950 520 950 1000 600 1000 L 0 1000 Z M 200 160 L 200 420 L 560 420 L 560 160 Z M 200 580 L 200 840 L 600 840 L 600 580 Z";
const SEVEN_SHAPE: &str = "M 0 0 L 900 0 L 900 160 L 420 1000 L 220 1000 L 680 160 L 0 160 Z";
const O_SHAPE: &str =
    "M 0 0 L 800 0 L 800 1000 L 0 1000 Z M 200 200 L 200 800 L 600 800 L 600 200 Z";
const T_SHAPE: &str =
    "M 0 0 L 800 0 L 800 200 L 500 200 L 500 1000 L 300 1000 L 300 200 L 0 200 Z";

const SHAPES: [(char, &str); 5] = [
    ('A', A_SHAPE),
    ('B', B_SHAPE),
    ('7', SEVEN_SHAPE),
    ('O', O_SHAPE),
    ('T', T_SHAPE),
];

fn bench_family() -> FontFamily {
    let mut font = OutlineFont::new("Bench Regular");
    for (character, svg) in SHAPES {
        font.insert(character, svg).expect("bench outline");
    }
    FontFamily::from_fonts(
        "Bench",
        [(Style::Regular, Arc::new(font) as Arc<dyn ReferenceFont>)],
    )
    .expect("bench family")
}

fn bench_glyphs(len: usize) -> Vec<GlyphOutline> {
    (0..len)
        .map(|i| {
            let (_, svg) = SHAPES[i % SHAPES.len()];
            GlyphOutline::from_svg(format!("g{i}").into(), svg, GlyphMetrics::default())
                .expect("bench glyph")
        })
        .collect()
}

fn raster_bench(c: &mut Criterion) {
    let outline = &bench_glyphs(1)[0];
    let cfg = RasterConfig::default();
    for tier in Tier::default_ladder() {
        c.bench_function(&format!("rasterize_{}", tier.side()), |b| {
            b.iter(|| {
                let image = rasterize(black_box(outline), tier, &cfg).expect("rasterize");
                black_box(image);
            });
        });
    }
}

fn perceptual_bench(c: &mut Criterion) {
    let glyphs = bench_glyphs(2);
    let raster_cfg = RasterConfig::default();
    let a = rasterize(&glyphs[0], Tier::T256, &raster_cfg).expect("rasterize a");
    let b_img = rasterize(&glyphs[1], Tier::T256, &raster_cfg).expect("rasterize b");
    let hash_cfg = HashConfig::default();
    let sim_cfg = SimilarityConfig::default();

    c.bench_function("hash_raster_256", |b| {
        b.iter(|| black_box(hash_raster(black_box(&a), &hash_cfg).expect("hash")));
    });
    c.bench_function("score_256", |b| {
        b.iter(|| black_box(score(black_box(&a), black_box(&b_img), &sim_cfg).expect("score")));
    });
}

fn catalog_bench(c: &mut Criterion) {
    let family = bench_family();
    let cfg = CatalogConfig::default();
    c.bench_function("catalog_build_default_ladder", |b| {
        b.iter(|| {
            let catalog = build_catalog(black_box(&family), &cfg, None).expect("catalog");
            black_box(catalog);
        });
    });
}

fn pipeline_bench(c: &mut Criterion) {
    let catalog = build_catalog(&bench_family(), &CatalogConfig::default(), None)
        .expect("catalog");
    let glyphs = bench_glyphs(64);

    for mode in [MatchMode::Fast, MatchMode::Standard, MatchMode::Progressive] {
        c.bench_function(&format!("decode_64_glyphs_{}", mode.as_str()), |b| {
            b.iter(|| {
                let report = decode_glyphs(
                    black_box(&glyphs),
                    catalog.clone(),
                    MatcherConfig::new(mode),
                    DispatchConfig::default(),
                    &CancelToken::new(),
                )
                .expect("decode");
                black_box(report);
            });
        });
    }
}

criterion_group!(
    benches,
    raster_bench,
    perceptual_bench,
    catalog_bench,
    pipeline_bench
);
criterion_main!(benches);
