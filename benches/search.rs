use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use menu_search::layout::ru_to_latin;
use menu_search::{Catalog, MenuSearch, SearchConfig, trigrams};

fn uncached() -> MenuSearch {
    MenuSearch::with_config(
        Catalog::builtin().clone(),
        SearchConfig {
            result_cache: 0,
            ..SearchConfig::default()
        },
    )
}

fn bench_rank(c: &mut Criterion) {
    let search = uncached();
    // Warm the trigram caches so only steady-state ranking is measured.
    let _ = search.rank("прогрев");
    const QUERIES: &[&str] = &["т", "gt", "визит", "gtxfnm", "ламинерование", "гравировка на жетонах"];
    for &query in QUERIES {
        c.bench_with_input(BenchmarkId::new("rank", query), &query, |b, &query| {
            b.iter(|| black_box(search.rank(query).len()));
        });
    }
}

fn bench_rank_cached(c: &mut Criterion) {
    let search = MenuSearch::builtin();
    c.bench_function("rank_cached::gtxfnm", |b| {
        b.iter(|| black_box(search.rank("gtxfnm").len()));
    });
}

fn bench_building_blocks(c: &mut Criterion) {
    let text = "Полиграфическая верстка любой сложности";
    c.bench_function("trigrams::long_entry", |b| {
        b.iter(|| black_box(trigrams(black_box(text)).len()));
    });
    c.bench_function("layout::ru_to_latin", |b| {
        b.iter(|| black_box(ru_to_latin(black_box(text))));
    });
}

criterion_group!(
    benches,
    bench_rank,
    bench_rank_cached,
    bench_building_blocks
);
criterion_main!(benches);
