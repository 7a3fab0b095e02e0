use criterion::{black_box, criterion_group, criterion_main, Criterion};
use design_scraper::normalize::{merge_assets, normalize_css, normalize_palette};
use design_scraper::sanitize::sanitize_dom;
use design_scraper::{is_valid_url, result_filename, RequestRecord, ResourceCategory};
use serde_json::{json, Value};
use std::time::Duration;

fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn css_payload() -> Value {
    let patterns: Vec<Value> = (0..40)
        .map(|i| {
            json!({
                "selector": format!(".card-{i}"),
                "styles": {
                    "color": format!("rgb({i}, {}, 200)", i * 3),
                    "font-family": "\"Inter\", system-ui, sans-serif",
                    "display": if i % 4 == 0 { "none" } else { "flex" },
                    "margin": "auto"
                },
                "count": i + 2
            })
        })
        .collect();

    json!({
        "body_styles": {
            "color": "rgb(51, 51, 51)",
            "background-color": "rgb(255, 255, 255)",
            "font-family": "\"Helvetica Neue\", Arial, sans-serif",
            "line-height": "1.5"
        },
        "header_styles": { "position": "sticky", "z-index": 10 },
        "main_content_styles": { "max-width": "1200px", "float": "none" },
        "common_patterns": patterns,
        "responsive_breakpoints": ["(max-width: 768px)", "(max-width: 480px)"],
        "animations": [{ "name": "fade-in" }]
    })
}

fn page_html() -> String {
    let cards: String = (0..200)
        .map(|i| format!("<div class=\"card\"><h2>Item {i}</h2><p>Body</p><!-- c{i} --></div>"))
        .collect();

    format!(
        "<!DOCTYPE html><html><head><title>Bench</title><style>p{{}}</style>\
         <script src=\"/gtm.js\"></script></head><body>\
         <div id=\"analytics\"></div><main>{cards}</main><script>x()</script></body></html>"
    )
}

fn benchmark_url_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("url_validation");
    configure_fast_group(&mut group);

    let test_urls = vec![
        "https://example.com",
        "http://example.com/path?query=value",
        "invalid-url",
        "https://",
        "",
    ];

    group.bench_function("is_valid_url", |b| {
        b.iter(|| {
            for url in &test_urls {
                black_box(is_valid_url(url));
            }
        });
    });

    group.bench_function("result_filename", |b| {
        b.iter(|| black_box(result_filename("https://example.com/a/b?c=1&d=2")));
    });

    group.finish();
}

fn benchmark_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");
    configure_fast_group(&mut group);

    let css = css_payload();
    group.bench_function("css", |b| {
        b.iter(|| black_box(normalize_css(black_box(&css))));
    });

    let palette = json!((0..100).map(|i| format!("#{:06x}", i % 30)).collect::<Vec<_>>());
    group.bench_function("palette", |b| {
        b.iter(|| black_box(normalize_palette(black_box(&palette))));
    });

    let dom_assets = json!({
        "images": (0..50).map(|i| format!("https://a.test/{i}.png")).collect::<Vec<_>>(),
        "stylesheets": ["https://a.test/main.css"],
        "icons": ["https://a.test/favicon.ico"]
    });
    let requests: Vec<RequestRecord> = (0..100)
        .map(|i| RequestRecord::new(format!("https://cdn.a.test/{}.js", i % 40), ResourceCategory::Script, "GET"))
        .collect();
    group.bench_function("assets", |b| {
        b.iter(|| black_box(merge_assets(black_box(&dom_assets), black_box(&requests))));
    });

    group.finish();
}

fn benchmark_sanitization(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitization");
    configure_fast_group(&mut group);

    let html = page_html();
    group.bench_function("sanitize_dom", |b| {
        b.iter(|| black_box(sanitize_dom(black_box(&html))));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_url_validation,
    benchmark_normalization,
    benchmark_sanitization
);
criterion_main!(benches);
