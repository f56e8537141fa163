use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sift_core::clock::FixedClock;
use sift_core::config::{FeedbackConfig, Settings};
use sift_core::dom::{Document, Dom, ElementSpec, PageSpec, Viewport};
use sift_core::feedback::{FeedbackStore, MemoryStorage, NullSink};
use sift_core::scan::Session;
use sift_core::scorer::Scorer;
use sift_core::signature::Signature;
use sift_core::snapshot::{ElementSnapshot, FeatureExtractor};
use std::rc::Rc;

fn banner(i: usize) -> ElementSpec {
    ElementSpec::new("div")
        .class(&format!("ad-banner-{}", i % 7))
        .attr("data-ad-slot", &i.to_string())
        .size(300.0, 250.0)
        .child(
            ElementSpec::new("a")
                .attr("href", "https://click.example/track?id=1")
                .child(ElementSpec::new("img").attr("src", "creative.png")),
        )
}

fn paragraph(i: usize) -> ElementSpec {
    ElementSpec::new("p")
        .class("story-body")
        .text(&format!("Paragraph {} of an article about the harbour redevelopment.", i))
        .size(640.0, 60.0)
}

/// Article page with one banner every `ad_every` blocks.
fn page(blocks: usize, ad_every: usize) -> PageSpec {
    let body = (0..blocks)
        .map(|i| if i % ad_every == 0 { banner(i) } else { paragraph(i) })
        .collect::<Vec<_>>();
    PageSpec {
        url: "https://news.example.com/story".to_string(),
        viewport: Viewport::default(),
        body: vec![ElementSpec::new("main").child(ElementSpec::new("div").class("column"))]
            .into_iter()
            .chain(body)
            .collect(),
        ..PageSpec::default()
    }
}

fn snapshots(spec: &PageSpec) -> Vec<ElementSnapshot> {
    let doc = Document::from_spec(spec);
    let extractor = FeatureExtractor::default();
    doc.children(doc.root())
        .into_iter()
        .filter_map(|node| extractor.extract(&doc, node).ok())
        .collect()
}

fn bench_score(c: &mut Criterion) {
    let spec = page(200, 5);
    let snaps = snapshots(&spec);
    let scorer = Scorer::default();
    let feedback = FeedbackStore::new(
        FeedbackConfig::default(),
        Box::new(MemoryStorage::new()),
        Rc::new(FixedClock(0)),
    );

    let mut group = c.benchmark_group("scorer");
    group.throughput(Throughput::Elements(snaps.len() as u64));
    group.bench_function("score", |b| {
        b.iter(|| {
            for snapshot in &snaps {
                black_box(scorer.score(black_box(snapshot), &feedback));
            }
        })
    });
    group.bench_function("signature", |b| {
        b.iter(|| {
            for snapshot in &snaps {
                black_box(Signature::of(black_box(snapshot)));
            }
        })
    });
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    for blocks in [100usize, 1000] {
        let spec = page(blocks, 10);
        group.throughput(Throughput::Elements(blocks as u64));
        group.bench_with_input(BenchmarkId::new("full_document", blocks), &spec, |b, spec| {
            b.iter(|| {
                let mut doc = Document::from_spec(spec);
                let mut session = Session::open(
                    Settings::default(),
                    Scorer::default(),
                    FeedbackConfig::default(),
                    MemoryStorage::new(),
                    Box::new(NullSink),
                    Rc::new(FixedClock(0)),
                );
                session.start(&mut doc);
                black_box(session.stats())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_score, bench_scan);
criterion_main!(benches);
