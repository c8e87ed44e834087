use criterion::{Criterion, criterion_group, criterion_main};
use stepmap_engine::{
    StepsTranslator, TreeRange, document_from_markdown, markdown_filter, paragraphs_in_range,
    text_nodes_in_range,
};
mod common;

fn bench_range_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("range");
    group.sample_size(10);

    let content = common::generate_markdown_content(200);
    let doc = document_from_markdown(&content).unwrap();
    let filter = markdown_filter();
    let mut translator = StepsTranslator::new(&doc, filter.clone(), 500);
    let total = translator.step_count(&doc);
    let start = translator.steps_to_position(&doc, total / 4).unwrap();
    let end = translator.steps_to_position(&doc, total / 4 * 3).unwrap();
    let range = TreeRange::new(start, end);

    group.bench_function("text_nodes_in_range", |b| {
        b.iter(|| {
            let nodes = text_nodes_in_range(&doc, std::hint::black_box(range));
            std::hint::black_box(nodes);
        });
    });

    group.bench_function("paragraphs_in_range", |b| {
        b.iter(|| {
            let nodes = paragraphs_in_range(&doc, std::hint::black_box(range), &filter);
            std::hint::black_box(nodes);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_range_projection);
criterion_main!(benches);
