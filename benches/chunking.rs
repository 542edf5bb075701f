use criterion::{Criterion, criterion_group, criterion_main};
use docqa::document::Document;
use docqa::embeddings::{ChunkingConfig, chunk_document};
use std::hint::black_box;

fn sample_document() -> Document {
    let page = "Retrieval augmented generation answers questions from a private corpus. \
                The corpus is split into overlapping windows, embedded and searched. ";
    let text = (0..200)
        .map(|i| format!("{}{}\x0c", page.repeat(4), i))
        .collect::<String>();
    Document::from_paged_text("bench", &text)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = sample_document();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_document(black_box(&document), black_box(&config)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
