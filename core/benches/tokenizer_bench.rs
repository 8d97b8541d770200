use criterion::{criterion_group, criterion_main, Criterion};
use wvtool_core::filter::{StopWordFilter, TagRemoverFilter};
use wvtool_core::ingest::{Analyzer, Document};
use wvtool_core::stemmer::SnowballStemmer;
use wvtool_core::tokenizer::{NGramTokenizer, Tokenizer, WordTokenizer};
use wvtool_core::vocab::Vocabulary;

const TEXT: &str = "<html><body><p>The quick brown fox jumps over the lazy dog. \
    Running runners ran; the runner's café menu listed 42 dishes.</p>\
    <script>var ignored = true;</script></body></html>";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(64);
    c.bench_function("word_tokenize", |b| b.iter(|| WordTokenizer.tokenize(&text).count()));
    let bigrams = NGramTokenizer::new(2);
    c.bench_function("bigram_tokenize", |b| b.iter(|| bigrams.tokenize(&text).count()));
}

fn bench_analyze(c: &mut Criterion) {
    let text = TEXT.repeat(64);
    let analyzer = Analyzer {
        filter: Box::new(TagRemoverFilter),
        tokenizer: Box::new(WordTokenizer),
        normalizer: Box::new(StopWordFilter::new()),
        stemmer: Box::new(SnowballStemmer::english()),
    };
    c.bench_function("analyze_document", |b| {
        b.iter(|| {
            let mut vocab = Vocabulary::dynamic();
            let mut doc = Document::new(0, "bench".into());
            analyzer.analyze(&text, &mut vocab, &mut doc);
            doc.term_counts.len()
        })
    });
}

criterion_group!(benches, bench_tokenize, bench_analyze);
criterion_main!(benches);
