use boolnet::bits::decode;
use boolnet::config::AnalysisConfig;
use boolnet::error::Result;
use boolnet::phenotype::MaskSpec;
use boolnet::scan::BlockedPairScanner;
use boolnet::shared::files::MemoryRows;
use boolnet::sink::RelationSink;
use boolnet::stats::PairStatistic;
use boolnet::types::{GeneCategory, NetworkHeader, RelationHit};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: [u8; 6] = *b"002211";

fn random_bits(rng: &mut StdRng, samples: usize) -> Vec<u8> {
    (0..samples)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

/// Discards everything but the relation count.
#[derive(Default)]
struct CountingSink {
    relations: usize,
}

impl RelationSink for CountingSink {
    fn write_header(&mut self, _header: &NetworkHeader) -> Result<()> {
        Ok(())
    }
    fn write_list(&mut self, _category: GeneCategory, _ids: &[String]) -> Result<()> {
        Ok(())
    }
    fn begin_relations(&mut self, _balanced_count: usize) -> Result<()> {
        Ok(())
    }
    fn record(&mut self, _hit: &RelationHit) -> Result<()> {
        self.relations += 1;
        Ok(())
    }
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

fn benchmark_pair_statistic(c: &mut Criterion) {
    let statistic = PairStatistic::new(&AnalysisConfig::default());
    let mut group = c.benchmark_group("pair_statistic");
    for samples in [256_usize, 4_096, 65_536] {
        let mut rng = StdRng::seed_from_u64(0xB001 + samples as u64);
        let a = decode(&random_bits(&mut rng, samples));
        let b = decode(&random_bits(&mut rng, samples));
        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &(a, b), |bench, (a, b)| {
            bench.iter(|| black_box(statistic.evaluate(black_box(a), black_box(b))));
        });
    }
    group.finish();
}

fn benchmark_blocked_scan(c: &mut Criterion) {
    let genes = 400;
    let samples = 1_000;
    let mut rng = StdRng::seed_from_u64(0x5CA4);
    let rows: Vec<String> = (0..genes)
        .map(|_| String::from_utf8_lossy(&random_bits(&mut rng, samples)).into_owned())
        .collect();

    let mut group = c.benchmark_group("blocked_scan");
    group.sample_size(10);
    group.throughput(Throughput::Elements((genes * (genes - 1) / 2) as u64));
    for block_size in [32_usize, 128, 8_000] {
        group.bench_with_input(BenchmarkId::new("block_size", block_size), &rows, |bench, rows| {
            bench.iter(|| {
                let mut source = MemoryRows::from_bit_strings(rows.iter()).unwrap();
                let mut sink = CountingSink::default();
                let mut scanner = BlockedPairScanner::new(AnalysisConfig {
                    block_size,
                    ..AnalysisConfig::default()
                });
                let summary = scanner
                    .run(&mut source, &MaskSpec::All, None, &mut sink)
                    .unwrap();
                black_box((summary.pairs_tested, sink.relations));
            });
        });
    }
    group.finish();
}

criterion_group!(pair_scan, benchmark_pair_statistic, benchmark_blocked_scan);
criterion_main!(pair_scan);
