// ========================================================================================
//
//                              THE BLOCKED PAIR SCANNER
//
// ========================================================================================
//
// A run moves through four states:
//
//   Init         validate the configuration, size the source, load the phenotype mask
//   ClassifyAll  one linear pass over every row: decode, project, gate, assign indices
//   ScanBlocks   upper-triangular block iteration over the balanced genes
//   Done
//
// Any error moves the scanner to `Failed` and is returned to the caller. Nothing is
// written to the sink before `ClassifyAll` completes, so a bad mask or a malformed
// row never produces a partial file header.
//
// Row loading stays on the calling thread because the row source is `&mut` and owns
// its cache. Pair evaluation for one (b1, b2) block pair runs on the rayon pool,
// parallel over the rows of b1; the hits are collected in row order and written
// serially, so the output never depends on the thread count.

use crate::bits::{GeneProfile, decode};
use crate::classify::SingleGeneClassifier;
use crate::config::AnalysisConfig;
use crate::error::{NetworkError, Result};
use crate::gene_list::GeneList;
use crate::phenotype::{MaskSpec, PhenotypeMask};
use crate::shared::files::{GeneRow, RowSource};
use crate::sink::RelationSink;
use crate::stats::PairStatistic;
use crate::types::{
    BalancedIndex, GeneCategory, GeneIndex, GeneStatus, NetworkHeader, RelationCode, RelationHit,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::io::IsTerminal;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Init,
    ClassifyAll,
    ScanBlocks,
    Done,
    Failed,
}

/// Counts reported at the end of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub gene_count: usize,
    pub raw_sample_count: usize,
    pub sample_count: usize,
    pub excluded: usize,
    pub no_range: usize,
    pub low: usize,
    pub high: usize,
    pub balanced: usize,
    pub pairs_tested: u64,
    pub relations: u64,
    /// Relations emitted per code, indexed by `RelationCode::as_u8`.
    pub code_tallies: [u64; RelationCode::CATEGORIES],
}

impl ScanSummary {
    pub fn category_count(&self, category: GeneCategory) -> usize {
        match category {
            GeneCategory::Low => self.low,
            GeneCategory::High => self.high,
            GeneCategory::Balanced => self.balanced,
        }
    }

    pub fn tally(&self, code: RelationCode) -> u64 {
        self.code_tallies[code.as_u8() as usize]
    }
}

/// Result of the single-gene pass.
struct Classification {
    statuses: Vec<GeneStatus>,
    low: Vec<String>,
    high: Vec<String>,
    balanced: Vec<String>,
}

impl Classification {
    fn ids(&self, category: GeneCategory) -> &[String] {
        match category {
            GeneCategory::Low => &self.low,
            GeneCategory::High => &self.high,
            GeneCategory::Balanced => &self.balanced,
        }
    }
}

/// Projected profiles of the balanced genes in one row block. Other rows are `None`.
struct LoadedBlock {
    start: usize,
    profiles: Vec<Option<GeneProfile>>,
}

pub struct BlockedPairScanner {
    config: AnalysisConfig,
    state: ScanState,
}

impl BlockedPairScanner {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            state: ScanState::Init,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Runs the whole analysis and streams the network into `sink`.
    ///
    /// `genes`, when given, restricts the run to the listed row ids.
    pub fn run(
        &mut self,
        source: &mut dyn RowSource,
        mask: &MaskSpec,
        genes: Option<&GeneList>,
        sink: &mut dyn RelationSink,
    ) -> Result<ScanSummary> {
        self.state = ScanState::Init;
        let result = self.run_stages(source, mask, genes, sink);
        self.state = match &result {
            Ok(_) => ScanState::Done,
            Err(e) => {
                log::error!("Scan aborted in a fatal state: {e}");
                ScanState::Failed
            }
        };
        result
    }

    fn run_stages(
        &mut self,
        source: &mut dyn RowSource,
        mask_spec: &MaskSpec,
        genes: Option<&GeneList>,
        sink: &mut dyn RelationSink,
    ) -> Result<ScanSummary> {
        // --- Init ---
        self.config.validate()?;
        let raw_width = source.sample_count();
        let gene_count = source.row_count();
        let mask = PhenotypeMask::load(mask_spec, raw_width)?;
        log::info!(
            "{}: {gene_count} genes, {raw_width} samples, {} selected by phenotype '{}'",
            source.describe(),
            mask.cardinality(),
            mask_spec.label()
        );

        // --- ClassifyAll ---
        self.state = ScanState::ClassifyAll;
        let start = Instant::now();
        let classification = self.classify_all(source, &mask, genes)?;
        let mut summary = ScanSummary {
            gene_count,
            raw_sample_count: raw_width,
            sample_count: mask.cardinality(),
            low: classification.low.len(),
            high: classification.high.len(),
            balanced: classification.balanced.len(),
            ..ScanSummary::default()
        };
        for status in &classification.statuses {
            match status {
                GeneStatus::Excluded => summary.excluded += 1,
                GeneStatus::NoRange => summary.no_range += 1,
                _ => {}
            }
        }
        log::info!(
            "Classified {gene_count} genes in {:.2?}: {} low, {} high, {} balanced, {} without range, {} excluded",
            start.elapsed(),
            summary.low,
            summary.high,
            summary.balanced,
            summary.no_range,
            summary.excluded
        );

        let header = NetworkHeader {
            source: source.describe(),
            phenotype: mask_spec.label().to_string(),
            gene_count,
            raw_sample_count: raw_width,
            sample_count: mask.cardinality(),
            config: self.config.clone(),
        };
        sink.write_header(&header)?;
        for category in GeneCategory::ALL {
            sink.write_list(category, classification.ids(category))?;
        }
        sink.begin_relations(summary.balanced)?;

        // --- ScanBlocks ---
        self.state = ScanState::ScanBlocks;
        let start = Instant::now();
        self.scan_blocks(source, &mask, &classification.statuses, sink, &mut summary)?;
        sink.finish()?;
        log::info!(
            "Tested {} pairs in {:.2?}; {} relations emitted",
            summary.pairs_tested,
            start.elapsed(),
            summary.relations
        );
        Ok(summary)
    }

    fn classify_all(
        &self,
        source: &mut dyn RowSource,
        mask: &PhenotypeMask,
        genes: Option<&GeneList>,
    ) -> Result<Classification> {
        let classifier = SingleGeneClassifier::new(&self.config, mask.cardinality());
        let gene_count = source.row_count();
        let mut classification = Classification {
            statuses: Vec::with_capacity(gene_count),
            low: Vec::new(),
            high: Vec::new(),
            balanced: Vec::new(),
        };

        for block in blocks(gene_count, self.config.block_size) {
            let rows = read_rows(source, block.clone(), |_| true)?;
            let outcomes: Vec<Option<Option<GeneCategory>>> = rows
                .par_iter()
                .map(|row| {
                    let row = row.as_ref()?;
                    if genes.is_some_and(|list| !list.contains(&row.id)) {
                        return None;
                    }
                    Some(classifier.evaluate(&mask.project(decode(&row.bits))))
                })
                .collect();

            for (row, outcome) in rows.into_iter().zip(outcomes) {
                let Some(row) = row else { continue };
                let status = match outcome {
                    None => GeneStatus::Excluded,
                    Some(None) => GeneStatus::NoRange,
                    Some(Some(GeneCategory::Low)) => {
                        classification.low.push(row.id.clone());
                        GeneStatus::Low
                    }
                    Some(Some(GeneCategory::High)) => {
                        classification.high.push(row.id.clone());
                        GeneStatus::High
                    }
                    Some(Some(GeneCategory::Balanced)) => {
                        let index = u32::try_from(classification.balanced.len()).map_err(|_| {
                            NetworkError::config("more balanced genes than a dense index can address")
                        })?;
                        classification.balanced.push(row.id.clone());
                        GeneStatus::Balanced(BalancedIndex(index))
                    }
                };
                classification.statuses.push(status);
            }
        }
        Ok(classification)
    }

    fn scan_blocks(
        &self,
        source: &mut dyn RowSource,
        mask: &PhenotypeMask,
        statuses: &[GeneStatus],
        sink: &mut dyn RelationSink,
        summary: &mut ScanSummary,
    ) -> Result<()> {
        let statistic = PairStatistic::new(&self.config);
        let ranges: Vec<Range<usize>> = blocks(statuses.len(), self.config.block_size).collect();
        let block_pairs = ranges.len() * (ranges.len() + 1) / 2;
        let pb = create_progress_bar(block_pairs as u64, "Scanning gene pairs");

        for (b1_idx, b1) in ranges.iter().enumerate() {
            let first = load_block(source, mask, statuses, b1.clone())?;
            for b2 in &ranges[b1_idx..] {
                let loaded;
                let second = if b2.start == b1.start {
                    &first
                } else {
                    loaded = load_block(source, mask, statuses, b2.clone())?;
                    &loaded
                };

                let (hits, tested) = scan_block_pair(&statistic, statuses, &first, second);
                summary.pairs_tested += tested;
                for hit in &hits {
                    sink.record(hit)?;
                    summary.relations += 1;
                    summary.code_tallies[hit.code.as_u8() as usize] += 1;
                }
                pb.inc(1);
            }
        }
        pb.finish_and_clear();
        Ok(())
    }
}

/// Contiguous row ranges of at most `block_size` rows covering `0..len`.
fn blocks(len: usize, block_size: usize) -> impl Iterator<Item = Range<usize>> {
    let block_size = block_size.max(1);
    (0..len)
        .step_by(block_size)
        .map(move |start| start..(start + block_size).min(len))
}

/// Reads the rows of `range` for which `wanted(row index)` holds, checking widths.
fn read_rows(
    source: &mut dyn RowSource,
    range: Range<usize>,
    wanted: impl Fn(usize) -> bool,
) -> Result<Vec<Option<Arc<GeneRow>>>> {
    let width = source.sample_count();
    range
        .map(|index| {
            if !wanted(index) {
                return Ok(None);
            }
            let row = source.row(index)?;
            if row.bits.len() != width {
                return Err(NetworkError::format(
                    source.describe(),
                    index + 1,
                    format!(
                        "gene '{}' has {} samples, expected {width}",
                        row.id,
                        row.bits.len()
                    ),
                ));
            }
            Ok(Some(row))
        })
        .collect()
}

fn load_block(
    source: &mut dyn RowSource,
    mask: &PhenotypeMask,
    statuses: &[GeneStatus],
    range: Range<usize>,
) -> Result<LoadedBlock> {
    let start = range.start;
    let rows = read_rows(source, range, |index| {
        statuses[index].balanced_index().is_some()
    })?;
    let profiles = rows
        .par_iter()
        .map(|row| row.as_ref().map(|row| mask.project(decode(&row.bits))))
        .collect();
    Ok(LoadedBlock { start, profiles })
}

/// Evaluates every balanced pair `(i, j)`, `i` in `first`, `j` in `second`, `j > i`.
/// Returns the hits in row-major order and the number of pairs tested.
fn scan_block_pair(
    statistic: &PairStatistic,
    statuses: &[GeneStatus],
    first: &LoadedBlock,
    second: &LoadedBlock,
) -> (Vec<RelationHit>, u64) {
    let per_row: Vec<(Vec<RelationHit>, u64)> = first
        .profiles
        .par_iter()
        .enumerate()
        .map(|(offset, profile)| {
            let i = first.start + offset;
            let (Some(a), Some(balanced_a)) = (profile, statuses[i].balanced_index()) else {
                return (Vec::new(), 0);
            };
            let mut hits = Vec::new();
            let mut tested = 0u64;
            for (offset_b, profile_b) in second.profiles.iter().enumerate() {
                let j = second.start + offset_b;
                if j <= i {
                    continue;
                }
                let (Some(b), Some(balanced_b)) = (profile_b, statuses[j].balanced_index()) else {
                    continue;
                };
                tested += 1;
                let outcome = statistic.evaluate(a, b);
                if outcome.code.is_relation() {
                    hits.push(RelationHit {
                        gene_a: GeneIndex(i),
                        gene_b: GeneIndex(j),
                        balanced_a,
                        balanced_b,
                        code: outcome.code,
                        score: outcome.score,
                        counts: outcome.counts,
                    });
                }
            }
            (hits, tested)
        })
        .collect();

    let tested: u64 = per_row.iter().map(|(_, t)| t).sum();
    let hits: Vec<RelationHit> = per_row.into_iter().flat_map(|(h, _)| h).collect();
    (hits, tested)
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };
    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    let style = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} block pairs ({eta}) {msg}",
    )
    .map(|style| style.progress_chars("█▉▊▋▌▍▎▏  "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
