use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::index::SeenIndex;
use crate::parser::extract_record;
use crate::record::Record;
use crate::render::RenderSession;
use crate::retriever::Retriever;
use crate::store::{MergeOutcome, OrderedStore};

/// Counters reported after a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub skipped_seen: usize,
    pub fetch_failed: usize,
    pub extract_failed: usize,
    pub persisted: usize,
    pub rejected_batches: usize,
    pub failed_flushes: usize,
    pub final_count: Option<usize>,
}

impl RunStats {
    pub fn print(&self) {
        println!(
            "Done: {} URLs ({} already seen, {} fetch errors, {} extraction errors).",
            self.total, self.skipped_seen, self.fetch_failed, self.extract_failed
        );
        println!(
            "Saved {} records, {} batches rejected as duplicates, {} failed writes.",
            self.persisted, self.rejected_batches, self.failed_flushes
        );
        if let Some(n) = self.final_count {
            println!("Store now holds {} records.", n);
        }
    }
}

pub struct RunOptions {
    pub batch_size: usize,
    /// Fixed for the whole run: new records go in front when the store had data at start.
    pub insert_mode: bool,
    pub progress: bool,
}

/// Walk the input once: skip seen URLs, fetch, extract, flush in batches.
pub async fn run<S: RenderSession>(
    urls: &[String],
    retriever: &mut Retriever<S>,
    index: &mut SeenIndex,
    store: &OrderedStore,
    opts: &RunOptions,
) -> RunStats {
    let total = urls.len();
    let mut stats = RunStats { total, ..RunStats::default() };
    let mut batch: Vec<Record> = Vec::with_capacity(opts.batch_size);

    let pb = if opts.progress {
        ProgressBar::new(total as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    for (i, url) in urls.iter().enumerate() {
        pb.inc(1);
        info!("Processing URL ({}/{}): {}", i + 1, total, url);

        if index.is_seen(url) {
            info!(url = %url, "Already processed, skipping");
            stats.skipped_seen += 1;
            continue;
        }

        let markup = match retriever.fetch_ready(url).await {
            Ok(m) => m,
            Err(e) => {
                error!(url = %url, error = %e, "Could not load page, skipping");
                stats.fetch_failed += 1;
                continue;
            }
        };

        match extract_record(&markup, url) {
            Ok(record) => batch.push(record),
            Err(e) => {
                error!(url = %url, error = %e, "Extraction failed, skipping");
                stats.extract_failed += 1;
                continue;
            }
        }

        if batch.len() >= opts.batch_size {
            flush(&mut batch, index, store, opts.insert_mode, &mut stats);
        }
    }

    if !batch.is_empty() {
        info!(records = batch.len(), "Writing remaining records");
        flush(&mut batch, index, store, opts.insert_mode, &mut stats);
    }

    pb.finish_and_clear();
    info!(
        total,
        persisted = stats.persisted,
        fetch_failed = stats.fetch_failed,
        "Run finished"
    );
    stats
}

/// Merge the batch, then mark its URLs seen. The batch is always consumed.
fn flush(
    batch: &mut Vec<Record>,
    index: &mut SeenIndex,
    store: &OrderedStore,
    insert_mode: bool,
    stats: &mut RunStats,
) {
    match store.merge(batch, insert_mode) {
        Ok(MergeOutcome { applied: true, final_count }) => {
            stats.persisted += batch.len();
            stats.final_count = Some(final_count);
            let urls: Vec<&str> = batch.iter().map(|r| r.source_url.as_str()).collect();
            if let Err(e) = index.mark_seen(urls.as_slice()) {
                error!(error = %e, "Records stored but URL index not updated; they will be retried");
            }
            info!(records = batch.len(), path = ?store.path(), "Batch written");
        }
        Ok(MergeOutcome { applied: false, .. }) => {
            warn!(records = batch.len(), "Batch not written");
            stats.rejected_batches += 1;
        }
        Err(e) => {
            error!(error = %e, records = batch.len(), "Store update failed, batch dropped");
            stats.failed_flushes += 1;
        }
    }
    batch.clear();
}
