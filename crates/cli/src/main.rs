//! trawl-fetch entry point.
//!
//! Runs the fetch stage as a standalone batch job: reads a JSONL stream
//! of URL records, fetches them under the loaded policy, and writes the
//! two output streams as JSONL. Logging goes to stderr so stdout stays
//! clean for pipeline plumbing.
//!
//! Environment:
//! - TRAWL_INPUT: path to the UrlDatum JSONL input (required)
//! - TRAWL_FETCHED_OUT: path for the content stream (omit to disable)
//! - TRAWL_STATUS_OUT: path for the status stream (omit to disable)
//! - TRAWL_* / TRAWL_CONFIG_FILE: policy knobs, see trawl-core

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use trawl_core::{FetchedDatum, FetcherPolicy, StatusDatum, UrlDatum};
use trawl_fetcher::{GroupingKeyGenerator, HttpFetcher, LastFetchedScorer, Sink, run_fetch_stage};

/// JSONL writers for the two output streams; either may be disabled.
struct JsonlSink {
    fetched: Option<Mutex<BufWriter<File>>>,
    status: Option<Mutex<BufWriter<File>>>,
}

impl JsonlSink {
    fn open(fetched_path: Option<&str>, status_path: Option<&str>) -> Result<Self> {
        let open = |path: &str| -> Result<Mutex<BufWriter<File>>> {
            let file = File::create(path).with_context(|| format!("cannot create {path}"))?;
            Ok(Mutex::new(BufWriter::new(file)))
        };
        Ok(Self {
            fetched: fetched_path.map(open).transpose()?,
            status: status_path.map(open).transpose()?,
        })
    }

    fn write_line<T: serde::Serialize>(writer: &Mutex<BufWriter<File>>, record: &T) {
        let mut writer = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = serde_json::to_writer(&mut *writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(writer))
        {
            tracing::warn!(error = %e, "failed to write output record");
        }
    }

    fn finish(self) -> Result<()> {
        for writer in [self.fetched, self.status].into_iter().flatten() {
            writer
                .into_inner()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .flush()
                .context("failed to flush output")?;
        }
        Ok(())
    }
}

impl Sink for JsonlSink {
    fn emit_fetched(&self, datum: FetchedDatum) {
        if let Some(writer) = &self.fetched {
            Self::write_line(writer, &datum);
        }
    }

    fn emit_status(&self, datum: StatusDatum) {
        if let Some(writer) = &self.status {
            Self::write_line(writer, &datum);
        }
    }
}

fn read_input(path: &str) -> Result<Vec<UrlDatum>> {
    let file = File::open(path).with_context(|| format!("cannot open {path}"))?;
    let mut urls = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<UrlDatum>(&line) {
            Ok(datum) => urls.push(datum),
            Err(e) => {
                tracing::warn!(line = number + 1, error = %e, "skipping malformed input record");
            }
        }
    }
    Ok(urls)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let policy = FetcherPolicy::load()?;
    tracing::info!(
        max_threads = policy.max_threads,
        crawl_delay_ms = policy.crawl_delay_ms,
        max_content_size = policy.max_content_size,
        user_agent = %policy.user_agent.value(),
        "policy loaded"
    );

    let input = std::env::var("TRAWL_INPUT").context("TRAWL_INPUT must name the input JSONL file")?;
    let fetched_out = std::env::var("TRAWL_FETCHED_OUT").ok();
    let status_out = std::env::var("TRAWL_STATUS_OUT").ok();

    let urls = read_input(&input)?;
    tracing::info!(input = %input, count = urls.len(), "input loaded");

    let policy = Arc::new(policy);
    let fetcher = Arc::new(HttpFetcher::new((*policy).clone())?);
    let mut keygen = GroupingKeyGenerator::new(fetcher.clone(), &policy);
    let sink = Arc::new(JsonlSink::open(fetched_out.as_deref(), status_out.as_deref())?);

    let totals = run_fetch_stage(
        urls,
        &mut keygen,
        &LastFetchedScorer::default(),
        policy,
        fetcher,
        sink.clone(),
    )
    .await;

    tracing::info!(?totals, "fetch stage complete");

    Arc::into_inner(sink)
        .context("output sink still referenced at shutdown")?
        .finish()?;

    Ok(())
}
