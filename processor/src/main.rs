// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use processor::IndexerConfig;
use server_framework::ServerArgs;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(unix)]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

const RUNTIME_WORKER_MULTIPLIER: usize = 2;

fn main() -> Result<()> {
    let num_cpus = num_cpus::get();
    let worker_threads = (num_cpus * RUNTIME_WORKER_MULTIPLIER).max(4);
    println!(
        "[Indexer] Starting fundraising indexer tokio runtime: num_cpus={}, worker_threads={}",
        num_cpus, worker_threads
    );

    let atomic_id = AtomicUsize::new(0);

    tokio::runtime::Builder::new_multi_thread()
        .thread_name_fn(move || {
            let id = atomic_id.fetch_add(1, Ordering::SeqCst);
            format!("tokio-{}", id)
        })
        .enable_all()
        .worker_threads(worker_threads)
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async {
            let args = ServerArgs::parse();
            args.run::<IndexerConfig>(tokio::runtime::Handle::current())
                .await
        })
}
