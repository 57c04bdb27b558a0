pub async fn run() -> io::Result<()> {
    let cli = Cli::parse();

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var("PSI_API_KEY").ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "missing API key: pass --api-key or set PSI_API_KEY",
            )
        })?;

    let urls = read_input_urls(&cli.input)?;
    let store = ResultStore::open(&cli.results, cli.format.into());
    let existing = store.load()?;
    log::info!(
        "loaded {} input URLs from {}, {} existing result rows from {}",
        urls.len(),
        cli.input,
        existing.len(),
        store.path()
    );

    let options = AuditOptions {
        pacer: Pacer::from_millis(cli.delay_ms),
        dedup_within_run: !cli.keep_duplicate_input,
        dedup_key: identity_key,
    };
    let fetcher = PsiClient::new(
        cli.endpoint.clone(),
        api_key,
        Duration::from_secs(cli.timeout_secs),
    )
    .map_err(io::Error::other)?;

    let seen = seen_keys(&existing, &options);
    let started = Utc::now();
    let url_count = urls.len();
    let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();

    // The pipeline is strictly sequential, so both halves share one task:
    // the audit loop feeds the channel while the drain side prints progress
    // and accumulates the new rows.
    let ((), (new_rows, stats)) = tokio::join!(
        run_audit(fetcher, urls, seen, options, tx),
        drain_audit_events(&mut rx),
    );

    let merged = merge_results(existing, new_rows);
    store.replace(&merged)?;

    eprintln!(
        "finished audit: urls={} succeeded={} failed={} invalid={} skipped={} rows={} elapsed={}s output={}",
        url_count,
        stats.succeeded,
        stats.failed,
        stats.invalid,
        stats.skipped,
        merged.len(),
        (Utc::now() - started).num_seconds(),
        store.path(),
    );
    Ok(())
}

async fn drain_audit_events(rx: &mut UnboundedReceiver<AuditEvent>) -> (Vec<ResultRow>, RunStats) {
    let mut rows = Vec::new();
    let mut stats = RunStats::default();
    while let Some(event) = rx.recv().await {
        match event {
            AuditEvent::Row { row } => {
                match row.score_mobile {
                    ScoreCell::Value(_) => {
                        stats.succeeded += 1;
                        println!(
                            "processed {}: mobile={} desktop={}",
                            row.link,
                            row.score_mobile.label(),
                            row.score_desktop.label()
                        );
                    }
                    ScoreCell::Invalid => stats.invalid += 1,
                    ScoreCell::Error => stats.failed += 1,
                }
                rows.push(row);
            }
            AuditEvent::Skipped { url } => {
                stats.skipped += 1;
                println!("skipping {url}, already measured");
            }
            AuditEvent::Status(message) => println!("{message}"),
            AuditEvent::Error(err) => eprintln!("{err}"),
            AuditEvent::Finished => break,
        }
    }
    (rows, stats)
}
