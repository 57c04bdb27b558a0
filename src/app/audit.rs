fn is_valid_url(input: &str) -> bool {
    match Url::parse(input) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

// Dedup keys are the raw link text by default; case, scheme and trailing
// slash differences are distinct keys.
fn identity_key(url: &str) -> String {
    url.to_string()
}

#[derive(Debug, Clone, Copy)]
struct AuditOptions {
    pacer: Pacer,
    dedup_within_run: bool,
    dedup_key: fn(&str) -> String,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            pacer: Pacer::from_millis(2000),
            dedup_within_run: true,
            dedup_key: identity_key,
        }
    }
}

fn seen_keys(existing: &[ResultRow], options: &AuditOptions) -> HashSet<String> {
    existing
        .iter()
        .map(|row| (options.dedup_key)(&row.link))
        .collect()
}

// Sequential per-URL state machine: validate, skip-check, fetch both
// strategies, extract, record. A failed URL never aborts the loop, and the
// delay is charged once per URL after both strategy calls.
async fn run_audit<F: ReportFetcher>(
    fetcher: F,
    urls: Vec<String>,
    mut seen: HashSet<String>,
    options: AuditOptions,
    tx: UnboundedSender<AuditEvent>,
) {
    for url in &urls {
        if !is_valid_url(url) {
            let _ = tx.send(AuditEvent::Status(format!("invalid URL: {url}")));
            let _ = tx.send(AuditEvent::Row {
                row: ResultRow::invalid(url),
            });
            continue;
        }

        let key = (options.dedup_key)(url);
        if seen.contains(&key) {
            let _ = tx.send(AuditEvent::Skipped { url: url.clone() });
            continue;
        }

        let row = match measure_url(&fetcher, url).await {
            Ok((mobile, desktop)) => ResultRow::success(url, &mobile, &desktop),
            Err(err) => {
                let _ = tx.send(AuditEvent::Error(format!("error processing {url}: {err}")));
                ResultRow::errored(url)
            }
        };
        let _ = tx.send(AuditEvent::Row { row });
        if options.dedup_within_run {
            seen.insert(key);
        }
        options.pacer.pause().await;
    }

    let _ = tx.send(AuditEvent::Finished);
}

// Mobile first, then desktop; both must fetch and extract cleanly or the
// whole URL is marked failed.
async fn measure_url<F: ReportFetcher>(
    fetcher: &F,
    url: &str,
) -> Result<(StrategyMetrics, StrategyMetrics), FetchError> {
    let mobile_report = fetcher.fetch(url, Strategy::Mobile).await?;
    let desktop_report = fetcher.fetch(url, Strategy::Desktop).await?;
    let mobile = extract_metrics(&mobile_report)?;
    let desktop = extract_metrics(&desktop_report)?;
    Ok((mobile, desktop))
}

// Existing rows first, in their original order; new rows appended in
// processing order. No merge-time dedup beyond the pre-fetch skip check.
fn merge_results(existing: Vec<ResultRow>, new_rows: Vec<ResultRow>) -> Vec<ResultRow> {
    let mut merged = existing;
    merged.extend(new_rows);
    merged
}

#[cfg(test)]
mod audit_tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct ScriptedFetcher {
        fraction: f64,
        failures: Vec<(String, Strategy)>,
        calls: Rc<Cell<usize>>,
    }

    impl ScriptedFetcher {
        fn ok(fraction: f64) -> Self {
            Self {
                fraction,
                failures: Vec::new(),
                calls: Rc::new(Cell::new(0)),
            }
        }

        fn failing(fraction: f64, failures: Vec<(String, Strategy)>) -> Self {
            Self {
                fraction,
                failures,
                calls: Rc::new(Cell::new(0)),
            }
        }
    }

    impl ReportFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, strategy: Strategy) -> Result<Value, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if self
                .failures
                .iter()
                .any(|(failing_url, failing_strategy)| {
                    failing_url == url && *failing_strategy == strategy
                })
            {
                return Err(FetchError::Transport {
                    status: Some(500),
                    message: "scripted failure".to_string(),
                });
            }
            Ok(sample_report(self.fraction))
        }
    }

    fn unthrottled() -> AuditOptions {
        AuditOptions {
            pacer: Pacer::Unthrottled,
            ..AuditOptions::default()
        }
    }

    async fn collect_audit<F: ReportFetcher>(
        fetcher: F,
        urls: &[&str],
        existing: &[ResultRow],
        options: AuditOptions,
    ) -> (Vec<ResultRow>, usize) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let seen = seen_keys(existing, &options);
        let urls = urls.iter().map(ToString::to_string).collect();
        run_audit(fetcher, urls, seen, options, tx).await;

        let mut rows = Vec::new();
        let mut skipped = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                AuditEvent::Row { row } => rows.push(row),
                AuditEvent::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }
        (rows, skipped)
    }

    #[test]
    fn validator_accepts_http_and_https_only() {
        assert!(is_valid_url("https://a.com"));
        assert!(is_valid_url("http://a.com/path?q=1"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url("ftp://a.com"));
        assert!(!is_valid_url("a.com"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn validator_treats_key_variants_as_distinct() {
        assert_ne!(identity_key("https://a.com"), identity_key("https://a.com/"));
        assert_ne!(identity_key("https://a.com"), identity_key("https://A.com"));
    }

    #[tokio::test]
    async fn mixed_input_produces_one_row_per_url() {
        let fetcher = ScriptedFetcher::ok(0.873);
        let (rows, skipped) = collect_audit(
            fetcher,
            &["https://a.com", "not a url", "https://b.com"],
            &[],
            unthrottled(),
        )
        .await;

        assert_eq!(skipped, 0);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].link, "https://a.com");
        assert_eq!(rows[0].score_mobile, ScoreCell::Value(87.3));
        assert_eq!(rows[1].link, "not a url");
        assert_eq!(rows[1].score_mobile, ScoreCell::Invalid);
        assert_eq!(rows[2].score_desktop, ScoreCell::Value(87.3));
    }

    #[tokio::test]
    async fn already_measured_urls_are_skipped_without_fetching() {
        let existing = vec![ResultRow::errored("https://a.com")];
        let fetcher = ScriptedFetcher::ok(0.9);
        let calls = fetcher.calls.clone();
        let (rows, skipped) = collect_audit(
            fetcher,
            &["https://a.com", "https://c.com"],
            &existing,
            unthrottled(),
        )
        .await;

        assert_eq!(skipped, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].link, "https://c.com");
        // Two calls total: mobile and desktop for c.com, none for a.com.
        assert_eq!(calls.get(), 2);

        let merged = merge_results(existing, rows);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].link, "https://a.com");
        assert_eq!(merged[1].link, "https://c.com");
    }

    #[tokio::test]
    async fn desktop_failure_marks_both_strategies_errored() {
        let fetcher = ScriptedFetcher::failing(
            0.9,
            vec![("https://a.com".to_string(), Strategy::Desktop)],
        );
        let (rows, _) = collect_audit(fetcher, &["https://a.com"], &[], unthrottled()).await;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score_mobile, ScoreCell::Error);
        assert_eq!(rows[0].score_desktop, ScoreCell::Error);
        assert!(rows[0].fcp_mobile.is_empty());
    }

    #[tokio::test]
    async fn one_failing_url_does_not_poison_the_rest() {
        let fetcher = ScriptedFetcher::failing(
            0.8,
            vec![("https://bad.com".to_string(), Strategy::Mobile)],
        );
        let (rows, _) = collect_audit(
            fetcher,
            &["https://a.com", "https://bad.com", "https://b.com"],
            &[],
            unthrottled(),
        )
        .await;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].score_mobile, ScoreCell::Value(80.0));
        assert_eq!(rows[1].score_mobile, ScoreCell::Error);
        assert_eq!(rows[2].score_mobile, ScoreCell::Value(80.0));
    }

    #[tokio::test]
    async fn schema_failure_is_recorded_like_transport_failure() {
        struct BrokenShape;
        impl ReportFetcher for BrokenShape {
            async fn fetch(&self, _url: &str, _strategy: Strategy) -> Result<Value, FetchError> {
                Ok(serde_json::json!({ "lighthouseResult": {} }))
            }
        }

        let (rows, _) = collect_audit(BrokenShape, &["https://a.com"], &[], unthrottled()).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score_mobile, ScoreCell::Error);
    }

    #[tokio::test]
    async fn repeated_input_is_processed_once_by_default() {
        let fetcher = ScriptedFetcher::ok(0.7);
        let (rows, skipped) = collect_audit(
            fetcher,
            &["https://a.com", "https://a.com"],
            &[],
            unthrottled(),
        )
        .await;

        assert_eq!(rows.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[tokio::test]
    async fn repeated_input_is_processed_twice_when_requested() {
        let fetcher = ScriptedFetcher::ok(0.7);
        let options = AuditOptions {
            dedup_within_run: false,
            ..unthrottled()
        };
        let (rows, skipped) =
            collect_audit(fetcher, &["https://a.com", "https://a.com"], &[], options).await;

        assert_eq!(rows.len(), 2);
        assert_eq!(skipped, 0);
    }

    #[tokio::test]
    async fn rerun_with_unchanged_input_adds_no_rows() {
        let input = &["https://a.com", "https://b.com"];
        let (rows, _) =
            collect_audit(ScriptedFetcher::ok(0.5), input, &[], unthrottled()).await;
        let merged = merge_results(Vec::new(), rows);

        let (rows_again, skipped) =
            collect_audit(ScriptedFetcher::ok(0.5), input, &merged, unthrottled()).await;
        assert!(rows_again.is_empty());
        assert_eq!(skipped, 2);
    }

    #[tokio::test]
    async fn row_count_matches_processed_minus_skipped() {
        let existing = vec![ResultRow::errored("https://x.com")];
        let fetcher = ScriptedFetcher::ok(0.6);
        let input = &[
            "https://a.com",
            "https://x.com",
            "bad input",
            "https://b.com",
        ];
        let (rows, skipped) = collect_audit(fetcher, input, &existing, unthrottled()).await;

        assert_eq!(skipped, 1);
        assert_eq!(rows.len(), input.len() - skipped);
        let merged = merge_results(existing, rows);
        assert_eq!(merged.len(), 1 + input.len() - skipped);
    }
}
