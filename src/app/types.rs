#[derive(Debug, Parser, Clone)]
#[command(
    name = "psibatch",
    version,
    about = "Incremental PageSpeed Insights batch audits with CSV/JSON output"
)]
struct Cli {
    #[arg(value_name = "INPUT")]
    input: String,

    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "pagespeed_results.csv"
    )]
    results: String,

    #[arg(long, value_enum, default_value_t = FileFormatArg::Csv)]
    format: FileFormatArg,

    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    #[arg(long, value_name = "URL", default_value = PSI_ENDPOINT)]
    endpoint: String,

    #[arg(long, value_name = "MS", default_value_t = 2000)]
    delay_ms: u64,

    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, default_value_t = false)]
    keep_duplicate_input: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
enum FileFormatArg {
    Csv,
    Json,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DataFormat {
    Csv,
    Json,
}

impl From<FileFormatArg> for DataFormat {
    fn from(value: FileFormatArg) -> Self {
        match value {
            FileFormatArg::Csv => DataFormat::Csv,
            FileFormatArg::Json => DataFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Strategy {
    Mobile,
    Desktop,
}

impl Strategy {
    fn label(self) -> &'static str {
        match self {
            Strategy::Mobile => "mobile",
            Strategy::Desktop => "desktop",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ScoreCell {
    Value(f64),
    Invalid,
    Error,
}

impl ScoreCell {
    fn label(&self) -> String {
        match self {
            ScoreCell::Value(score) => format!("{score}"),
            ScoreCell::Invalid => "Invalid URL".to_string(),
            ScoreCell::Error => "Error".to_string(),
        }
    }

    fn from_label(label: &str) -> Self {
        match label.trim() {
            "Invalid URL" => ScoreCell::Invalid,
            other => other
                .parse::<f64>()
                .map(ScoreCell::Value)
                .unwrap_or(ScoreCell::Error),
        }
    }
}

#[derive(Debug, Clone)]
struct StrategyMetrics {
    score: f64,
    fcp: String,
    lcp: String,
    tbt: String,
    cls: String,
    si: String,
}

#[derive(Debug, Clone)]
struct ResultRow {
    link: String,
    score_mobile: ScoreCell,
    fcp_mobile: String,
    lcp_mobile: String,
    tbt_mobile: String,
    cls_mobile: String,
    si_mobile: String,
    score_desktop: ScoreCell,
    fcp_desktop: String,
    lcp_desktop: String,
    tbt_desktop: String,
    cls_desktop: String,
    si_desktop: String,
    report_link: String,
}

impl ResultRow {
    fn success(link: &str, mobile: &StrategyMetrics, desktop: &StrategyMetrics) -> Self {
        Self {
            link: link.to_string(),
            score_mobile: ScoreCell::Value(mobile.score),
            fcp_mobile: mobile.fcp.clone(),
            lcp_mobile: mobile.lcp.clone(),
            tbt_mobile: mobile.tbt.clone(),
            cls_mobile: mobile.cls.clone(),
            si_mobile: mobile.si.clone(),
            score_desktop: ScoreCell::Value(desktop.score),
            fcp_desktop: desktop.fcp.clone(),
            lcp_desktop: desktop.lcp.clone(),
            tbt_desktop: desktop.tbt.clone(),
            cls_desktop: desktop.cls.clone(),
            si_desktop: desktop.si.clone(),
            report_link: report_link(link),
        }
    }

    fn invalid(link: &str) -> Self {
        Self::sentinel(link, ScoreCell::Invalid)
    }

    fn errored(link: &str) -> Self {
        Self::sentinel(link, ScoreCell::Error)
    }

    // Metric detail cells stay empty on failure; only the score cells carry
    // the sentinel.
    fn sentinel(link: &str, cell: ScoreCell) -> Self {
        Self {
            link: link.to_string(),
            score_mobile: cell.clone(),
            fcp_mobile: String::new(),
            lcp_mobile: String::new(),
            tbt_mobile: String::new(),
            cls_mobile: String::new(),
            si_mobile: String::new(),
            score_desktop: cell,
            fcp_desktop: String::new(),
            lcp_desktop: String::new(),
            tbt_desktop: String::new(),
            cls_desktop: String::new(),
            si_desktop: String::new(),
            report_link: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum FetchError {
    Transport { status: Option<u16>, message: String },
    Schema(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport {
                status: Some(status),
                message,
            } => write!(f, "HTTP {status}: {message}"),
            FetchError::Transport {
                status: None,
                message,
            } => write!(f, "network error: {message}"),
            FetchError::Schema(path) => write!(f, "unexpected report shape: {path}"),
        }
    }
}

#[derive(Debug)]
enum AuditEvent {
    Row { row: ResultRow },
    Skipped { url: String },
    Status(String),
    Error(String),
    Finished,
}

#[derive(Debug, Default)]
struct RunStats {
    succeeded: usize,
    failed: usize,
    invalid: usize,
    skipped: usize,
}
