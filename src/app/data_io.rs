const RESULT_HEADERS: [&str; 14] = [
    "Link",
    "Score Mobile",
    "FCP Mobile (s)",
    "LCP Mobile (s)",
    "TBT Mobile (ms)",
    "CLS Mobile",
    "SI Mobile (s)",
    "Score Desktop",
    "FCP Desktop (s)",
    "LCP Desktop (s)",
    "TBT Desktop (ms)",
    "CLS Desktop",
    "SI Desktop (s)",
    "PageSpeed Link",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResultRecord {
    link: String,
    score_mobile: String,
    fcp_mobile: String,
    lcp_mobile: String,
    tbt_mobile: String,
    cls_mobile: String,
    si_mobile: String,
    score_desktop: String,
    fcp_desktop: String,
    lcp_desktop: String,
    tbt_desktop: String,
    cls_desktop: String,
    si_desktop: String,
    report_link: String,
}

fn row_to_record(row: &ResultRow) -> ResultRecord {
    ResultRecord {
        link: row.link.clone(),
        score_mobile: row.score_mobile.label(),
        fcp_mobile: row.fcp_mobile.clone(),
        lcp_mobile: row.lcp_mobile.clone(),
        tbt_mobile: row.tbt_mobile.clone(),
        cls_mobile: row.cls_mobile.clone(),
        si_mobile: row.si_mobile.clone(),
        score_desktop: row.score_desktop.label(),
        fcp_desktop: row.fcp_desktop.clone(),
        lcp_desktop: row.lcp_desktop.clone(),
        tbt_desktop: row.tbt_desktop.clone(),
        cls_desktop: row.cls_desktop.clone(),
        si_desktop: row.si_desktop.clone(),
        report_link: row.report_link.clone(),
    }
}

fn record_to_row(record: ResultRecord) -> ResultRow {
    ResultRow {
        link: record.link,
        score_mobile: ScoreCell::from_label(&record.score_mobile),
        fcp_mobile: record.fcp_mobile,
        lcp_mobile: record.lcp_mobile,
        tbt_mobile: record.tbt_mobile,
        cls_mobile: record.cls_mobile,
        si_mobile: record.si_mobile,
        score_desktop: ScoreCell::from_label(&record.score_desktop),
        fcp_desktop: record.fcp_desktop,
        lcp_desktop: record.lcp_desktop,
        tbt_desktop: record.tbt_desktop,
        cls_desktop: record.cls_desktop,
        si_desktop: record.si_desktop,
        report_link: record.report_link,
    }
}

#[derive(Debug, Clone)]
enum ResultStore {
    Csv(String),
    Json(String),
}

impl ResultStore {
    fn open(path: &str, fallback: DataFormat) -> Self {
        match detect_data_format(path, fallback) {
            DataFormat::Csv => ResultStore::Csv(path.to_string()),
            DataFormat::Json => ResultStore::Json(path.to_string()),
        }
    }

    fn path(&self) -> &str {
        match self {
            ResultStore::Csv(path) | ResultStore::Json(path) => path,
        }
    }

    // A missing results file means no prior run.
    fn load(&self) -> io::Result<Vec<ResultRow>> {
        if !Path::new(self.path()).exists() {
            return Ok(Vec::new());
        }
        match self {
            ResultStore::Csv(path) => load_rows_from_csv(path),
            ResultStore::Json(path) => load_rows_from_json(path),
        }
    }

    // Two-phase replace: stage the full table to a sibling temp file, then
    // rename it over the destination.
    fn replace(&self, rows: &[ResultRow]) -> io::Result<()> {
        let staged = format!("{}.tmp", self.path());
        match self {
            ResultStore::Csv(_) => write_rows_to_csv(&staged, rows)?,
            ResultStore::Json(_) => write_rows_to_json(&staged, rows)?,
        }
        fs::rename(&staged, self.path())
    }
}

fn write_rows_to_csv(path: &str, rows: &[ResultRow]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(RESULT_HEADERS)?;
    for row in rows {
        let rec = row_to_record(row);
        writer.write_record([
            rec.link,
            rec.score_mobile,
            rec.fcp_mobile,
            rec.lcp_mobile,
            rec.tbt_mobile,
            rec.cls_mobile,
            rec.si_mobile,
            rec.score_desktop,
            rec.fcp_desktop,
            rec.lcp_desktop,
            rec.tbt_desktop,
            rec.cls_desktop,
            rec.si_desktop,
            rec.report_link,
        ])?;
    }
    writer.flush()
}

fn write_rows_to_json(path: &str, rows: &[ResultRow]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(b"[\n")?;
    let mut first = true;
    for row in rows {
        if !first {
            file.write_all(b",\n")?;
        }
        first = false;
        serde_json::to_writer(&mut file, &row_to_record(row)).map_err(io::Error::other)?;
    }
    if first {
        file.write_all(b"]\n")?;
    } else {
        file.write_all(b"\n]\n")?;
    }
    file.flush()
}

fn load_rows_from_csv(path: &str) -> io::Result<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut index = HashMap::<String, usize>::new();
    for (idx, header) in headers.iter().enumerate() {
        index.insert(header.trim().to_ascii_lowercase(), idx);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let get = |name: &str| -> String {
            index
                .get(&name.to_ascii_lowercase())
                .and_then(|idx| record.get(*idx))
                .map(ToString::to_string)
                .unwrap_or_default()
        };

        let link = get("link");
        if link.trim().is_empty() {
            continue;
        }
        rows.push(ResultRow {
            link,
            score_mobile: ScoreCell::from_label(&get("score mobile")),
            fcp_mobile: get("fcp mobile (s)"),
            lcp_mobile: get("lcp mobile (s)"),
            tbt_mobile: get("tbt mobile (ms)"),
            cls_mobile: get("cls mobile"),
            si_mobile: get("si mobile (s)"),
            score_desktop: ScoreCell::from_label(&get("score desktop")),
            fcp_desktop: get("fcp desktop (s)"),
            lcp_desktop: get("lcp desktop (s)"),
            tbt_desktop: get("tbt desktop (ms)"),
            cls_desktop: get("cls desktop"),
            si_desktop: get("si desktop (s)"),
            report_link: get("pagespeed link"),
        });
    }

    Ok(rows)
}

fn load_rows_from_json(path: &str) -> io::Result<Vec<ResultRow>> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(records) = serde_json::from_str::<Vec<ResultRecord>>(&content) {
        return Ok(records.into_iter().map(record_to_row).collect());
    }

    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<ResultRecord>(line)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
        out.push(record_to_row(record));
    }
    Ok(out)
}

fn detect_data_format(path: &str, fallback: DataFormat) -> DataFormat {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".json") {
        DataFormat::Json
    } else if lower.ends_with(".csv") {
        DataFormat::Csv
    } else {
        fallback
    }
}

// Input lists come either as a CSV whose first column holds the URLs (header
// row skipped) or as a plain file with one URL per line.
fn read_input_urls(path: &str) -> io::Result<Vec<String>> {
    if path.to_ascii_lowercase().ends_with(".csv") {
        read_input_urls_from_csv(path)
    } else {
        read_input_urls_from_lines(path)
    }
}

fn read_input_urls_from_csv(path: &str) -> io::Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(url) = record.get(0) else {
            continue;
        };
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        urls.push(url.to_string());
    }
    Ok(urls)
}

fn read_input_urls_from_lines(path: &str) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect())
}
