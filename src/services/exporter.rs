//! 订单导出
//!
//! CSV（商品名用分号连接）和 JSON 两种格式，文件名带时间戳。

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::OrderRecord;
use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::mem::take;
use std::path::{Path, PathBuf};
use tracing::info;

/// CSV 表头
pub const CSV_HEADER: [&str; 6] = ["id", "date", "total", "items", "details_url", "invoice_url"];

/// 商品名分隔符
const ITEM_SEPARATOR: char = ';';

/// 导出格式开关
#[derive(Debug, Clone, Copy)]
pub struct ExportFormats {
    pub csv: bool,
    pub json: bool,
}

/// 带时间戳的文件名，例如 `orders_20240303_101500.csv`
pub fn timestamped_name(prefix: &str, ext: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, now.format("%Y%m%d_%H%M%S"), ext)
}

/// 按开关导出到目录，返回写入的文件
pub fn export_orders(
    dir: &Path,
    orders: &[OrderRecord],
    formats: ExportFormats,
    now: DateTime<Local>,
) -> ScrapeResult<Vec<PathBuf>> {
    let mut written = Vec::new();

    if formats.csv {
        let path = dir.join(timestamped_name("orders", "csv", now));
        let file = std::fs::File::create(&path).map_err(|e| ScrapeError::io(&path, e))?;
        write_csv(io::BufWriter::new(file), orders).map_err(|e| ScrapeError::io(&path, e))?;
        info!("📊 已导出 CSV: {}", path.display());
        written.push(path);
    }

    if formats.json {
        let path = dir.join(timestamped_name("orders", "json", now));
        let json = serde_json::to_string_pretty(orders)
            .map_err(|e| ScrapeError::io(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
        std::fs::write(&path, json).map_err(|e| ScrapeError::io(&path, e))?;
        info!("📊 已导出 JSON: {}", path.display());
        written.push(path);
    }

    Ok(written)
}

/* ---------------- Writing ---------------- */

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(w: &mut W, row: &[&str]) -> io::Result<()> {
    let line = row
        .iter()
        .map(|cell| {
            if needs_quotes(cell) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    writeln!(w, "{}", line)
}

/// 写出带表头的 CSV
pub fn write_csv<W: Write>(mut w: W, orders: &[OrderRecord]) -> io::Result<()> {
    write_row(&mut w, &CSV_HEADER)?;
    for order in orders {
        let items = order.items.join(&ITEM_SEPARATOR.to_string());
        write_row(
            &mut w,
            &[
                &order.id,
                &order.date,
                &order.total,
                &items,
                order.details_url.as_deref().unwrap_or_default(),
                order.invoice_url.as_deref().unwrap_or_default(),
            ],
        )?;
    }
    w.flush()
}

/* ---------------- Parsing ---------------- */

/// CSV 解析（支持引号和 CRLF）
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // 文件末尾没有换行时补上最后一行
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// 把导出的 CSV 读回订单记录
pub fn parse_csv(text: &str) -> Vec<OrderRecord> {
    let mut rows = parse_rows(text).into_iter();
    let has_header = rows
        .as_slice()
        .first()
        .is_some_and(|first| first.first().map(String::as_str) == Some(CSV_HEADER[0]));
    if has_header {
        rows.next();
    }

    let optional = |v: Option<&String>| v.filter(|s| !s.is_empty()).cloned();

    rows.map(|row| OrderRecord {
        id: row.first().cloned().unwrap_or_default(),
        date: row.get(1).cloned().unwrap_or_default(),
        total: row.get(2).cloned().unwrap_or_default(),
        items: row
            .get(3)
            .map(|s| s.split(ITEM_SEPARATOR).map(str::to_string).collect())
            .unwrap_or_default(),
        details_url: optional(row.get(4)),
        invoice_url: optional(row.get(5)),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, total: &str) -> OrderRecord {
        OrderRecord {
            id: id.to_string(),
            date: "January 5, 2024".to_string(),
            total: total.to_string(),
            items: vec!["Cable, USB-C".to_string(), "Lamp \"Arc\"".to_string()],
            details_url: Some("https://www.amazon.com/gp/your-account/order-details?orderID=1".to_string()),
            invoice_url: None,
        }
    }

    #[test]
    fn test_csv_round_trip_keeps_key_fields() {
        let orders = vec![
            record("111-0000000-0000001", "$1,204.99"),
            record("111-0000000-0000002", "$3.50"),
            record("Unknown", "Unknown"),
        ];
        let mut buf = Vec::new();
        write_csv(&mut buf, &orders).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("id,date,total,items,details_url,invoice_url\n"));

        let parsed = parse_csv(&text);
        assert_eq!(parsed.len(), orders.len());
        for (a, b) in orders.iter().zip(&parsed) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.date, b.date);
            assert_eq!(a.total, b.total);
        }
        assert_eq!(parsed[0], orders[0]);
    }

    #[test]
    fn test_parse_rows_crlf_and_missing_trailing_newline() {
        let rows = parse_rows("a,b\r\n\"x,1\",y");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["x,1", "y"]]);
    }

    #[test]
    fn test_export_writes_timestamped_files() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 3, 3, 10, 15, 0).unwrap();
        let written = export_orders(
            dir.path(),
            &[record("1", "$1")],
            ExportFormats { csv: true, json: true },
            now,
        )
        .unwrap();

        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["orders_20240303_101500.csv", "orders_20240303_101500.json"]);

        let json = std::fs::read_to_string(&written[1]).unwrap();
        let back: Vec<OrderRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![record("1", "$1")]);
    }
}
