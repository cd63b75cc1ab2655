//! HTML dashboard rendering.

use crate::types::{collection_defaults, Record};
use chrono::Local;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem}\
table{border-collapse:collapse;width:100%;margin-bottom:2rem}\
th,td{border:1px solid #ccc;padding:.35rem .6rem;text-align:left;vertical-align:top}\
th{background:#f3f3f3}td{word-break:break-all}.empty{color:#888}";

/// Render every collection as a table, most recent record first.
///
/// `collections` must already be ordered newest-first. Every logged value
/// is HTML-escaped.
pub fn render_dashboard(collections: &BTreeMap<String, Vec<Record>>) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Request log</title>");
    let _ = write!(html, "<style>{STYLE}</style></head><body>");
    html.push_str("<h1>Request log</h1>");
    html.push_str(
        "<p><a href=\"/export.json\">Export JSON</a> &middot; <a href=\"/clear\">Clear all</a></p>",
    );

    for (name, records) in collections {
        render_collection(&mut html, name, records);
    }

    html.push_str("</body></html>\n");
    html
}

fn render_collection(html: &mut String, name: &str, records: &[Record]) {
    let columns = columns_for(name, records);

    let _ = write!(html, "<h2>{} <small>({})</small></h2>", escape_html(name), records.len());
    if records.is_empty() {
        html.push_str("<p class=\"empty\">No records.</p>");
        return;
    }

    html.push_str("<table><thead><tr><th>#</th><th>ID</th><th>Time</th><th>Client IP</th>");
    for column in &columns {
        let _ = write!(html, "<th>{}</th>", escape_html(column));
    }
    html.push_str("</tr></thead><tbody>");

    for (index, record) in records.iter().enumerate() {
        let time = record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>",
            index + 1,
            record.id,
            time,
            escape_html(&record.client_ip)
        );
        for column in &columns {
            let _ = write!(html, "<td>{}</td>", escape_html(record.field(column).unwrap_or("")));
        }
        html.push_str("</tr>");
    }

    html.push_str("</tbody></table>");
}

/// Expected fields first, then any extra field seen in the records.
fn columns_for(name: &str, records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = collection_defaults(name)
        .iter()
        .map(|(field, _)| (*field).to_string())
        .collect();

    let extra: BTreeSet<&String> = records
        .iter()
        .flat_map(|r| r.fields.keys())
        .filter(|k| !columns.contains(k))
        .collect();
    columns.extend(extra.into_iter().cloned());
    columns
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordId, HITS, PAGE};
    use chrono::Utc;

    fn record(id: u64, fields: &[(&str, &str)]) -> Record {
        Record {
            id: RecordId(id),
            timestamp: Utc::now(),
            client_ip: "127.0.0.1".into(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn escapes_values() {
        let mut collections = BTreeMap::new();
        collections.insert(
            HITS.to_string(),
            vec![record(1, &[("value", "<script>alert('x')</script>")])],
        );

        let html = render_dashboard(&collections);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn rows_keep_given_order_with_display_index() {
        let mut collections = BTreeMap::new();
        collections.insert(
            PAGE.to_string(),
            vec![record(9, &[("url", "newest")]), record(4, &[("url", "oldest")])],
        );

        let html = render_dashboard(&collections);
        let newest = html.find("newest").unwrap();
        let oldest = html.find("oldest").unwrap();
        assert!(newest < oldest);
        assert!(html.contains("<tr><td>1</td><td>9</td>"));
        assert!(html.contains("<tr><td>2</td><td>4</td>"));
    }

    #[test]
    fn extra_columns_follow_defaults() {
        let records = vec![record(1, &[("zeta", "z"), ("url", "u")])];
        let columns = columns_for(PAGE, &records);
        assert_eq!(columns, vec!["tag", "url", "cookies", "zeta"]);
    }

    #[test]
    fn empty_collection() {
        let mut collections = BTreeMap::new();
        collections.insert(PAGE.to_string(), Vec::new());
        assert!(render_dashboard(&collections).contains("No records."));
    }
}
