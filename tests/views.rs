//! Integration tests for the public view API: parse → render → export.
//!
//! These need no model and no network; they build `Extraction`s from CSV
//! text the way the pipeline would after a successful model call.

use edgequake_img2table::export::{DEFAULT_FILE_STEM, UTF8_BOM};
use edgequake_img2table::{write_export, Extraction, Img2TableError, Session, Table, View};
use serde_json::Value;

const INVOICE_CSV: &str = "Item,Qty,Price\nWidget,2,9.99\nGadget,1,24.50\n\"Bolt, M4\",100,0.05";

fn invoice() -> Extraction {
    Extraction::from_csv("scans/invoice.png", INVOICE_CSV)
}

#[test]
fn parsed_table_has_header_and_body() {
    let e = invoice();
    assert_eq!(e.table.row_count(), 4);
    assert_eq!(e.table.width(), 3);
    let header: Vec<&str> = e
        .table
        .header()
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(header, ["Item", "Qty", "Price"]);
    assert_eq!(e.table.body()[2][0], "Bolt, M4");
}

#[test]
fn json_view_is_records_keyed_by_header() {
    let json = View::Json.render(&invoice()).unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    let records = value.as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["Item"], "Widget");
    assert_eq!(records[2]["Item"], "Bolt, M4");
    assert_eq!(records[2]["Qty"], "100");
}

#[test]
fn json_view_keeps_header_order() {
    let json = View::Json
        .render(&Extraction::from_csv("x", "Zeta,Alpha\n1,2"))
        .unwrap();
    let zeta = json.find("Zeta").unwrap();
    let alpha = json.find("Alpha").unwrap();
    assert!(zeta < alpha);
}

#[test]
fn ragged_rows_survive_every_view() {
    let e = Extraction::from_csv("x", "A,B,C\n1\n1,2,3,4");
    assert!(e.table.is_ragged());

    let md = View::Markdown.render(&e).unwrap();
    assert_eq!(
        md,
        "| A | B | C |  |\n| --- | --- | --- | --- |\n| 1 |  |  |  |\n| 1 | 2 | 3 | 4 |"
    );

    let json: Value = serde_json::from_str(&View::Json.render(&e).unwrap()).unwrap();
    assert_eq!(json[0].as_object().unwrap().len(), 1);
    assert_eq!(json[1].as_object().unwrap().len(), 3);

    let html = View::Table.render(&e).unwrap();
    assert_eq!(html.matches("<tr>").count(), 3);
}

#[test]
fn header_only_table() {
    let e = Extraction::from_csv("x", "A,B");
    assert_eq!(View::Json.render(&e).unwrap(), "[]");
    assert_eq!(
        View::Markdown.render(&e).unwrap(),
        "| A | B |\n| --- | --- |"
    );
}

#[test]
fn view_names_round_trip_through_display() {
    for view in [View::Table, View::Csv, View::Json, View::Markdown] {
        assert_eq!(view.to_string().parse::<View>().unwrap(), view);
    }
    assert!(matches!(
        "xlsx".parse::<View>(),
        Err(Img2TableError::InvalidConfig(_))
    ));
}

#[test]
fn downloads_per_view() {
    let e = invoice();

    let csv = View::Csv.export(&e, DEFAULT_FILE_STEM).unwrap();
    assert_eq!(csv.file_name, "data.csv");
    assert_eq!(csv.mime_type, "text/csv");
    assert!(csv.contents.starts_with(UTF8_BOM.as_bytes()));

    let table = View::Table.export(&e, DEFAULT_FILE_STEM).unwrap();
    assert_eq!(table, csv);

    let json = View::Json.export(&e, "invoice").unwrap();
    assert_eq!(json.file_name, "invoice.json");
    assert_eq!(json.mime_type, "application/json");
    assert!(!json.contents.starts_with(UTF8_BOM.as_bytes()));

    let md = View::Markdown.export(&e, "invoice").unwrap();
    assert_eq!(md.file_name, "invoice.md");
    assert_eq!(md.mime_type, "text/markdown");
}

#[test]
fn session_follows_active_view() {
    let mut session = Session::new();
    assert!(session.rendered().is_none());
    assert!(session.download().is_none());
    assert!(matches!(
        session.copy_text(),
        Err(Img2TableError::NothingToCopy)
    ));

    session.load(invoice());
    assert_eq!(session.view(), View::Table);
    assert!(session.rendered().unwrap().unwrap().starts_with("<table>"));
    assert_eq!(session.copy_text().unwrap(), INVOICE_CSV);

    session.switch_view(View::Markdown);
    let copied = session.copy_text().unwrap();
    assert!(copied.starts_with("| Item | Qty | Price |"));
    assert_eq!(session.download().unwrap().unwrap().file_name, "data.md");

    session.load(Extraction::from_csv("other.png", "X\n1"));
    assert_eq!(session.view(), View::Markdown);
    assert_eq!(session.extraction().unwrap().source, "other.png");
}

#[test]
fn write_export_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    let written =
        tokio_test::block_on(write_export(&invoice(), dir.path(), View::Markdown)).unwrap();
    assert_eq!(written, dir.path().join("invoice.md"));
    let text = std::fs::read_to_string(&written).unwrap();
    assert!(text.contains("| Bolt, M4 | 100 | 0.05 |"));
}

#[test]
fn write_export_to_explicit_file_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.csv");
    std::fs::write(&target, "old").unwrap();

    let written = View::Csv
        .export(&invoice(), DEFAULT_FILE_STEM)
        .unwrap()
        .write_to(&target)
        .unwrap();
    assert_eq!(written, target);

    let bytes = std::fs::read(&target).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text.strip_prefix(UTF8_BOM).unwrap(), INVOICE_CSV);
}

#[test]
fn table_round_trips_through_normalised_csv() {
    let t = Table::parse(INVOICE_CSV);
    assert_eq!(Table::parse(&t.to_csv()), t);
}

#[test]
fn extraction_serialises_with_stats() {
    let json = serde_json::to_value(invoice()).unwrap();
    assert_eq!(json["source"], "scans/invoice.png");
    assert_eq!(json["raw_csv"], INVOICE_CSV);
    assert!(json["stats"].is_object());
}
