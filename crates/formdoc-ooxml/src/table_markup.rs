//! WordprocessingML markup for built tables

use formdoc_core::tables::{format_cell, BuiltTable, ColumnSpec, Row};
use serde_json::Value;

use crate::wml::{Block, BreakKind, Paragraph, ParagraphChild, Run, Table};
use crate::xml::Element;

/// Width of a full-page table, in fiftieths of a percent
const TABLE_WIDTH_PCT: usize = 5000;
const HEADER_FILL: &str = "4472C4";
const HEADER_COLOR: &str = "FFFFFF";
const BORDERS: [&str; 6] = ["top", "left", "bottom", "right", "insideH", "insideV"];

/// Non-breaking space
pub const NBSP: &str = "\u{00A0}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowStyle {
    Header,
    Body,
    Footer,
}

/// Markup for a built table: a header row, then body rows, then bold
/// footer rows
pub fn table_markup(table: &BuiltTable) -> Table {
    let mut tbl = Element::new("w:tbl").with_child(table_properties());

    let mut grid = Element::new("w:tblGrid");
    let width = TABLE_WIDTH_PCT / table.columns.len().max(1);
    for _ in &table.columns {
        grid = grid.with_child(Element::new("w:gridCol").with_attr("w:w", width.to_string()));
    }
    tbl = tbl.with_child(grid);

    let headers: Vec<String> = table
        .columns
        .iter()
        .map(|c| c.header_text(&table.headers))
        .collect();
    tbl = tbl.with_child(table_row(&headers, RowStyle::Header));

    for row in &table.rows {
        tbl = tbl.with_child(table_row(&cell_values(&table.columns, row), RowStyle::Body));
    }
    for row in &table.footer_rows {
        tbl = tbl.with_child(table_row(&cell_values(&table.columns, row), RowStyle::Footer));
    }

    Table::from_element(tbl)
}

fn table_properties() -> Element {
    let mut borders = Element::new("w:tblBorders");
    for side in BORDERS {
        borders = borders.with_child(
            Element::new(format!("w:{}", side))
                .with_attr("w:val", "single")
                .with_attr("w:sz", "4")
                .with_attr("w:space", "0")
                .with_attr("w:color", "auto"),
        );
    }
    Element::new("w:tblPr")
        .with_child(Element::new("w:tblStyle").with_attr("w:val", "TableGrid"))
        .with_child(
            Element::new("w:tblW")
                .with_attr("w:w", TABLE_WIDTH_PCT.to_string())
                .with_attr("w:type", "pct"),
        )
        .with_child(borders)
}

fn cell_values(columns: &[ColumnSpec], row: &Row) -> Vec<String> {
    columns
        .iter()
        .map(|c| format_cell(row.get(&c.id).unwrap_or(&Value::Null), c.column_type))
        .collect()
}

fn table_row(values: &[String], style: RowStyle) -> Element {
    let mut tr = Element::new("w:tr");
    for value in values {
        let mut tc_pr = Element::new("w:tcPr");
        if style == RowStyle::Header {
            tc_pr = tc_pr.with_child(
                Element::new("w:shd")
                    .with_attr("w:val", "clear")
                    .with_attr("w:fill", HEADER_FILL),
            );
        }

        let mut r_pr = Element::new("w:rPr");
        if style != RowStyle::Body {
            r_pr = r_pr.with_child(Element::new("w:b"));
        }
        if style == RowStyle::Header {
            r_pr = r_pr.with_child(Element::new("w:color").with_attr("w:val", HEADER_COLOR));
        }

        let mut t = Element::new("w:t").with_attr("xml:space", "preserve");
        if !value.is_empty() {
            t = t.with_child(crate::xml::Node::Text(value.clone()));
        }

        let paragraph = Element::new("w:p")
            .with_child(
                Element::new("w:pPr").with_child(Element::new("w:jc").with_attr("w:val", "left")),
            )
            .with_child(Element::new("w:r").with_child(r_pr).with_child(t));

        tr = tr.with_child(Element::new("w:tc").with_child(tc_pr).with_child(paragraph));
    }
    tr
}

/// Paragraph holding a single non-breaking space, placed after tables
pub fn spacer_paragraph() -> Paragraph {
    let mut paragraph = Paragraph::with_text(NBSP);
    for node in paragraph.text_nodes_mut() {
        node.tag.set_attr("xml:space", "preserve");
    }
    paragraph
}

/// Paragraph holding a single column break
pub fn column_break_paragraph() -> Paragraph {
    let mut paragraph = Paragraph::new();
    paragraph
        .children
        .push(ParagraphChild::Run(Run::with_break(BreakKind::Column)));
    paragraph
}

/// Blocks inserted after a marker paragraph for one table
pub fn table_blocks(table: &BuiltTable) -> [Block; 2] {
    [
        Block::Table(table_markup(table)),
        Block::Paragraph(spacer_paragraph()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use formdoc_core::tables::{row_from, ColumnType};
    use serde_json::json;

    fn partidas() -> BuiltTable {
        let mut table = BuiltTable {
            table_id: "partidas".into(),
            columns: vec![
                ColumnSpec {
                    id: "partida".into(),
                    header: "Partida".into(),
                    header_template: None,
                    column_type: ColumnType::Text,
                },
                ColumnSpec {
                    id: "importe".into(),
                    header: String::new(),
                    header_template: Some("{ejercicio_actual}".into()),
                    column_type: ColumnType::Number,
                },
            ],
            rows: Vec::new(),
            footer_rows: Vec::new(),
            headers: Default::default(),
        };
        table
            .headers
            .insert("ejercicio_actual".into(), "2024".into());
        table
    }

    fn written(table: &Table) -> String {
        let mut out = String::new();
        table.write(&mut out);
        out
    }

    #[test]
    fn test_header_row_style() {
        let table = partidas();
        let xml = written(&table_markup(&table));
        assert!(xml.contains(r#"<w:tblStyle w:val="TableGrid"/>"#));
        assert!(xml.contains(r#"<w:tblW w:w="5000" w:type="pct"/>"#));
        assert!(xml.contains(r#"<w:gridCol w:w="2500"/>"#));
        assert!(xml.contains(r#"<w:shd w:val="clear" w:fill="4472C4"/>"#));
        let header_cell =
            r#"<w:rPr><w:b/><w:color w:val="FFFFFF"/></w:rPr><w:t xml:space="preserve">2024</w:t>"#;
        assert!(xml.contains(header_cell));
        assert!(xml.contains(">Partida<"));
    }

    #[test]
    fn test_body_and_footer_rows() {
        let mut table = partidas();
        table.rows.push(row_from([("partida", json!("Ventas")), ("importe", json!(1234567.891))]));
        table.footer_rows.push(row_from([("partida", json!("Total")), ("importe", json!(null))]));

        let built = table_markup(&table);
        assert_eq!(built.rows().count(), 3);
        let xml = written(&built);
        assert!(xml.contains(r#"<w:rPr/><w:t xml:space="preserve">1,234,567.89</w:t>"#));
        assert!(xml.contains(r#"<w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Total</w:t>"#));
        assert!(xml.contains(r#"<w:rPr><w:b/></w:rPr><w:t xml:space="preserve"/>"#));
    }

    #[test]
    fn test_spacer_and_column_break() {
        let spacer = spacer_paragraph();
        assert_eq!(spacer.text(), NBSP);
        let mut out = String::new();
        column_break_paragraph().write(&mut out);
        assert_eq!(out, r#"<w:p><w:r><w:br w:type="column"/></w:r></w:p>"#);
    }
}
