//! End-to-end tests: template package + context → rendered document

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use formdoc_core::diagnostics::codes;
use formdoc_core::{Context, Diagnostics};
use formdoc_ooxml::settings::TocSettings;
use formdoc_ooxml::test_utils::{
    create_docx, document_xml, drawing_paragraph, header_xml, paragraph, runs,
};
use formdoc_ooxml::{render_report, xml, DocumentEngine, OoxmlArchive, RenderOptions};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13];

fn context(value: serde_json::Value) -> Context {
    serde_json::from_value(value).unwrap()
}

/// Shared buffer the log subscriber writes to
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn texts(bytes: &[u8]) -> Vec<String> {
    DocumentEngine::from_bytes(bytes, Diagnostics::default())
        .unwrap()
        .paragraph_texts()
}

/// A report directory with a template, a config dir and one fragment
fn write_report(dir: &Path, body: &str) {
    let header = header_xml(&paragraph("<<Nombre entidad>> <<sin valor>>"));
    let template = create_docx(
        &document_xml(body),
        &[
            ("word/header1.xml", header.as_bytes()),
            ("word/media/image1.png", PNG),
        ],
    );
    fs::write(dir.join("plantilla.docx"), template).unwrap();
    fs::create_dir(dir.join("config")).unwrap();

    let fragment = create_docx(
        &document_xml(&[
            paragraph("Texto del anexo"),
            r#"<w:p><w:pPr><w:sectPr><w:cols w:num="2"/></w:sectPr></w:pPr></w:p>"#.to_string(),
        ]
        .concat()),
        &[],
    );
    fs::create_dir(dir.join("condiciones")).unwrap();
    fs::write(dir.join("condiciones").join("anexo.docx"), fragment).unwrap();
}

#[test]
fn test_full_render_pipeline() {
    let dir = TempDir::new().unwrap();
    let body = [
        runs(&["Informe de ", "<<Nombre ", "entidad>>", " para ", "<<Año>>"]),
        paragraph("<<Tabla partidas>>"),
        paragraph("<<Anexo condicional>>"),
        paragraph("Anexo IV - Discrepancias formales"),
        paragraph("Antes{salto}Después"),
        paragraph("1. <<sin rellenar>>"),
        drawing_paragraph(),
        "<w:p/><w:p/>".to_string(),
    ]
    .concat();
    write_report(dir.path(), &body);

    let ctx = context(json!({
        "<<Nombre entidad>>": "ACME",
        "<<Año>>": 2024,
        "_use_xml_engine": true,
        "_config_dir": dir.path().join("config").display().to_string(),
        "_cfg_tab": {"tables": {"partidas": {
            "marker": "<<Tabla partidas>>",
            "columns": [
                {"id": "partida", "header": "Partida"},
                {"id": "importe", "header": "Importe", "type": "number"}
            ]
        }}},
        "_table_inputs": {"partidas": [{"partida": "Ventas", "importe": 1500.5}]},
        "_simple_inputs": {},
        "_docs_to_insert": [{"marker": "<<Anexo condicional>>", "file": "condiciones/anexo.docx"}],
        "_condition_inputs": {"desarrollo_discrepancias_formales": "No"}
    }));

    let (diagnostics, sink) = Diagnostics::collecting();
    let out_dir = dir.path().join("salida");
    let output = render_report(
        &dir.path().join("plantilla.docx"),
        &ctx,
        "Informe: ACME",
        &RenderOptions::new(&out_dir),
        &diagnostics,
    )
    .unwrap();
    assert_eq!(output, out_dir.join("Informe_ ACME.docx"));

    let bytes = fs::read(&output).unwrap();
    let lines = texts(&bytes);
    assert_eq!(lines[0], "Informe de ACME para 2024");
    assert!(lines.contains(&"Ventas".to_string()));
    assert!(lines.contains(&"1,500.50".to_string()));
    assert!(lines.contains(&"Texto del anexo".to_string()));
    assert!(lines.contains(&"AntesDespués".to_string()));
    assert!(!lines.iter().any(|l| l.contains("Discrepancias")));
    assert!(!lines.iter().any(|l| l.contains("<<")));
    assert!(!lines.iter().any(|l| l.starts_with("1.")));

    let archive = OoxmlArchive::from_bytes(&bytes).unwrap();
    let document = archive.document_xml().unwrap();
    assert_eq!(xml::count_elements(document, &["w:drawing"]), 1);
    assert_eq!(xml::count_elements(document, &["w:sectPr"]), 1);
    assert_eq!(xml::count_elements(document, &["w:tbl"]), 1);
    assert!(String::from_utf8_lossy(document).contains(r#"<w:br w:type="page"/>"#));

    let header = archive.get_string("word/header1.xml").unwrap();
    assert!(header.contains("ACME"));
    assert!(!header.contains("&lt;&lt;"));
    assert_eq!(archive.get("word/media/image1.png"), Some(PNG));

    assert_eq!(sink.count_code(codes::STRUCTURE_LOSS), 0);
    assert_eq!(sink.count_code(codes::FRAGMENT_MISSING), 0);
    assert!(!sink.has_errors());
}

#[test]
fn test_render_logs_inside_spans() {
    let dir = TempDir::new().unwrap();
    write_report(dir.path(), &paragraph("<<Anexo>>"));
    let ctx = context(json!({
        "_config_dir": dir.path().join("config").display().to_string(),
        "_docs_to_insert": [{"marker": "<<Anexo>>", "file": "condiciones/anexo.docx"}]
    }));

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let output = tracing::subscriber::with_default(subscriber, || {
        render_report(
            &dir.path().join("plantilla.docx"),
            &ctx,
            "informe",
            &RenderOptions::new(dir.path().join("salida")),
            &Diagnostics::default(),
        )
    })
    .unwrap();
    assert!(texts(&fs::read(output).unwrap()).contains(&"Texto del anexo".to_string()));

    let logged = logs.contents();
    assert!(logged.contains("render_report{template="), "{}", logged);
    assert!(logged.contains("insert_fragment{marker=\"<<Anexo>>\""), "{}", logged);
    assert!(logged.contains("document written to"), "{}", logged);
}

#[test]
fn test_discrepancies_kept_when_developed() {
    let dir = TempDir::new().unwrap();
    write_report(dir.path(), &paragraph("Anexo IV – Discrepancias formales"));

    let ctx = context(json!({
        "_condition_inputs": {"desarrollo_discrepancias_formales": "Sí"}
    }));
    let output = render_report(
        &dir.path().join("plantilla.docx"),
        &ctx,
        "informe",
        &RenderOptions::new(dir.path()),
        &Diagnostics::default(),
    )
    .unwrap();
    assert_eq!(
        texts(&fs::read(output).unwrap()),
        vec!["Anexo IV – Discrepancias formales"]
    );
}

#[test]
fn test_zero_marker_roundtrip_keeps_parts() {
    let header = header_xml(&paragraph("Cabecera fija"));
    let footer = r#"<w:ftr xmlns:w="urn:w"><w:p><w:r><w:t>Pie</w:t></w:r></w:p></w:ftr>"#;
    let styles = r#"<w:styles xmlns:w="urn:w"><w:style w:styleId="Normal"/></w:styles>"#;
    let template = create_docx(
        &document_xml(&paragraph("Sin marcadores")),
        &[
            ("word/header1.xml", header.as_bytes()),
            ("word/footer1.xml", footer.as_bytes()),
            ("word/styles.xml", styles.as_bytes()),
            ("word/media/image1.png", PNG),
        ],
    );

    let engine = DocumentEngine::from_bytes(&template, Diagnostics::default()).unwrap();
    let saved = engine.save().unwrap();

    let before = OoxmlArchive::from_bytes(&template).unwrap();
    let after = OoxmlArchive::from_bytes(&saved).unwrap();
    for part in [
        "word/header1.xml",
        "word/footer1.xml",
        "word/styles.xml",
        "word/media/image1.png",
        "[Content_Types].xml",
        "_rels/.rels",
    ] {
        assert_eq!(before.get(part), after.get(part), "{} changed", part);
    }
    assert_eq!(texts(&saved), vec!["Sin marcadores"]);
}

#[test]
fn test_split_markers_replaced_everywhere() {
    let body = [
        runs(&["<<Nom", "bre", ">> y <<", "Nombre>>"]),
        "<w:tbl><w:tr><w:tc>".to_string(),
        runs(&["Celda <", "<Nombre>", ">"]),
        "</w:tc></w:tr></w:tbl>".to_string(),
    ]
    .concat();
    let template = create_docx(&document_xml(&body), &[]);
    let mut engine = DocumentEngine::from_bytes(&template, Diagnostics::default()).unwrap();

    let count = engine.replace_variables(&context(json!({"<<Nombre>>": "Ana"})));
    assert_eq!(count, 3);
    assert_eq!(engine.paragraph_texts(), vec!["Ana y Ana", "Celda Ana"]);
}

#[test]
fn test_fragment_splice_keeps_host_sections() {
    let dir = TempDir::new().unwrap();
    let fragment = create_docx(
        &document_xml(&[
            paragraph("Uno"),
            r#"<w:p><w:pPr><w:sectPr/></w:pPr><w:r><w:t>Dos</w:t></w:r></w:p>"#.to_string(),
        ]
        .concat()),
        &[],
    );
    fs::write(dir.path().join("frag.docx"), fragment).unwrap();

    let host = [
        r#"<w:p><w:pPr><w:sectPr><w:type w:val="continuous"/></w:sectPr></w:pPr><w:r><w:t>&lt;&lt;Bloque&gt;&gt;</w:t></w:r></w:p>"#.to_string(),
        paragraph("Fin"),
    ]
    .concat();
    let template = create_docx(&document_xml(&host), &[]);
    let (diagnostics, sink) = Diagnostics::collecting();
    let mut engine = DocumentEngine::from_bytes(&template, diagnostics).unwrap();
    let initial = engine.initial_counts();

    assert!(engine.insert_fragment("<<Bloque>>", &dir.path().join("frag.docx")));
    // The host paragraph carries a section break, so it stays
    assert_eq!(engine.paragraph_texts(), vec!["", "Uno", "Dos", "Fin"]);

    let saved = engine.save().unwrap();
    let archive = OoxmlArchive::from_bytes(&saved).unwrap();
    let sections = xml::count_elements(archive.document_xml().unwrap(), &["w:sectPr"]);
    assert_eq!(sections, initial.sections);
    assert_eq!(sink.count_code(codes::STRUCTURE_LOSS), 0);
}

#[test]
fn test_missing_table_marker_is_reported() {
    let template = create_docx(&document_xml(&paragraph("Sin tabla")), &[]);
    let (diagnostics, sink) = Diagnostics::collecting();
    let mut engine = DocumentEngine::from_bytes(&template, diagnostics).unwrap();

    let table: formdoc_core::tables::BuiltTable = formdoc_core::tables::BuiltTable {
        table_id: "t".into(),
        columns: Vec::new(),
        rows: Vec::new(),
        footer_rows: Vec::new(),
        headers: Default::default(),
    };
    let marker = "<<Tabla>>".to_string();
    let inserted = engine.insert_tables([(&marker, &table)], &Default::default());
    assert_eq!(inserted, 0);
    assert_eq!(sink.count_code(codes::MARKER_NOT_FOUND), 1);
}

#[test]
fn test_toc_page_numbers_in_document() {
    let body = [
        paragraph("<<Indice>>"),
        paragraph("<<1>>Opinión"),
        paragraph("<<2>>Fundamento"),
        paragraph("<<fin Indice>>"),
        paragraph("<<1>>Opinión"),
        paragraph("texto"),
        r#"<w:p><w:pPr><w:sectPr/></w:pPr></w:p>"#.to_string(),
        paragraph("<<2>>Fundamento"),
    ]
    .concat();
    let template = create_docx(&document_xml(&body), &[]);
    let mut engine = DocumentEngine::from_bytes(&template, Diagnostics::default()).unwrap();

    let summary = engine.resolve_toc(&TocSettings::default()).unwrap();
    assert_eq!(summary.paginated, 2);

    let lines = engine.paragraph_texts();
    assert!(lines[0].starts_with("Opinión ...") && lines[0].ends_with(" 2"), "{}", lines[0]);
    assert!(lines[1].starts_with("Fundamento ...") && lines[1].ends_with(" 3"), "{}", lines[1]);
    // The end marker paragraph now carries the break before the first heading
    assert_eq!(&lines[2..], ["", "Opinión", "texto", "", "Fundamento"]);
}
