//! Integration tests for the formdoc CLI commands
//!
//! Each test builds a report directory (manifest, configuration and an
//! in-memory template) in a temporary directory and drives the commands
//! through the library API.

use std::fs;
use std::path::Path;

use formdoc_cli::{
    check_command, eval_command, load_settings, load_variables, render_command, MetadataStore,
    OutputFormat, RenderRequest,
};
use formdoc_core::Diagnostics;
use formdoc_ooxml::test_utils::{create_docx, document_xml, paragraph};
use formdoc_ooxml::DocumentEngine;
use tempfile::TempDir;

const MANIFEST: &str = "\
id: carta
nombre: Carta de encargo
version: 1.2
paths:
  template: plantilla.docx
  config_dir: config
";

const SIMPLE: &str = "\
variables_simples:
  - id: nombre_entidad
    nombre: Nombre de la entidad
    marker: <<Nombre entidad>>
    requerido: true
  - id: ejercicio
    nombre: Ejercicio
    tipo: numero
";

const BLOCKS: &str = "\
bloques_texto:
  - id: saludo
    reglas:
      - cuando: ejercicio >= 2024
        plantilla: Encargo del ejercicio {{ ejercicio }}
      - plantilla: Encargo anterior
";

fn write_report(dir: &Path) {
    fs::write(dir.join("manifest.yaml"), MANIFEST).unwrap();
    let config = dir.join("config");
    fs::create_dir(&config).unwrap();
    fs::write(config.join("variables_simples.yaml"), SIMPLE).unwrap();
    fs::write(config.join("bloques_texto.yaml"), BLOCKS).unwrap();

    let body = [
        paragraph("Entidad: <<Nombre entidad>>"),
        paragraph("<<saludo>>"),
        paragraph("<<campo sin respuesta>>"),
    ]
    .concat();
    fs::write(dir.join("plantilla.docx"), create_docx(&document_xml(&body), &[])).unwrap();
}

fn texts(path: &Path) -> Vec<String> {
    DocumentEngine::from_bytes(&fs::read(path).unwrap(), Diagnostics::default())
        .unwrap()
        .paragraph_texts()
}

fn request(dir: &TempDir) -> RenderRequest {
    let report_dir = dir.path().join("carta");
    let mut request = RenderRequest::new(&report_dir, dir.path().join("outputs"));
    request.metadata_file = dir.path().join("metadata").join("metadata.json");
    request
}

fn setup() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let report_dir = dir.path().join("carta");
    fs::create_dir(&report_dir).unwrap();
    write_report(&report_dir);
    fs::write(
        dir.path().join("respuestas.yaml"),
        "nombre_entidad: Empresa Ejemplo S.A.\nejercicio: 2024\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_render_writes_document_and_record() {
    let dir = setup();
    let mut request = request(&dir);
    request.input = Some(dir.path().join("respuestas.yaml"));
    request.name = Some("carta: 2024".to_string());

    let output = render_command(&request).unwrap();
    assert_eq!(output, dir.path().join("outputs").join("carta_ 2024.docx"));
    assert_eq!(
        texts(&output),
        vec!["Entidad: Empresa Ejemplo S.A.", "Encargo del ejercicio 2024"]
    );

    let store = MetadataStore::new(&request.metadata_file);
    let records = store.load_all().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.report_id, "carta");
    assert_eq!(record.report_name, "Carta de encargo");
    assert_eq!(record.template_version, "1.2");
    assert_eq!(record.output_filename, "carta_ 2024.docx");
    assert_eq!(record.input_data["nombre_entidad"], "Empresa Ejemplo S.A.");
}

#[test]
fn test_render_from_record_reproduces_document() {
    let dir = setup();
    let mut first = request(&dir);
    first.input = Some(dir.path().join("respuestas.yaml"));
    first.name = Some("original".to_string());
    let original = render_command(&first).unwrap();

    let store = MetadataStore::new(&first.metadata_file);
    let id = store.load_all().unwrap()[0].id.clone();

    let mut again = request(&dir);
    again.from_record = Some(id);
    again.name = Some("copia".to_string());
    again.record_metadata = false;
    let copy = render_command(&again).unwrap();

    assert_eq!(texts(&copy), texts(&original));
    assert_eq!(store.load_all().unwrap().len(), 1);
}

#[test]
fn test_render_needs_answers() {
    let dir = setup();
    let err = render_command(&request(&dir)).unwrap_err();
    assert!(err.to_string().contains("No answers given"), "{}", err);
}

#[test]
fn test_render_unknown_record() {
    let dir = setup();
    let mut request = request(&dir);
    request.from_record = Some("meta_20240101_000000_XXXXXX".to_string());
    let err = render_command(&request).unwrap_err();
    assert!(err.to_string().contains("not found"), "{}", err);
}

#[test]
fn test_check_reports_invalid_configuration() {
    let dir = setup();
    let report_dir = dir.path().join("carta");
    assert!(check_command(&report_dir, OutputFormat::Text).unwrap());

    let duplicated = format!(
        "{}  - id: ejercicio\n    nombre: Otra vez\n",
        SIMPLE
    );
    fs::write(report_dir.join("config").join("variables_simples.yaml"), duplicated).unwrap();
    assert!(!check_command(&report_dir, OutputFormat::Json).unwrap());

    assert!(!check_command(&dir.path().join("no_existe"), OutputFormat::Text).unwrap());
}

#[test]
fn test_eval_with_context_file() {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("contexto.json");
    fs::write(&context, r#"{"tipo_opinion": "favorable", "importe": 1500}"#).unwrap();

    let trace = eval_command(
        "tipo_opinion == 'favorable' and importe > 1000",
        Some(&context),
        false,
    )
    .unwrap();
    assert!(trace.result);
    assert!(trace.is_valid);

    let trace = eval_command("tipo_opinion ==", Some(&context), true).unwrap();
    assert!(!trace.result);
    assert!(!trace.is_valid);
    assert!(trace.error.is_some());
}

#[test]
fn test_load_variables_requires_mapping() {
    let dir = TempDir::new().unwrap();
    let list = dir.path().join("lista.yaml");
    fs::write(&list, "- uno\n- dos\n").unwrap();
    assert!(load_variables(&list).is_err());

    let empty = dir.path().join("vacio.yaml");
    fs::write(&empty, "").unwrap();
    assert!(load_variables(&empty).unwrap().is_empty());
}

#[test]
fn test_settings_from_report_directory() {
    let dir = setup();
    let report_dir = dir.path().join("carta");
    assert_eq!(load_settings(None, &report_dir).unwrap().toc.width, 80);

    fs::write(report_dir.join("formdoc.toml"), "[toc]\nwidth = 60\n").unwrap();
    assert_eq!(load_settings(None, &report_dir).unwrap().toc.width, 60);

    let explicit = dir.path().join("otro.toml");
    fs::write(&explicit, "[markers]\npage_break = \"{pagina}\"\n").unwrap();
    let settings = load_settings(Some(&explicit), &report_dir).unwrap();
    assert_eq!(settings.markers.page_break, "{pagina}");
    assert_eq!(settings.toc.width, 80);
}
