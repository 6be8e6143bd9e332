//! Integration tests for the extraction and quality pipeline.
//!
//! These tests build small jurisdiction trees on disk and run the orchestrator
//! and the classifier end-to-end, checking the files they leave behind.

use pdn_core::config::{ExtractionConfig, QualityConfig};
use pdn_core::csv;
use pdn_core::orchestrator::{OutcomeStatus, Orchestrator, SkipReason};
use pdn_core::quality;
use pdn_core::relations::{DECLARATIONS, PROCUREMENT};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

fn settings(input: &Path, output: &Path) -> ExtractionConfig {
    ExtractionConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        max_workers: 2,
        ..ExtractionConfig::declarations()
    }
}

fn read_csv(path: &Path) -> Vec<Vec<String>> {
    csv::parse(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn declaration(id: &str, annual: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "metadata": {"actualizacion": "2023-05-01", "tipo": "MODIFICACIÓN"},
        "declaracion": {"situacionPatrimonial": {
            "datosGenerales": {"nombre": "ANA", "primerApellido": "LÓPEZ"},
            "ingresos": {
                "remuneracionMensualCargoPublico": {"valor": 30000},
                "ingresoMensualNetoDeclarante": 30000,
                "ingresoAnualNetoDeclarante": annual
            },
            "bienesInmuebles": {"bienInmueble": []}
        }}
    })
}

#[tokio::test]
async fn test_negative_income_ends_in_audit_log() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("states");
    let extracted = root.path().join("csv_outputs");
    let clean = root.path().join("clean_data");

    write_json(
        &input.join("Colima/completo.json"),
        &json!([{
            "id": "neg-1",
            "declaracion": {"situacionPatrimonial": {"ingresos": {
                "ingresoAnualNetoDeclarante": {"valor": -500}
            }}}
        }]),
    );

    let summary = Orchestrator::new(&DECLARATIONS, settings(&input, &extracted))
        .run()
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);

    let report = quality::partition(&QualityConfig {
        input_dir: extracted.clone(),
        output_dir: clean.clone(),
        ..QualityConfig::default()
    })
    .unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.clean, 0);
    assert_eq!(report.rejected, 1);

    let audit = read_csv(&clean.join("audit_log_ingresos.csv"));
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[1][0], "neg-1");
    assert_eq!(audit[1][3], "-500");
    assert_eq!(audit[1][4], "negative annual income");
    assert_eq!(read_csv(&clean.join("s1_ingresos_clean.csv")).len(), 1);
}

#[tokio::test]
async fn test_empty_real_estate_list_yields_summary_only() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("states");
    let output = root.path().join("out");
    write_json(
        &input.join("Morelos/completo.json"),
        &json!([declaration("d-1", json!(360000))]),
    );

    let summary = Orchestrator::new(&DECLARATIONS, settings(&input, &output))
        .run()
        .await
        .unwrap();
    let outcome = summary.outcome("Morelos").unwrap();
    let OutcomeStatus::Processed { rows, .. } = &outcome.status else {
        panic!("Morelos should be processed: {:?}", outcome.status);
    };
    assert_eq!(rows.get("s1_resumen"), Some(&1));
    assert_eq!(rows.get("s1_bienes_inmuebles"), None);
    assert!(!output.join("Morelos/s1_bienes_inmuebles.csv").exists());

    let resumen = read_csv(&output.join("Morelos/s1_resumen.csv"));
    assert_eq!(resumen.len(), 2);
    assert_eq!(resumen[1][0], "d-1");
    assert_eq!(resumen[1][1], "Morelos");
}

#[tokio::test]
async fn test_rerun_skips_processed_jurisdictions() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("states");
    let output = root.path().join("out");
    for name in ["Colima", "Jalisco"] {
        write_json(
            &input.join(name).join("completo.json"),
            &json!([declaration(&format!("{name}-1"), json!(100))]),
        );
    }

    let first = Orchestrator::new(&DECLARATIONS, settings(&input, &output))
        .run()
        .await
        .unwrap();
    assert_eq!(first.processed, 2);

    let before = std::fs::metadata(output.join("Colima/s1_resumen.csv"))
        .unwrap()
        .modified()
        .unwrap();
    let second = Orchestrator::new(&DECLARATIONS, settings(&input, &output))
        .run()
        .await
        .unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped_already_processed, 2);
    let after = std::fs::metadata(output.join("Colima/s1_resumen.csv"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(before, after);

    let mut forced = settings(&input, &output);
    forced.force_reprocess = vec!["Jalisco".into()];
    let third = Orchestrator::new(&DECLARATIONS, forced).run().await.unwrap();
    assert_eq!(third.processed, 1);
    assert_eq!(third.skipped_already_processed, 1);
    assert!(matches!(
        third.outcome("Colima").unwrap().status,
        OutcomeStatus::Skipped {
            reason: SkipReason::AlreadyProcessed
        }
    ));
}

#[tokio::test]
async fn test_bad_json_fails_only_its_jurisdiction() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("states");
    let output = root.path().join("out");
    std::fs::create_dir_all(input.join("Broken")).unwrap();
    std::fs::write(input.join("Broken/completo.json"), "[{\"id\": ").unwrap();
    std::fs::create_dir_all(input.join("Empty")).unwrap();
    write_json(
        &input.join("Sonora/completo.json"),
        &json!([declaration("s-1", json!(1)), "noise"]),
    );

    let summary = Orchestrator::new(&DECLARATIONS, settings(&input, &output))
        .run()
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped_missing_source, 1);

    let names: Vec<_> = summary.outcomes.iter().map(|o| o.jurisdiction.as_str()).collect();
    assert_eq!(names, vec!["Broken", "Empty", "Sonora"]);
    assert!(!output.join("Broken/s1_resumen.csv").exists());
    let OutcomeStatus::Processed {
        skipped_entries, ..
    } = summary.outcome("Sonora").unwrap().status
    else {
        panic!("Sonora should be processed");
    };
    assert_eq!(skipped_entries, 1);
}

#[tokio::test]
async fn test_missing_input_root_fails_fast() {
    let root = tempfile::tempdir().unwrap();
    let result = Orchestrator::new(
        &DECLARATIONS,
        settings(&root.path().join("nope"), &root.path().join("out")),
    )
    .run()
    .await;
    assert!(matches!(
        result,
        Err(pdn_core::PipelineError::InputRootMissing { .. })
    ));
}

#[tokio::test]
async fn test_procurement_releases_package() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("PDN_S6");
    let output = root.path().join("out");
    write_json(
        &input.join("puebla_releases.json"),
        &json!({"releases": [{
            "ocid": "ocds-1",
            "tender": {"title": "Obra", "value": {"amount": 10, "currency": "MXN"}},
            "awards": [{"id": "a1", "suppliers": [{"name": "X"}, {"name": "Y"}]}]
        }]}),
    );

    let config = ExtractionConfig {
        input_dir: input,
        output_dir: output.clone(),
        ..ExtractionConfig::procurement()
    };
    let summary = Orchestrator::new(&PROCUREMENT, config).run().await.unwrap();
    assert_eq!(summary.processed, 1);

    let awards = read_csv(&output.join("puebla/awards.csv"));
    assert_eq!(&awards[0][..3], &["ocid", "state", "item_index"]);
    assert_eq!(awards[1].last().unwrap(), "X, Y");
    let general = read_csv(&output.join("puebla/general.csv"));
    assert_eq!(general[1][0], "ocds-1");
}
