//! Asset and interest declarations (System 1).
//!
//! Paths follow the declaration layout `declaracion.situacionPatrimonial.*`
//! and `declaracion.interes.*`. Candidate keys cover the singular/plural
//! renames seen across schema versions.

use serde_json::Value;

use super::{Corpus, CorpusKind, RelationDef, Scope};
use crate::resolve::{child, descend, field, first_mapping, first_present, holders, money, value};

/// The declarations corpus.
pub static DECLARATIONS: Corpus = Corpus {
    kind: CorpusKind::Declarations,
    record_key: "id",
    parent_key: "id_declaracion",
    primary: "s1_resumen",
    relations: &[
        RelationDef {
            name: "s1_resumen",
            scope: Scope::Record,
            columns: &[
                "fecha_actualizacion",
                "institucion",
                "tipo_declaracion",
                "nombre",
                "primer_apellido",
                "segundo_apellido",
                "correo",
                "empleo_nombre_ente",
                "empleo_cargo",
                "empleo_nivel",
            ],
            row: summary_row,
        },
        RelationDef {
            name: "s1_experiencia_laboral",
            scope: Scope::Items {
                path: &[&["declaracion"], &["situacionPatrimonial"], &["experienciaLaboral"]],
                candidates: &["experiencia"],
            },
            columns: &[
                "ambito_sector",
                "nivel_gobierno",
                "ambito_publico",
                "nombre_ente",
                "area_adscripcion",
                "empleo_cargo",
                "fecha_ingreso",
                "fecha_egreso",
                "ubicacion",
            ],
            row: work_history_row,
        },
        RelationDef {
            name: "s1_datos_pareja",
            scope: Scope::Section {
                path: &[&["declaracion"], &["situacionPatrimonial"], &["datosPareja"]],
                skip_flag: Some("ninguno"),
            },
            columns: &[
                "nombre",
                "primer_apellido",
                "segundo_apellido",
                "relacion",
                "ciudadano_extranjero",
                "curp",
                "habita_domicilio",
                "actividad_laboral",
            ],
            row: spouse_row,
        },
        RelationDef {
            name: "s1_dependientes_economicos",
            scope: Scope::Items {
                path: &[
                    &["declaracion"],
                    &["situacionPatrimonial"],
                    &["datosDependientesEconomicos"],
                ],
                candidates: &["dependienteEconomico", "dependientes"],
            },
            columns: &[
                "nombre",
                "primer_apellido",
                "segundo_apellido",
                "parentesco",
                "ciudadano_extranjero",
                "actividad_laboral",
            ],
            row: dependent_row,
        },
        RelationDef {
            name: "s1_ingresos",
            scope: Scope::Record,
            columns: &[
                "remuneracion_mensual_cargo",
                "otros_ingresos_mensuales",
                "ingreso_mensual_neto",
                "ingreso_anual_neto",
            ],
            row: income_row,
        },
        RelationDef {
            name: "s1_bienes_inmuebles",
            scope: Scope::Items {
                path: &[&["declaracion"], &["situacionPatrimonial"], &["bienesInmuebles"]],
                candidates: &["bienInmueble", "bienesInmuebles"],
            },
            columns: &[
                "tipo_inmueble",
                "titular",
                "valor_adquisicion",
                "moneda",
                "forma_adquisicion",
                "fecha_adquisicion",
            ],
            row: real_estate_row,
        },
        RelationDef {
            name: "s1_bienes_muebles",
            scope: Scope::Items {
                path: &[&["declaracion"], &["situacionPatrimonial"], &["bienesMuebles"]],
                candidates: &["bienMueble", "bienesMuebles"],
            },
            columns: &[
                "tipo_bien",
                "descripcion",
                "titular",
                "valor_adquisicion",
                "moneda",
                "forma_adquisicion",
                "fecha_adquisicion",
            ],
            row: movable_goods_row,
        },
        RelationDef {
            name: "s1_vehiculos",
            scope: Scope::Items {
                path: &[&["declaracion"], &["situacionPatrimonial"], &["vehiculos"]],
                candidates: &["vehiculo", "vehiculos"],
            },
            columns: &[
                "tipo_vehiculo",
                "marca",
                "modelo",
                "anio",
                "valor_adquisicion",
                "moneda",
                "fecha_adquisicion",
                "forma_adquisicion",
            ],
            row: vehicle_row,
        },
        RelationDef {
            name: "s1_inversiones",
            scope: Scope::Items {
                path: &[
                    &["declaracion"],
                    &["situacionPatrimonial"],
                    &["inversionesCuentasValores", "inversiones"],
                ],
                candidates: &["inversion", "inversiones"],
            },
            columns: &[
                "tipo_inversion",
                "subtipo_inversion",
                "institucion",
                "numero_cuenta",
                "saldo_situacion_actual",
                "moneda",
                "pais",
            ],
            row: investment_row,
        },
        RelationDef {
            name: "s1_adeudos_pasivos",
            scope: Scope::Items {
                path: &[&["declaracion"], &["situacionPatrimonial"], &["adeudosPasivos"]],
                candidates: &["adeudo", "adeudos"],
            },
            columns: &[
                "tipo_adeudo",
                "monto_original",
                "saldo_pendiente",
                "moneda",
                "fecha_adquisicion",
                "institucion",
                "otorgante",
            ],
            row: liability_row,
        },
        RelationDef {
            name: "s1_prestamo_comodato",
            scope: Scope::Items {
                path: &[&["declaracion"], &["situacionPatrimonial"], &["prestamoOComodato"]],
                candidates: &["prestamo"],
            },
            columns: &[
                "tipo_bien",
                "marca",
                "modelo",
                "anio",
                "registro",
                "relacion_dueno",
                "dueno",
            ],
            row: loan_row,
        },
        RelationDef {
            name: "interes_apoyos",
            scope: Scope::Items {
                path: &[&["declaracion"], &["interes"], &["apoyos"]],
                candidates: &["apoyo", "apoyos"],
            },
            columns: &[
                "beneficiario",
                "nombre_programa",
                "institucion_otorgante",
                "nivel_gobierno",
                "tipo_apoyo",
                "forma_recepcion",
                "monto_apoyo",
                "moneda",
            ],
            row: support_row,
        },
        RelationDef {
            name: "interes_participacion",
            scope: Scope::Items {
                path: &[&["declaracion"], &["interes"], &["participacion"]],
                candidates: &["participacion", "participaciones"],
            },
            columns: &[
                "nombre_empresa",
                "tipo_participacion",
                "porcentaje",
                "sector",
                "recibe_remuneracion",
            ],
            row: participation_row,
        },
    ],
};

fn patrimonial(record: &Value) -> &Value {
    descend(record, &[&["declaracion"], &["situacionPatrimonial"]])
}

fn summary_row(record: &Value) -> Vec<Value> {
    let metadata = child(record, "metadata");
    let general = child(patrimonial(record), "datosGenerales");
    let employment = first_mapping(patrimonial(record), "datosEmpleoCargoComision");

    // Newer schemas split the address into institutional/personal.
    let email = match general.get("correoElectronico") {
        Some(Value::Object(_)) => field(child(general, "correoElectronico"), "institucional"),
        _ => field(general, "correoElectronico"),
    };

    vec![
        field(metadata, "actualizacion"),
        field(metadata, "institucion"),
        field(metadata, "tipo"),
        field(general, "nombre"),
        field(general, "primerApellido"),
        field(general, "segundoApellido"),
        email,
        field(employment, "nombreEntePublico"),
        field(employment, "empleoCargoComision"),
        field(employment, "nivelEmpleoCargoComision"),
    ]
}

fn work_history_row(item: &Value) -> Vec<Value> {
    vec![
        value(item, "ambitoSector"),
        value(item, "nivelOrdenGobierno"),
        value(item, "ambitoPublico"),
        field(item, "nombreEntePublico"),
        field(item, "areaAdscripcion"),
        field(item, "empleoCargoComision"),
        field(item, "fechaIngreso"),
        field(item, "fechaEgreso"),
        value(item, "ubicacion"),
    ]
}

fn spouse_row(spouse: &Value) -> Vec<Value> {
    vec![
        field(spouse, "nombre"),
        field(spouse, "primerApellido"),
        field(spouse, "segundoApellido"),
        value(spouse, "relacionConDeclarante"),
        field(spouse, "ciudadanoExtranjero"),
        field(spouse, "curp"),
        field(spouse, "habitaDomicilioDeclarante"),
        value(spouse, "actividadLaboralSectorPublico"),
    ]
}

fn dependent_row(item: &Value) -> Vec<Value> {
    vec![
        field(item, "nombre"),
        field(item, "primerApellido"),
        field(item, "segundoApellido"),
        value(item, "parentescoRelacion"),
        field(item, "ciudadanoExtranjero"),
        value(item, "actividadLaboralSectorPublico"),
    ]
}

fn income_row(record: &Value) -> Vec<Value> {
    let income = child(patrimonial(record), "ingresos");
    vec![
        value(income, "remuneracionMensualCargoPublico"),
        value(income, "otrosIngresosMensualesTotal"),
        value(income, "ingresoMensualNetoDeclarante"),
        value(income, "ingresoAnualNetoDeclarante"),
    ]
}

fn real_estate_row(item: &Value) -> Vec<Value> {
    let (amount, currency) = money(item, "valorAdquisicion");
    vec![
        value(item, "tipoInmueble"),
        holders(item),
        amount,
        currency,
        value(item, "formaAdquisicion"),
        field(item, "fechaAdquisicion"),
    ]
}

fn movable_goods_row(item: &Value) -> Vec<Value> {
    let (amount, currency) = money(item, "valorAdquisicion");
    vec![
        value(item, "tipoBien"),
        field(item, "descripcionGeneralBien"),
        holders(item),
        amount,
        currency,
        value(item, "formaAdquisicion"),
        field(item, "fechaAdquisicion"),
    ]
}

fn vehicle_row(item: &Value) -> Vec<Value> {
    let (amount, currency) = money(item, "valorAdquisicion");
    vec![
        value(item, "tipoVehiculo"),
        field(item, "marca"),
        field(item, "modelo"),
        field(item, "anio"),
        amount,
        currency,
        field(item, "fechaAdquisicion"),
        value(item, "formaAdquisicion"),
    ]
}

fn investment_row(item: &Value) -> Vec<Value> {
    let (balance, currency) = money(item, "saldoSituacionActual");
    // Newer schemas nest the institution under localizacionInversion.
    let location = child(item, "localizacionInversion");
    let institution = match field(location, "institucionRazonSocial") {
        Value::Null => field(item, "institucionRazonSocial"),
        nested => nested,
    };
    vec![
        value(item, "tipoInversion"),
        value(item, "subTipoInversion"),
        institution,
        field(item, "numeroCuentaContrato"),
        balance,
        currency,
        field(location, "pais"),
    ]
}

fn liability_row(item: &Value) -> Vec<Value> {
    let (outstanding, currency) = money(item, "saldoInsolutoSituacionActual");
    let lender = child(item, "otorganteCredito");
    vec![
        value(item, "tipoAdeudo"),
        value(item, "montoOriginal"),
        outstanding,
        currency,
        field(item, "fechaAdquisicion"),
        field(item, "institucionRazonSocial"),
        first_present(lender, &["nombreInstitucion", "nombreRazonSocial"]),
    ]
}

fn loan_row(item: &Value) -> Vec<Value> {
    let owner = child(item, "duenioTitular");
    vec![
        value(item, "tipoBien"),
        field(item, "marca"),
        field(item, "modelo"),
        field(item, "anio"),
        field(item, "numeroSerieRegistro"),
        value(item, "relacionConDuenio"),
        first_present(owner, &["nombreRazonSocial", "nombre"]),
    ]
}

fn support_row(item: &Value) -> Vec<Value> {
    let (amount, currency) = money(item, "montoApoyoMensual");
    vec![
        value(item, "beneficiarioPrograma"),
        field(item, "nombrePrograma"),
        field(item, "institucionOtorgante"),
        field(item, "nivelOrdenGobierno"),
        value(item, "tipoApoyo"),
        field(item, "formaRecepcion"),
        amount,
        currency,
    ]
}

fn participation_row(item: &Value) -> Vec<Value> {
    vec![
        field(item, "nombreEmpresaSociedadAsociacion"),
        value(item, "tipoParticipacion"),
        field(item, "porcentajeParticipacion"),
        value(item, "sector"),
        field(item, "recibeRemuneracion"),
    ]
}
