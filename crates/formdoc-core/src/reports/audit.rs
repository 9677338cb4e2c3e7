//! Audit report (`informe_auditoria`) context builder
//!
//! On top of the generic behaviour this builder derives the auxiliary
//! wording that depends on the kind of accounts, entity and opinion, counts
//! the qualifications for singular/plural wording and repeats the
//! qualification paragraph once per reported issue.

use serde_json::Value;

use super::{finish_context, plain_inputs};
use crate::blocks::BlockProcessor;
use crate::config::ReportConfig;
use crate::context::{display_value, keys, Context};
use crate::diagnostics::Diagnostics;
use crate::error::ReportError;
use crate::report::ContextBuilder;
use crate::template::{apply_plural_markers, has_plural_markers};

/// Block repeated once per qualification
const QUALIFICATION_BLOCK: &str = "parrafo_fundamento_calificacion";
const MAX_ISSUES: i64 = 10;

const TEXT_IAGC: &str = ", determinada información incluida en el Informe Anual de Gobierno Corporativo \
y el Informe Anual de Remuneraciones de los Consejeros, a los que se refiere \
la Ley de Auditoría de Cuentas,";

const TEXT_ADDITIONAL_SERVICES: &str = "Los servicios distintos a los de auditoría de cuentas, adicionales a los indicados \
en la memoria de las cuentas anuales (y/o en el informe de gestión), que han sido \
prestados a la Entidad auditada han sido los siguientes:\n\n* ";

const TEXT_NO_ADDITIONAL_SERVICES: &str =
    "No se han prestado servicios adicionales distintos a la auditoría.";

const TEXT_KAM_UNCERTAINTY: &str = "Además de la cuestión descrita en la sección Incertidumbre material relacionada \
con la empresa en funcionamiento, hemos determinado que las cuestiones que se \
describen a continuación son las cuestiones clave consideradas en la auditoría \
que se deben comunicar en nuestro informe.";

const TEXT_AMRA_UNCERTAINTY: &str = "Además de la cuestión descrita en la sección Incertidumbre material relacionada \
con la empresa en funcionamiento, hemos determinado que los riesgos que se \
describen a continuación son los riesgos más significativos considerados en \
la auditoría que se deben comunicar en nuestro informe.";

const TEXT_KAM: &str = "Hemos determinado que las cuestiones que se describen a continuación son las \
cuestiones clave consideradas en la auditoría que se deben comunicar en nuestro informe.";

const TEXT_AMRA: &str = "Hemos determinado que los riesgos que se describen a continuación son los \
riesgos más significativos considerados en la auditoría que se deben comunicar \
en nuestro informe.";

const TEXT_MANAGEMENT_FAVORABLE: &str = " y que el resto de la información que contiene el informe de gestión concuerda \
con la de las cuentas anuales del ejercicio y su contenido y presentación son \
conformes a la normativa que resulta de aplicación";

const TEXT_MANAGEMENT_QUALIFIED: &str = " y que, salvo por las incorrección(es) material(es) indicadas, el resto de la \
información que contiene el informe de gestión concuerda con la de las cuentas \
anuales del ejercicio y su contenido y presentación son conformes a la normativa \
que resulta de aplicación";

const TEXT_SCOPE_LIMITATION: &str = "Como se describe en la sección Fundamento de la opinión con salvedades, no hemos \
podido obtener evidencia de auditoría suficiente y adecuada sobre la(s) cuestión(es) \
indicada(s) en dicha sección, lo que supone una/varias limitación(es) al alcance de \
nuestro trabajo. En consecuencia, no hemos podido alcanzar una conclusión sobre si \
la información que contiene el informe de gestión concuerda con la de las cuentas \
anuales ni sobre si su contenido y presentación son conformes a la normativa aplicable.";

/// Builder of the statutory audit report
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditReportBuilder;

impl ContextBuilder for AuditReportBuilder {
    fn id(&self) -> &str {
        "informe_auditoria"
    }

    fn build_context(
        &self,
        inputs: &Context,
        config: &ReportConfig,
        diagnostics: &Diagnostics,
    ) -> Result<Context, ReportError> {
        let mut values = plain_inputs(inputs);
        values.extend(auxiliary_variables(inputs));

        if !values.contains_key("ano_cierre_anterior") {
            if let Some(previous) = values.get("ano_cierre_ejercicio").and_then(previous_year) {
                values.insert("ano_cierre_anterior".into(), previous);
            }
        }

        let opinion = text(inputs, "tipo_opinion", "favorable");
        let n_issues = issue_count(inputs);
        values.insert(keys::ISSUE_COUNT.into(), Value::from(n_issues));

        let processor = BlockProcessor::new(config.blocks.clone(), diagnostics.clone());
        for (id, rendered) in processor.process_all(&values) {
            values.insert(id, Value::String(rendered));
        }

        let qualified = opinion == "salvedades" || opinion == "desfavorable";
        if qualified && n_issues > 1 {
            if let Some(paragraphs) =
                repeat_qualification(&processor, &values, inputs, &opinion, n_issues)
            {
                values.insert(QUALIFICATION_BLOCK.into(), Value::String(paragraphs));
            }
        }

        for value in values.values_mut() {
            if let Value::String(s) = value {
                if has_plural_markers(s) {
                    *s = apply_plural_markers(s, n_issues);
                }
            }
        }

        diagnostics.info(format!(
            "audit context built with {} variables (n_issues={})",
            values.len(),
            n_issues
        ));
        Ok(finish_context(values, inputs, config, diagnostics))
    }
}

/// Render the qualification paragraph once per issue
///
/// Issue `i` reads its answers from `salvedad_{i}__<field>` (or
/// `desfavorable_{i}__<field>`), which shadow `<field>` while rendering.
fn repeat_qualification(
    processor: &BlockProcessor,
    values: &Context,
    inputs: &Context,
    opinion: &str,
    n_issues: i64,
) -> Option<String> {
    let template = processor.winning_template(QUALIFICATION_BLOCK, values)?;
    let kind = if opinion == "salvedades" {
        "salvedad"
    } else {
        "desfavorable"
    };

    let paragraphs: Vec<String> = (1..=n_issues)
        .filter_map(|i| {
            let prefix = format!("{}_{}__", kind, i);
            let mut instance = values.clone();
            for (key, value) in inputs {
                if let Some(field) = key.strip_prefix(&prefix) {
                    instance.insert(field.to_string(), value.clone());
                }
            }
            let rendered = processor.render(template, &instance);
            (!rendered.is_empty()).then_some(rendered)
        })
        .collect();

    (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n"))
}

/// Number of qualifications, clamped to `1..=10`
///
/// Read from `num_salvedades` or `num_desfavorables` depending on the
/// opinion; any other opinion, or a count that is not a whole number, is 1.
pub fn issue_count(inputs: &Context) -> i64 {
    let key = match text(inputs, "tipo_opinion", "favorable").as_str() {
        "salvedades" => "num_salvedades",
        "desfavorable" => "num_desfavorables",
        _ => return 1,
    };
    let count = match inputs.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) if !s.is_empty() => s.trim().parse::<i64>().ok(),
        _ => Some(1),
    };
    count.map_or(1, |n| n.clamp(1, MAX_ISSUES))
}

fn previous_year(year: &Value) -> Option<Value> {
    match year {
        Value::Number(n) => n.as_i64().map(|y| Value::from(y - 1)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|y| Value::from(y - 1)),
        _ => None,
    }
}

/// Text of an input, `default` when absent
fn text(inputs: &Context, key: &str, default: &str) -> String {
    inputs
        .get(key)
        .map(display_value)
        .unwrap_or_else(|| default.to_string())
}

fn put(aux: &mut Context, key: &str, value: impl Into<String>) {
    aux.insert(key.to_string(), Value::String(value.into()));
}

/// Wording derived from the kind of accounts, entity and opinion
pub fn auxiliary_variables(inputs: &Context) -> Context {
    let accounts = text(inputs, "tipo_cuentas", "normales");
    let entity = text(inputs, "tipo_entidad", "No EIP");
    let opinion = text(inputs, "tipo_opinion", "favorable");
    let listed = text(inputs, "entidad_cotizada", "no");
    let continuity = text(inputs, "auditor_continuidad", "no");
    let services = text(inputs, "descripcion_servicios_adicionales", "");
    let einf_provided = text(inputs, "einf_facilitado", "si");
    let scope_limited = text(inputs, "limitacion_alcance", "no");
    let reason = text(inputs, "motivo_calificacion", "");
    let uncertainty = text(inputs, "incertidumbre_funcionamiento", "no");

    let consolidated = accounts == "consolidadas";
    let abridged = accounts == "abreviadas";
    let mut aux = Context::new();

    put(
        &mut aux,
        "nombre_tipo_cuentas",
        if consolidated {
            "cuentas anuales consolidadas"
        } else if abridged {
            "cuentas anuales abreviadas"
        } else {
            "cuentas anuales"
        },
    );
    put(
        &mut aux,
        "nombre_fundamento",
        match opinion.as_str() {
            "desfavorable" => "opinión desfavorable",
            "denegada" => "denegación de opinión",
            "salvedades" => "opinión con salvedades",
            _ => "opinión",
        },
    );

    let accounts_suffix = if consolidated {
        " consolidadas"
    } else if abridged {
        " abreviadas"
    } else {
        ""
    };
    put(&mut aux, "sufijo_consolidada", if consolidated { " consolidada" } else { "" });
    put(&mut aux, "sufijo_abreviadas", if abridged { " abreviadas" } else { "" });
    put(&mut aux, "sufijo_tipo_cuentas", accounts_suffix);
    put(&mut aux, "sufijo_tipo_cuentas_simple", accounts_suffix);
    put(
        &mut aux,
        "sufijo_consolidado_eip",
        if consolidated && entity == "EIP" { " consolidado" } else { "" },
    );
    put(&mut aux, "sufijo_consolidado_simple", if consolidated { "consolidado" } else { "" });
    put(
        &mut aux,
        "sufijo_sociedad_dominante",
        if consolidated { "de la Sociedad dominante" } else { "de la Entidad" },
    );
    put(&mut aux, "sufijo_parte_consolidado", if consolidated { "de esta parte" } else { "" });
    put(
        &mut aux,
        "sufijo_einf_consolidado",
        if consolidated { "(EINF) consolidado" } else { "" },
    );
    put(
        &mut aux,
        "texto_conocimiento_entidad",
        if consolidated { "del Grupo" } else { "de la Entidad" },
    );

    put(&mut aux, "texto_cotizada_iagc", if listed == "si" { TEXT_IAGC } else { "" });
    put(
        &mut aux,
        "texto_einf_facilitado",
        if einf_provided == "si" { "se facilita" } else { "no se facilita" },
    );
    put(
        &mut aux,
        "texto_auditor_continuidad",
        if continuity == "si" { "fuimos designados" } else { "no fuimos designados" },
    );
    if services.is_empty() {
        put(&mut aux, "texto_servicios_adicionales", TEXT_NO_ADDITIONAL_SERVICES);
    } else {
        put(
            &mut aux,
            "texto_servicios_adicionales",
            format!("{}{}", TEXT_ADDITIONAL_SERVICES, services),
        );
    }

    let opinion_kind = if opinion == "desfavorable" {
        "desfavorable"
    } else {
        "con salvedades"
    };
    put(&mut aux, "nombre_tipo_opinion_fundamento", opinion_kind);

    let (kam, amra) = if uncertainty == "si" {
        (TEXT_KAM_UNCERTAINTY, TEXT_AMRA_UNCERTAINTY)
    } else {
        (TEXT_KAM, TEXT_AMRA)
    };
    put(&mut aux, "texto_intro_kam", kam);
    put(&mut aux, "texto_intro_amra", amra);

    let (management, basis) = match opinion.as_str() {
        "favorable" => (TEXT_MANAGEMENT_FAVORABLE.to_string(), String::new()),
        "salvedades" if scope_limited != "si" => {
            let issues = if reason == "incorreccion" {
                "una/varias incorrección(es) material(es)"
            } else {
                "una/varias limitación(es) al alcance"
            };
            let basis = format!(
                "Como se describe en la sección Fundamento de la opinión {}, existen {} \
                 en las cuentas anuales adjuntas. Hemos concluido que dichas circunstancias \
                 afectan de igual manera y en la misma medida al informe de gestión.",
                opinion_kind, issues
            );
            (TEXT_MANAGEMENT_QUALIFIED.to_string(), basis)
        }
        "salvedades" => (String::new(), TEXT_SCOPE_LIMITATION.to_string()),
        _ => (String::new(), String::new()),
    };
    put(&mut aux, "texto_opinion_gestion_einf", management);
    put(&mut aux, "texto_fundamento_einf", basis);

    aux
}
