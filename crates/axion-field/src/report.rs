//! Run report rendering (JSON and plain text)

use anyhow::Result;
use minijinja::{context, Environment};

use crate::propagation::PropagationStatus;
use crate::setup::RunReport;
use crate::ProbabilityFormula;

const TEXT_TEMPLATE: &str = r##"Axion field propagation report
Generated: {{ generated_at }}
Medium: {{ medium }}
Formula: {{ formula }}
Boundary resolution: {{ "%.4f"|format(min_step) }} mm

{% for ev in events -%}
{% if ev.error -%}
event {{ ev.id }}: FAILED ({{ ev.error }})
{% elif ev.crossed -%}
event {{ ev.id }}: {{ ev.segments }} segment(s)  L = {{ "%.3f"|format(ev.length) }} mm  <B> = {{ "%.4f"|format(ev.field) }} T  P = {{ ev.probability }}  T = {{ "%.6f"|format(ev.transmission) }}
{% else -%}
event {{ ev.id }}: no field crossed
{% endif -%}
{% endfor %}
Events: {{ totals.events }} (crossed {{ totals.crossed }}, missed {{ totals.not_crossed }}, failed {{ totals.failed }})
Probability sum: {{ probability_sum }}
Detected sum: {{ detected_sum }}
"##;

pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Human-readable summary of a run.
pub fn render_text(report: &RunReport) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report", TEXT_TEMPLATE)?;
    let template = env.get_template("report")?;

    let events: Vec<_> = report
        .events
        .iter()
        .map(|e| match &e.outcome {
            Some(outcome) => {
                let segments = match outcome.status {
                    PropagationStatus::Crossed { segments } => segments,
                    PropagationStatus::NoFieldCrossed => 0,
                };
                serde_json::json!({
                    "id": e.event_id,
                    "crossed": segments > 0,
                    "segments": segments,
                    "length": outcome.observables.coherence_length,
                    "field": outcome.observables.field_average,
                    "probability": format!("{:.6e}", outcome.observables.probability),
                    "transmission": outcome.observables.transmission,
                })
            }
            None => serde_json::json!({
                "id": e.event_id,
                "error": e.error.clone().unwrap_or_default(),
            }),
        })
        .collect();

    let formula = match report.config.formula {
        ProbabilityFormula::Profile => "field profile",
        ProbabilityFormula::Averaged => "averaged field",
    };

    let output = template.render(context! {
        generated_at => &report.generated_at,
        medium => &report.medium,
        formula => formula,
        min_step => report.config.min_step,
        events => events,
        totals => &report.totals,
        probability_sum => format!("{:.6e}", report.totals.probability_sum),
        detected_sum => format!("{:.6e}", report.totals.detected_sum),
    })?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::{Observables, PropagationOutcome};
    use crate::setup::{EventReport, RunTotals};
    use crate::PropagationConfig;

    fn report() -> RunReport {
        RunReport {
            generated_at: "2026-01-01T00:00:00+00:00".to_string(),
            medium: "vacuum".to_string(),
            config: PropagationConfig::default(),
            events: vec![
                EventReport {
                    event_id: 1,
                    outcome: Some(PropagationOutcome {
                        event_id: 1,
                        status: PropagationStatus::Crossed { segments: 1 },
                        observables: Observables {
                            field_average: 2.0,
                            probability: 1.5e-19,
                            coherence_length: 4000.0,
                            transmission: 1.0,
                        },
                        segments: vec![],
                        diagnostics: vec![],
                    }),
                    error: None,
                },
                EventReport {
                    event_id: 2,
                    outcome: None,
                    error: Some("bad energy".to_string()),
                },
            ],
            totals: RunTotals {
                events: 2,
                crossed: 1,
                not_crossed: 0,
                failed: 1,
                probability_sum: 1.5e-19,
                detected_sum: 1.5e-19,
            },
        }
    }

    #[test]
    fn test_text_report() {
        let text = render_text(&report()).unwrap();
        assert!(text.contains("Medium: vacuum"));
        assert!(text.contains("event 1: 1 segment(s)"));
        assert!(text.contains("event 2: FAILED (bad energy)"));
        assert!(text.contains("Events: 2 (crossed 1, missed 0, failed 1)"));
    }

    #[test]
    fn test_text_report_formats_probabilities() {
        let text = render_text(&report()).unwrap();
        assert!(text.contains("P = 1.500000e-19"), "{}", text);
        assert!(text.contains("Probability sum: 1.500000e-19"));
    }

    #[test]
    fn test_json_report_layout() {
        let json = render_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["medium"], "vacuum");
        assert_eq!(value["events"][0]["outcome"]["status"], "crossed");
        assert_eq!(value["events"][0]["outcome"]["segments"], serde_json::json!([]));
        assert_eq!(value["events"][1]["error"], "bad energy");
        assert!(value["events"][1].get("outcome").is_none());
        assert_eq!(value["config"]["coarse_step"], 5.0);
        assert_eq!(value["totals"]["failed"], 1);
    }
}
