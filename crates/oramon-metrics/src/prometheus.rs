//! Prometheus text exposition format.
//!
//! Renders collected samples into the text exposition format (version
//! 0.0.4) for scraping by a Prometheus server or compatible agent.

use std::collections::HashMap;
use std::fmt::Write;

use crate::sample::Sample;

/// Content type of the rendered body.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render samples grouped by family.
///
/// Families appear in the order their first sample was seen; each gets one
/// `# HELP` and one `# TYPE` line.
pub fn render_prometheus(samples: &[Sample]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut families: HashMap<&str, Vec<&Sample>> = HashMap::new();
    for s in samples {
        let name = s.desc.fq_name.as_str();
        families
            .entry(name)
            .or_insert_with(|| {
                order.push(name);
                Vec::new()
            })
            .push(s);
    }

    let mut out = String::new();
    for name in order {
        let members = &families[name];
        let desc = &members[0].desc;
        let _ = writeln!(out, "# HELP {} {}", name, escape_help(&desc.help));
        let _ = writeln!(out, "# TYPE {} {}", name, desc.kind);
        for s in members {
            out.push_str(name);
            if !s.label_values.is_empty() {
                out.push('{');
                for (i, (label, value)) in desc.label_names.iter().zip(&s.label_values).enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}=\"{}\"", label, escape_label_value(value));
                }
                out.push('}');
            }
            let _ = writeln!(out, " {}", format_value(s.value));
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::desc::{Desc, MetricKind};

    fn sample(desc: &Arc<Desc>, value: f64, labels: &[&str]) -> Sample {
        Sample::new(desc, value, labels.iter().map(|l| l.to_string()).collect()).unwrap()
    }

    #[test]
    fn render_empty() {
        assert_eq!(render_prometheus(&[]), "");
    }

    #[test]
    fn render_groups_families_in_first_seen_order() {
        let up = Arc::new(Desc::new("oracle_up", "Whether the database is reachable.", &[], MetricKind::Gauge));
        let waits = Arc::new(Desc::new(
            "oracle_wait_total_event",
            "Waits per event.",
            &["wait_class", "event"],
            MetricKind::Counter,
        ));
        let samples = vec![
            sample(&waits, 12.0, &["Commit", "log file sync"]),
            sample(&up, 1.0, &[]),
            sample(&waits, 3.5, &["User I/O", "db file sequential read"]),
        ];
        let output = render_prometheus(&samples);

        let expected = "\
# HELP oracle_wait_total_event Waits per event.
# TYPE oracle_wait_total_event counter
oracle_wait_total_event{wait_class=\"Commit\",event=\"log file sync\"} 12
oracle_wait_total_event{wait_class=\"User I/O\",event=\"db file sequential read\"} 3.5
# HELP oracle_up Whether the database is reachable.
# TYPE oracle_up gauge
oracle_up 1
";
        assert_eq!(output, expected);
    }

    #[test]
    fn render_escapes_label_values() {
        let desc = Arc::new(Desc::new("oracle_session_active", "h", &["sql_text"], MetricKind::Gauge));
        let output = render_prometheus(&[sample(&desc, 1.0, &["select \"x\"\nfrom t\\u"])]);
        assert!(output.contains(r#"sql_text="select \"x\"\nfrom t\\u""#));
    }

    #[test]
    fn render_special_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(-1.0), "-1");
        assert_eq!(format_value(0.25), "0.25");
    }
}
