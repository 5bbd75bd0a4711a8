//! Self-contained HTML report with embedded plotly charts.
//!
//! Presentation only: nothing here feeds back into the models.

use palatal_core::summary::format_contrasts;
use palatal_table::derive::GroupCount;

use crate::commands::run::AnalysisBundle;

/// Data series for the three diagnostic charts.
pub struct ChartData {
    /// Observed (ffc, recoded outcome) points from the oral subset.
    pub ffc_points: Vec<(f64, f64)>,
    /// Fitted P(preservation) curve over FFC; empty when the subset model
    /// did not retain FFC.
    pub ffc_curve: Vec<(f64, f64)>,
    /// log_freq values per outcome level, for the boxplot.
    pub logfreq_by_outcome: Vec<(String, Vec<f64>)>,
}

pub fn build_report(input_path: &str, bundle: &AnalysisBundle, charts: &ChartData) -> String {
    let counts_section = format!(
        "<h2>Grouped counts</h2>\n{}\n{}",
        counts_table("Cluster x outcome", &bundle.cluster_outcome),
        counts_table("Transmission x outcome", &bundle.transmission_outcome),
    );

    let predicted_section = if bundle.predicted.is_empty() {
        String::new()
    } else {
        let rows: String = bundle
            .predicted
            .iter()
            .map(|(ffc, p)| format!("<tr><td>{ffc:.1}</td><td>{:.1}%</td></tr>", p * 100.0))
            .collect();
        format!(
            "<h2>Predicted P(preservation) by FFC (oral subset)</h2>\n\
             <table><tr><th>FFC</th><th>p</th></tr>{rows}</table>"
        )
    };

    let contrasts_section = if bundle.contrasts.is_empty() {
        String::new()
    } else {
        format!(
            "<h2>Tukey-adjusted pairwise contrasts</h2>\n<pre>{}</pre>",
            format_contrasts(&bundle.contrasts)
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Cluster Palatalization Report</title>
<script src="https://cdn.plot.ly/plotly-2.35.0.min.js"></script>
<style>
body{{font-family:system-ui,-apple-system,sans-serif;max-width:1200px;margin:0 auto;padding:20px;background:#fafafa}}
h1{{color:#1a1a2e}}h2{{color:#16213e;border-bottom:1px solid #ddd;padding-bottom:5px}}
table{{margin:10px 0;border-collapse:collapse}}td,th{{padding:4px 12px;border:1px solid #ddd}}
pre{{background:#fff;padding:10px;border-radius:6px;overflow-x:auto}}
.plot{{background:#fff;border-radius:8px;padding:10px;margin:20px 0;box-shadow:0 1px 3px rgba(0,0,0,0.1)}}
</style></head><body>
<h1>Consonant-cluster palatalization analysis</h1>

<h2>Data</h2>
<table>
<tr><td>File</td><td>{input_path}</td></tr>
<tr><td>Token rows</td><td>{n_tokens}</td></tr>
<tr><td>Word types</td><td>{n_types}</td></tr>
<tr><td>Analyzed (multi-instance)</td><td>{n_analysis}</td></tr>
<tr><td>Oral-transmission subset</td><td>{n_oral}</td></tr>
</table>

{counts_section}

<h2>Full-table model (stepwise-reduced)</h2>
<pre>{full_model}</pre>

<h2>Oral-subset model (stepwise-reduced)</h2>
<pre>{subset_model}</pre>

{contrasts_section}

{predicted_section}

<h2>Outcome by cluster</h2>
<div class="plot"><div id="bar" style="height:400px"></div></div>

<h2>FFC and preservation (oral subset)</h2>
<div class="plot"><div id="scatter" style="height:400px"></div></div>

<h2>Log frequency by outcome</h2>
<div class="plot"><div id="box" style="height:400px"></div></div>

<script>
{bar_js}
{scatter_js}
{box_js}
</script>
</body></html>"#,
        input_path = input_path,
        n_tokens = bundle.n_tokens,
        n_types = bundle.n_types,
        n_analysis = bundle.n_analysis,
        n_oral = bundle.n_oral,
        counts_section = counts_section,
        full_model = bundle.full_model,
        subset_model = bundle.subset_model,
        contrasts_section = contrasts_section,
        predicted_section = predicted_section,
        bar_js = bar_chart_js(&bundle.cluster_outcome),
        scatter_js = scatter_chart_js(charts),
        box_js = box_chart_js(charts),
    )
}

fn counts_table(title: &str, counts: &[GroupCount]) -> String {
    let rows: String = counts
        .iter()
        .map(|g| {
            let cells: String = g
                .levels
                .iter()
                .map(|l| format!("<td>{l}</td>"))
                .collect();
            format!("<tr>{cells}<td>{}</td></tr>", g.count)
        })
        .collect();
    format!("<h3>{title}</h3>\n<table>{rows}</table>")
}

/// Grouped bar chart: one trace per outcome level, clusters on the x axis.
fn bar_chart_js(counts: &[GroupCount]) -> String {
    let mut outcomes: Vec<&str> = Vec::new();
    for g in counts {
        if !outcomes.contains(&g.levels[1].as_str()) {
            outcomes.push(&g.levels[1]);
        }
    }

    let traces: Vec<String> = outcomes
        .iter()
        .map(|outcome| {
            let xs: Vec<&str> = counts
                .iter()
                .filter(|g| g.levels[1] == *outcome)
                .map(|g| g.levels[0].as_str())
                .collect();
            let ys: Vec<usize> = counts
                .iter()
                .filter(|g| g.levels[1] == *outcome)
                .map(|g| g.count)
                .collect();
            format!("{{type:'bar',name:{outcome:?},x:{xs:?},y:{ys:?}}}")
        })
        .collect();

    format!(
        "Plotly.newPlot('bar',[{}],{{barmode:'group',xaxis:{{title:'cluster'}},yaxis:{{title:'word types'}}}});",
        traces.join(",")
    )
}

/// Observed points plus the fitted inverse-logit curve.
fn scatter_chart_js(charts: &ChartData) -> String {
    let (px, py): (Vec<f64>, Vec<f64>) = charts.ffc_points.iter().copied().unzip();
    let points = format!(
        "{{type:'scatter',mode:'markers',name:'observed',x:{px:?},y:{py:?},marker:{{opacity:0.5}}}}"
    );

    let mut traces = vec![points];
    if !charts.ffc_curve.is_empty() {
        let (cx, cy): (Vec<f64>, Vec<f64>) = charts.ffc_curve.iter().copied().unzip();
        traces.push(format!(
            "{{type:'scatter',mode:'lines',name:'fitted',x:{cx:?},y:{cy:?},line:{{color:'steelblue',width:2}}}}"
        ));
    }

    format!(
        "Plotly.newPlot('scatter',[{}],{{xaxis:{{title:'FFC'}},yaxis:{{title:'P(preservation)',range:[-0.05,1.05]}}}});",
        traces.join(",")
    )
}

/// One box trace per outcome level.
fn box_chart_js(charts: &ChartData) -> String {
    let traces: Vec<String> = charts
        .logfreq_by_outcome
        .iter()
        .map(|(outcome, values)| format!("{{type:'box',name:{outcome:?},y:{values:?}}}"))
        .collect();
    format!(
        "Plotly.newPlot('box',[{}],{{yaxis:{{title:'log frequency'}}}});",
        traces.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use palatal_core::summary::FitSummary;

    fn group(levels: &[&str], count: usize) -> GroupCount {
        GroupCount {
            levels: levels.iter().map(|s| s.to_string()).collect(),
            count,
        }
    }

    fn empty_summary() -> FitSummary {
        FitSummary {
            formula: "outcome ~ 1".into(),
            coefficients: Vec::new(),
            deviance: 0.0,
            aic: 2.0,
            n_obs: 0,
            iterations: 1,
            converged: true,
            separation: false,
            dropped_terms: Vec::new(),
        }
    }

    #[test]
    fn test_report_contains_sections_and_charts() {
        let bundle = AnalysisBundle {
            n_tokens: 10,
            n_types: 5,
            n_analysis: 4,
            n_oral: 3,
            full_model: empty_summary(),
            subset_model: empty_summary(),
            contrasts: Vec::new(),
            predicted: vec![(0.1, 0.396), (1.0, 0.0146)],
            cluster_outcome: vec![
                group(&["pl", "preservation"], 2),
                group(&["pl", "palatalization"], 2),
            ],
            transmission_outcome: vec![group(&["oral", "preservation"], 4)],
        };
        let charts = ChartData {
            ffc_points: vec![(0.1, 0.0), (0.9, 1.0)],
            ffc_curve: vec![(0.0, 0.5), (1.0, 0.1)],
            logfreq_by_outcome: vec![("preservation".into(), vec![1.0, 2.0])],
        };

        let html = build_report("tokens.csv", &bundle, &charts);
        assert!(html.contains("Plotly.newPlot('bar'"));
        assert!(html.contains("Plotly.newPlot('scatter'"));
        assert!(html.contains("Plotly.newPlot('box'"));
        assert!(html.contains("Predicted P(preservation)"));
        assert!(html.contains("tokens.csv"));
    }
}
