use serde_json::json;

use strata_core::content::{ParamValue, Parameter, Sample, TableColumn, TableData};
use strata_providers::DataNode;

/// The document shown when the app starts with no file arguments.
pub fn demo_document() -> DataNode {
    let mut root = DataNode::named("demo-experiment");
    root.parameters.push(Parameter::text("operator", "m. curie"));
    root.parameters.push(Parameter {
        key: "runs".to_string(),
        value: ParamValue::BigInt(3),
    });
    root.metadata
        .insert("instrument".to_string(), json!("beamline-02"));
    root.metadata
        .insert("started".to_string(), json!("2026-08-23T09:14:00Z"));

    root.with_children(vec![calibration(), scan("scan-1", 0.25), scan("scan-2", 0.40)])
}

fn calibration() -> DataNode {
    let mut node = DataNode::named("calibration");
    node.parameters.push(Parameter {
        key: "reference".to_string(),
        value: ParamValue::Flag(true),
    });
    node.table = TableData {
        columns: vec![
            TableColumn {
                key: "channel".to_string(),
                label: "Channel".to_string(),
            },
            TableColumn {
                key: "offset".to_string(),
                label: "Offset".to_string(),
            },
        ],
        rows: vec![
            row(&[("channel", json!("a")), ("offset", json!(0.013))]),
            row(&[("channel", json!("b")), ("offset", json!(-0.002))]),
        ],
    };
    node
}

fn scan(name: &str, exposure: f64) -> DataNode {
    let mut node = DataNode::named(name);
    node.parameters.push(Parameter {
        key: "exposure".to_string(),
        value: ParamValue::Number(exposure),
    });
    node.children = vec![detector(), motor()];
    node
}

fn detector() -> DataNode {
    let mut node = DataNode::named("detector");
    node.samples = (0..24)
        .map(|i| {
            let x = i as f64 * 0.5;
            Sample {
                x,
                y: (x * 0.8).sin() * 10.0 + 12.0,
            }
        })
        .collect();
    node
}

fn motor() -> DataNode {
    let mut node = DataNode::named("motor");
    node.parameters.push(Parameter::text("axis", "theta"));
    node.parameters.push(Parameter {
        key: "position".to_string(),
        value: ParamValue::Number(42.5),
    });
    node
}

fn row(cells: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
