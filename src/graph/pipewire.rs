//! PipeWire backend driven through the command-line tools
//!
//! - `pw-dump` for enumeration
//! - `pw-cli enum-params` / `pw-cli set-param` for node `Props`
//! - `pw-link` / `pw-cli destroy` for links
//! - `wpctl` for volumes

use lazy_static::lazy_static;
use regex::Regex;
use std::process::Command;
use tracing::{debug, warn};

use super::backend::LiveGraph;
use super::object::{ObjectType, Properties, RawObject};
use crate::error::{ControlError, Result};
use crate::params::value::{ParamMap, ParamValue};

lazy_static! {
    static ref VOLUME_RE: Regex = Regex::new(r"Volume:\s*([\d.]+)").unwrap();
}

#[derive(Debug, Default)]
pub struct PwCliGraph;

impl PwCliGraph {
    pub fn new() -> Self {
        Self
    }
}

/// Run a tool and return its stdout
fn run(program: &str, args: &[&str]) -> Result<String> {
    debug!("Running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ControlError::backend(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ControlError::backend(format!(
            "{} {} failed: {}",
            program,
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl LiveGraph for PwCliGraph {
    fn enumerate(&mut self) -> Result<Vec<RawObject>> {
        let dump = run("pw-dump", &[])?;
        parse_pw_dump(&dump)
    }

    fn node_params(&mut self, node_id: u32) -> Result<ParamMap> {
        let out = run("pw-cli", &["enum-params", &node_id.to_string(), "Props"])?;
        Ok(parse_enum_params(&out))
    }

    fn set_node_params(&mut self, node_id: u32, params: &ParamMap) -> Result<()> {
        let json = props_pod_json(params);
        run("pw-cli", &["set-param", &node_id.to_string(), "Props", &json])?;
        Ok(())
    }

    fn create_link(&mut self, output_port: u32, input_port: u32) -> Result<u32> {
        let (out, inp) = (output_port.to_string(), input_port.to_string());
        run("pw-link", &[&out, &inp])?;

        // pw-link does not report the new id; look it up
        self.enumerate()?
            .into_iter()
            .find(|o| {
                o.object_type == ObjectType::Link
                    && o.properties.get("link.output.port") == Some(&out)
                    && o.properties.get("link.input.port") == Some(&inp)
            })
            .map(|o| o.id)
            .ok_or_else(|| {
                ControlError::backend(format!(
                    "link {} -> {} was not created",
                    output_port, input_port
                ))
            })
    }

    fn destroy_link(&mut self, link_id: u32) -> Result<()> {
        run("pw-cli", &["destroy", &link_id.to_string()])?;
        Ok(())
    }

    fn volume(&mut self, id: u32) -> Result<Option<f32>> {
        let output = Command::new("wpctl")
            .args(["get-volume", &id.to_string()])
            .output()
            .map_err(|e| ControlError::backend(format!("failed to run wpctl: {}", e)))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // wpctl reports unknown ids on stdout with a zero exit code
        if stdout.contains("not found") || stderr.contains("not found") {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(ControlError::backend(format!(
                "wpctl get-volume {} failed: {}",
                id,
                stderr.trim()
            )));
        }
        Ok(parse_volume(&stdout))
    }

    fn set_volume(&mut self, id: u32, volume: f32) -> Result<()> {
        let out = run(
            "wpctl",
            &["set-volume", &id.to_string(), &format!("{:.4}", volume)],
        )?;
        if out.contains("not found") {
            return Err(ControlError::backend(format!("object {} not found", id)));
        }
        Ok(())
    }
}

// =============================================================================
// Parsers
// =============================================================================

/// Parse `pw-dump` JSON into raw objects, skipping interfaces not mirrored
pub fn parse_pw_dump(dump: &str) -> Result<Vec<RawObject>> {
    let value: serde_json::Value = serde_json::from_str(dump)?;
    let Some(entries) = value.as_array() else {
        return Err(ControlError::backend("pw-dump output is not an array"));
    };

    let mut objects = Vec::with_capacity(entries.len());
    for entry in entries {
        let (Some(id), Some(interface)) = (
            entry.get("id").and_then(|v| v.as_u64()),
            entry.get("type").and_then(|v| v.as_str()),
        ) else {
            warn!("Skipping malformed pw-dump entry");
            continue;
        };
        let Some(object_type) = ObjectType::from_interface(interface) else {
            continue;
        };
        let Ok(id) = u32::try_from(id) else {
            continue;
        };

        let info = entry.get("info");
        let mut properties = Properties::new();
        if let Some(props) = info.and_then(|i| i.get("props")).and_then(|p| p.as_object()) {
            for (k, v) in props {
                if let Some(s) = scalar_string(v) {
                    properties.insert(k.clone(), s);
                }
            }
        }

        // Older servers only put these in the info block
        let info_fields: &[(&str, &str)] = match object_type {
            ObjectType::Link => &[
                ("output-node-id", "link.output.node"),
                ("output-port-id", "link.output.port"),
                ("input-node-id", "link.input.node"),
                ("input-port-id", "link.input.port"),
            ],
            ObjectType::Port => &[("direction", "port.direction")],
            _ => &[],
        };
        for (field, key) in info_fields {
            if properties.contains_key(*key) {
                continue;
            }
            if let Some(s) = info.and_then(|i| i.get(*field)).and_then(scalar_string) {
                properties.insert((*key).to_string(), s);
            }
        }

        objects.push(RawObject {
            id,
            object_type,
            properties,
        });
    }
    Ok(objects)
}

fn scalar_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse the `params` struct of `pw-cli enum-params <id> Props`
///
/// The struct is printed as alternating lines, a `String "key"` followed by
/// its typed value (`Bool true`, `Int 3`, `Float 1000.000000`, `String "x"`).
pub fn parse_enum_params(output: &str) -> ParamMap {
    let lines: Vec<&str> = output.lines().map(str::trim).collect();
    let mut params = ParamMap::new();
    let mut i = 0;
    while i + 1 < lines.len() {
        let key = lines[i]
            .strip_prefix("String ")
            .and_then(quoted)
            .filter(|k| !k.is_empty());
        match (key, parse_typed_value(lines[i + 1])) {
            (Some(key), Some(value)) => {
                params.insert(key.to_string(), value);
                i += 2;
            }
            _ => i += 1,
        }
    }
    params
}

fn quoted(s: &str) -> Option<&str> {
    let start = s.find('"')?;
    let end = s.rfind('"')?;
    (start < end).then(|| &s[start + 1..end])
}

fn parse_typed_value(line: &str) -> Option<ParamValue> {
    let (tag, rest) = line.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    match tag {
        "Bool" => Some(ParamValue::Bool(rest == "true")),
        "Int" => rest.parse().ok().map(ParamValue::Int),
        "Float" | "Double" => rest.parse().ok().map(ParamValue::Float),
        "String" => quoted(rest).map(|s| ParamValue::String(s.to_string())),
        _ => None,
    }
}

/// `{"params": [key, value, ...]}` payload for `pw-cli set-param`
pub fn props_pod_json(params: &ParamMap) -> String {
    let mut array = Vec::with_capacity(params.len() * 2);
    for (key, value) in params {
        array.push(serde_json::Value::String(key.clone()));
        array.push(value.to_json());
    }
    serde_json::json!({ "params": array }).to_string()
}

fn parse_volume(output: &str) -> Option<f32> {
    VOLUME_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
