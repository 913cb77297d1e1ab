//! Build-stage discovery in plugin Dockerfiles

use plugsmith_core::error::{IoResultExt, Result};
use std::path::Path;

/// Names of every `FROM <image> AS <stage>` stage, in file order
pub fn build_stages(dockerfile: &str) -> Vec<String> {
    let mut stages = Vec::new();
    for line in dockerfile.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || !fields[0].eq_ignore_ascii_case("from") {
            continue;
        }
        if let Some(idx) = fields[1..fields.len() - 1]
            .iter()
            .position(|f| f.eq_ignore_ascii_case("as"))
        {
            stages.push(fields[idx + 2].to_string());
        }
    }
    stages
}

/// Read `path` and return its build stages
pub fn read_build_stages(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).with_path(path)?;
    Ok(build_stages(&text))
}
