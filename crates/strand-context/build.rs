//! Build script for strand-context
//!
//! Produces `OUT_DIR/strand_merged_config.rs`: library defaults, overridden
//! by any `pub const` found in the file named by `STRAND_CONFIG_RS`.
//! Only the constants being changed need to appear in that file.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const CONFIG_ENV: &str = "STRAND_CONFIG_RS";

struct Param {
    name: &'static str,
    ty: &'static str,
    default: &'static str,
}

const PARAMS: &[Param] = &[
    Param { name: "STACK_SIZE", ty: "usize", default: "64 * 1024" },
    Param { name: "MAX_CONTEXTS", ty: "usize", default: "4096" },
    Param { name: "PRESERVE_FPU", ty: "bool", default: "true" },
    Param { name: "STACK_POOL_LIMIT", ty: "usize", default: "64" },
    Param { name: "NUM_CARRIERS", ty: "usize", default: "4" },
    Param { name: "INJECTOR_CAPACITY", ty: "usize", default: "1024" },
    Param { name: "PARK_TIMEOUT_MS", ty: "u64", default: "10" },
];

fn main() {
    println!("cargo:rerun-if-env-changed={}", CONFIG_ENV);

    let Some(out_dir) = env::var_os("OUT_DIR") else {
        panic!("OUT_DIR is not set; build.rs must run under cargo");
    };
    let dest = Path::new(&out_dir).join("strand_merged_config.rs");

    let mut values: BTreeMap<&'static str, String> =
        PARAMS.iter().map(|p| (p.name, p.default.to_string())).collect();

    let user_path = env::var(CONFIG_ENV).ok();
    if let Some(path) = &user_path {
        println!("cargo:rerun-if-changed={}", path);
        match fs::read_to_string(path) {
            Ok(content) => {
                for unknown in merge_overrides(&content, &mut values) {
                    println!("cargo:warning=Unknown strand config parameter: {}", unknown);
                }
                println!("cargo:warning=Using strand config: {}", path);
            }
            Err(e) => println!("cargo:warning=Failed to read {} ({}): {}", CONFIG_ENV, path, e),
        }
    }

    if let Err(e) = fs::write(&dest, render(&values, user_path.is_some())) {
        panic!("failed to write {}: {}", dest.display(), e);
    }
}

/// Apply every `pub const NAME: TYPE = VALUE;` line from `content`.
/// Returns names that are not known parameters.
fn merge_overrides(content: &str, values: &mut BTreeMap<&'static str, String>) -> Vec<String> {
    let mut unknown = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.starts_with("//") {
            continue;
        }
        let Some((name, value)) = parse_const(line) else {
            continue;
        };
        match PARAMS.iter().find(|p| p.name == name) {
            Some(p) => {
                values.insert(p.name, value);
            }
            None => unknown.push(name),
        }
    }
    unknown
}

fn parse_const(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?;
    let (name, rest) = rest.split_once(':')?;
    let (_, value) = rest.split_once('=')?;
    let value = value.trim().trim_end_matches(';').trim();
    if value.is_empty() {
        return None;
    }
    Some((name.trim().to_string(), value.to_string()))
}

fn render(values: &BTreeMap<&'static str, String>, has_user: bool) -> String {
    let mut out = String::from("// Generated by strand-context build.rs\n");
    if has_user {
        out.push_str("// Includes overrides from STRAND_CONFIG_RS\n");
    }
    out.push('\n');
    for p in PARAMS {
        let value = values.get(p.name).map(String::as_str).unwrap_or(p.default);
        out.push_str(&format!("pub const {}: {} = {};\n", p.name, p.ty, value));
    }
    out
}
