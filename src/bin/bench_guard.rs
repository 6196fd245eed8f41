//! Fails when a criterion median exceeds its budget.
//!
//! Usage: `bench_guard [criterion-dir]` after `cargo bench --bench layout`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Median budgets in nanoseconds. Loose on purpose; CI machines vary.
const BUDGETS: [(&str, u64); 3] = [
    ("layout/compute_uniform", 50_000),
    ("layout/compute_template", 100_000),
    ("case/get_resolved", 20_000),
];

fn main() -> ExitCode {
    let requested = env::args().nth(1).unwrap_or_else(|| "target/criterion".to_string());
    let Some(root) = locate(Path::new(&requested)) else {
        eprintln!("bench_guard: no criterion output at {requested}");
        return ExitCode::from(2);
    };

    let mut failures = Vec::new();
    for (name, budget) in BUDGETS {
        match median_ns(&root, name) {
            Ok(median) if median > budget => {
                failures.push(format!("{name}: median {median}ns over budget {budget}ns"));
            }
            Ok(median) => println!("{name}: {median}ns (budget {budget}ns)"),
            Err(e) => failures.push(format!("{name}: {e}")),
        }
    }

    if failures.is_empty() {
        return ExitCode::SUCCESS;
    }
    eprintln!("bench_guard failed:");
    for f in &failures {
        eprintln!("  {f}");
    }
    ExitCode::FAILURE
}

/// Finds `requested` as given or under one of the parent directories,
/// for builds that put `target/` above the crate.
fn locate(requested: &Path) -> Option<PathBuf> {
    if requested.exists() {
        return Some(requested.to_path_buf());
    }
    if requested.is_absolute() {
        return None;
    }
    let mut dir = env::current_dir().ok()?;
    while dir.pop() {
        let candidate = dir.join(requested);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn median_ns(root: &Path, name: &str) -> Result<u64, String> {
    // criterion writes <group>/<bench>/new/estimates.json
    let path = root.join(name).join("new").join("estimates.json");
    let bytes = fs::read(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("parse {}: {e}", path.display()))?;

    let median = json
        .pointer("/median/point_estimate")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| format!("no median in {}", path.display()))?;
    if !median.is_finite() || median < 0.0 {
        return Err(format!("bad median {median} in {}", path.display()));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(median.round() as u64)
}
