// Snapshot tests: lock generated C and JavaScript output to detect unintended
// behavior changes.
//
// Uses the library pipeline directly. Snapshots are managed by `insta` and
// stored under `compiler/tests/snapshots/`.
//
// Run `cargo insta review` after intentional output changes to update baselines.

use jamc::config::CompileOptions;
use jamc::pipeline::{compile, Artifacts};

const ADD_EMBEDDED: &str = "\
jsync int add(int a, int b) {
    return a + b;
}

int main() {
    return 0;
}
";

const ADD_MANAGED: &str = "\
var r = await add(1, 2);
console.log(r);
";

fn artifacts(embedded: &str, managed: &str) -> Artifacts {
    let out = compile(embedded, managed, &CompileOptions::default())
        .unwrap_or_else(|e| panic!("compile failed: {:?}", e.diagnostics));
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);
    out.artifacts.expect("assembled artifacts")
}

#[test]
fn snapshot_sync_activity_c() {
    let a = artifacts(ADD_EMBEDDED, ADD_MANAGED);
    insta::assert_snapshot!("sync_activity_c", a.embedded);
}

#[test]
fn snapshot_sync_activity_js() {
    let a = artifacts(ADD_EMBEDDED, ADD_MANAGED);
    insta::assert_snapshot!("sync_activity_js", a.managed);
}

#[test]
fn snapshot_async_managed_activity_c() {
    let a = artifacts(
        "jactivity_t *notify(char*);\nint main() {\n    notify(\"hi\");\n    return 0;\n}\n",
        "jasync function notify(msg) {\n    console.log(msg);\n}\n",
    );
    insta::assert_snapshot!("async_managed_activity_c", a.embedded);
}

#[test]
fn generated_output_is_deterministic() {
    let a = artifacts(ADD_EMBEDDED, ADD_MANAGED);
    let b = artifacts(ADD_EMBEDDED, ADD_MANAGED);
    assert_eq!(a, b);
}
