//! End-to-end CLI scenarios: each drives the `taintrace` binary over a small
//! fixture source file and a fixture rule module directory, then asserts on
//! its `--json` output.

use assert_cmd::Command;
use std::path::Path;

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn run_json(modules_root: &Path, target: &Path) -> serde_json::Value {
    let output = Command::cargo_bin("taintrace")
        .unwrap()
        .arg("--json")
        .arg("--modules")
        .arg(modules_root)
        .arg(target)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("valid JSON report")
}

fn find_method<'a>(report: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    report["files"][0]["methods"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == name)
        .unwrap_or_else(|| panic!("method {name} reported"))
}

#[test]
fn simple_taint_through_output_parameter() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();

    write(
        root,
        "modules/c/sources/scanf.yml",
        "null:\n  Methods:\n    - Methodname: scanf\n      Parameters: [null, \"$TAINT\"]\n      Comment: Reads formatted input from stdin.\n",
    );
    write(
        root,
        "modules/c/sinks/printf.yml",
        "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n",
    );
    write(
        root,
        "src.c",
        "int main(void) {\n    char buf[256];\n    scanf(\"%s\", &buf);\n    printf(buf);\n    return 0;\n}\n",
    );

    let report = run_json(&root.join("modules"), &root.join("src.c"));
    let method = find_method(&report, "main");
    let taints = method["taints"].as_array().unwrap();
    assert_eq!(taints.len(), 1);
    assert_eq!(taints[0]["call"], "printf");
    assert_eq!(taints[0]["comment"], "Format string vulnerability.");
    assert!(taints[0]["sanitizer_level"].is_null());
}

#[test]
fn sanitized_taint_is_flagged_with_sanitizer_level_zero() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();

    write(
        root,
        "modules/c/sources/scanf.yml",
        "null:\n  Methods:\n    - Methodname: scanf\n      Parameters: [null, \"$TAINT\"]\n      Comment: Reads formatted input from stdin.\n",
    );
    write(
        root,
        "modules/c/sinks/printf.yml",
        "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n      Sanitizers:\n        - null:\n            Methods:\n              - Methodname: test\n                Parameters: [\"$TAINT\"]\n                Comment: Neutralizes format strings.\n",
    );
    write(
        root,
        "src.c",
        "int main(void) {\n    char buf[256];\n    scanf(\"%s\", &buf);\n    test(buf);\n    printf(buf);\n    return 0;\n}\n",
    );

    let report = run_json(&root.join("modules"), &root.join("src.c"));
    let method = find_method(&report, "main");
    let taints = method["taints"].as_array().unwrap();
    assert_eq!(taints.len(), 1);
    assert_eq!(taints[0]["sanitizer_level"], 0);
    assert_eq!(taints[0]["severity_percent"], 50);
}

#[test]
fn sanitizer_promoted_through_a_wrapper_function_carries_indirection_level() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();

    write(
        root,
        "modules/c/sources/scanf.yml",
        "null:\n  Methods:\n    - Methodname: scanf\n      Parameters: [null, \"$TAINT\"]\n      Comment: Reads formatted input from stdin.\n",
    );
    write(
        root,
        "modules/c/sinks/printf.yml",
        "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n      Sanitizers:\n        - null:\n            Methods:\n              - Methodname: test\n                Parameters: [\"$TAINT\"]\n                Comment: Neutralizes format strings.\n",
    );
    write(
        root,
        "src.c",
        "void sanitize(char *x) {\n    test(x);\n}\n\nint main(void) {\n    char buf[256];\n    scanf(\"%s\", &buf);\n    sanitize(buf);\n    printf(buf);\n    return 0;\n}\n",
    );

    let report = run_json(&root.join("modules"), &root.join("src.c"));
    let method = find_method(&report, "main");
    let taints = method["taints"].as_array().unwrap();
    assert_eq!(taints.len(), 1);
    assert_eq!(taints[0]["sanitizer_level"], 1);
    assert_eq!(taints[0]["severity_percent"], 60);
}

#[test]
fn only_the_branch_reaching_a_tainted_sink_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();

    write(
        root,
        "modules/c/sources/scanf.yml",
        "null:\n  Methods:\n    - Methodname: scanf\n      Parameters: [null, \"$TAINT\"]\n      Comment: Reads formatted input from stdin.\n",
    );
    write(
        root,
        "modules/c/sinks/printf.yml",
        "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n",
    );
    write(
        root,
        "src.c",
        "int f(int c) {\n    char user[256];\n    scanf(\"%s\", &user);\n    if (c) {\n        printf(user);\n    } else {\n        printf(\"safe\");\n    }\n    return 0;\n}\n",
    );

    let report = run_json(&root.join("modules"), &root.join("src.c"));
    let method = find_method(&report, "f");
    let taints = method["taints"].as_array().unwrap();
    assert_eq!(taints.len(), 1);
    assert_eq!(taints[0]["call"], "printf");

    let sinks = method["sinks"].as_array().unwrap();
    assert!(sinks.is_empty(), "the untainted printf(\"safe\") call should be folded into the taint report, not double-listed as a bare sink");
}

#[test]
fn high_complexity_loop_and_branch_is_flagged_at_a_low_threshold() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();

    write(
        root,
        "modules/c/sinks/printf.yml",
        "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n",
    );
    write(
        root,
        "src.c",
        "int gcd(int a, int b) {\n    while (b != 0) {\n        int t = b;\n        b = a % b;\n        a = t;\n    }\n    if (a < 0) {\n        a = -a;\n    }\n    return a;\n}\n",
    );

    let output = Command::cargo_bin("taintrace")
        .unwrap()
        .arg("--json")
        .arg("--modules")
        .arg(root.join("modules"))
        .arg("--complexity")
        .arg("1")
        .arg(root.join("src.c"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    let method = find_method(&report, "gcd");
    let complexity = method["complexity"].as_i64().unwrap();
    assert!(complexity >= 2, "a loop plus a branch must push complexity above the straight-line baseline of 2, got {complexity}");
}

#[test]
fn object_scoped_sink_matches_after_constructor_fixup() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();

    write(
        root,
        "modules/php/sources/getenv.yml",
        "null:\n  Methods:\n    - Methodname: getenv\n      Parameters: [null]\n      Comment: Reads an environment variable.\n",
    );
    write(
        root,
        "modules/php/sinks/sink.yml",
        "C:\n  Methods:\n    - Methodname: sink\n      Parameters: [\"$TAINT\"]\n      Comment: Class-scoped sink.\n",
    );
    write(
        root,
        "src.php",
        "<?php\nclass C {\n    function sink($x) {\n        echo $x;\n    }\n}\nfunction run() {\n    $x = getenv('TAINT');\n    $o = new C();\n    $o->sink($x);\n}\n",
    );

    let report = run_json(&root.join("modules"), &root.join("src.php"));
    let method = find_method(&report, "run");
    let taints = method["taints"].as_array().unwrap();
    assert_eq!(taints.len(), 1);
    assert_eq!(taints[0]["call"], "sink");
}
