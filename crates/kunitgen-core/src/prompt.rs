//! Prompt rendering and response cleanup for test generation.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::collab::GenerationRequest;

/// Prefix a generator uses instead of source when its request failed.
pub const ERROR_PLACEHOLDER_MARKER: &str = "// Error generating response";

const ROLE: &str = "You are an expert Linux kernel developer with deep experience in \
writing high-quality, coverage-focused KUnit tests.\n\n\
Your task is to generate a complete, compilable KUnit test file for the target \
function below, using the reference tests and the previous compilation errors as \
guidance. The goal is code that compiles without any errors.";

const RULES: &[&str] = &[
    "Include all necessary kernel headers for structs, macros, and functions.",
    "Use pointers for opaque structs and allocate with `kunit_kzalloc(test, sizeof(*obj), GFP_KERNEL)`.",
    "Avoid modifying read-only or const members.",
    "Ensure all functions are declared or included via headers; do not call undeclared functions.",
    "Place all test cases in a single `static struct kunit_case` array.",
    "Define one `static struct kunit_suite` referencing this array with `.test_cases`.",
    "Register the suite with `kunit_test_suite(...)`.",
    "Use `KUNIT_EXPECT_*` macros for assertions.",
    "Do not repeat any error listed under previous compilation errors.",
    "Do NOT mock the function under test. Mock dependencies only when needed to compile.",
];

/// Render the full prompt for one generation attempt.
pub fn render_prompt(request: &GenerationRequest, include_directive: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str(ROLE);

    let _ = write!(
        out,
        "\n\n## Target function `{}`\n\n{}\n",
        request.unit_name, request.unit_body
    );

    out.push_str("\n## Reference tests\n\n");
    if request.exemplars.is_empty() {
        out.push_str("none\n");
    }
    for (i, exemplar) in request.exemplars.iter().enumerate() {
        let _ = write!(out, "### Reference {}\n\n{}\n\n", i + 1, exemplar.trim_end());
    }

    out.push_str("\n## Previous compilation errors\n\n");
    match request.feedback.as_deref() {
        Some(feedback) if !feedback.trim().is_empty() => {
            out.push_str(feedback.trim_end());
            out.push('\n');
        }
        _ => out.push_str("none\n"),
    }

    out.push_str("\n## Rules\n\n");
    let mut n = 0;
    for rule in RULES {
        n += 1;
        let _ = writeln!(out, "{n}. {rule}");
    }
    if let Some(file) = include_directive {
        n += 1;
        let _ = writeln!(out, "{n}. Add `#include \"{file}\"` so the test sees static functions.");
    }

    out.push_str("\nOutput only compilable KUnit C source code.\n");
    out
}

fn fence_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+\-]*").expect("fence regex is valid"))
}

/// Strip code-fence markers and surrounding whitespace.
pub fn clean_response(raw: &str) -> String {
    fence_pattern().replace_all(raw, "").trim().to_string()
}

/// True when `text` is an error placeholder rather than generated source.
pub fn is_placeholder(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_PLACEHOLDER_MARKER)
}
