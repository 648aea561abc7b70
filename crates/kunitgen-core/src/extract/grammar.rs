//! Header patterns for the supported grammars.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Grammar;

/// Names that the header patterns pick up from control-flow lines such as
/// `else if (x) {`.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "return", "sizeof", "catch",
];

const C_HEADER: &str = concat!(
    r"(?m)^\s*",
    r"(?P<prototype>",
    r"(?:static\s+)?",
    r"[\w\s*]+[\s*]+",
    r"\w+\s*",
    r"\([^)]*\)",
    r")",
    r"\s*\{",
);

const C_NAME: &str = r"(\w+)\s*\([^)]*\)$";

const CPP_HEADER: &str = concat!(
    r"(?m)^\s*",
    r"(?P<prototype>",
    r"(?:template\s*<[^>]*>\s*)?",
    r"(?:[\w\s*&:<>,]+?)",
    r"\s+",
    r"(?:(?:\w+::)*[\w~]+)",
    r"\s*\([^)]*\)",
    r"(?:\s*const)?",
    r"(?:\s*override)?",
    r"(?:\s*final)?",
    r")",
    r"\s*\{",
);

const CPP_NAME: &str = r"((?:\w+::)*[\w~]+)\s*\([^)]*\)";

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("header pattern is a valid regex"))
}

/// Line-anchored, brace-terminated header pattern with a `prototype` group.
pub(crate) fn header_pattern(grammar: Grammar) -> &'static Regex {
    static C: OnceLock<Regex> = OnceLock::new();
    static CPP: OnceLock<Regex> = OnceLock::new();
    match grammar {
        Grammar::C => compiled(&C, C_HEADER),
        Grammar::Cpp => compiled(&CPP, CPP_HEADER),
    }
}

/// Secondary match that pulls the definition name out of a prototype.
pub(crate) fn name_pattern(grammar: Grammar) -> &'static Regex {
    static C: OnceLock<Regex> = OnceLock::new();
    static CPP: OnceLock<Regex> = OnceLock::new();
    match grammar {
        Grammar::C => compiled(&C, C_NAME),
        Grammar::Cpp => compiled(&CPP, CPP_NAME),
    }
}

/// Derive the unit name from a trimmed prototype.
pub(crate) fn derive_name(grammar: Grammar, prototype: &str, offset: usize) -> String {
    name_pattern(grammar)
        .captures(prototype)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| match grammar {
            Grammar::C => format!("unknown_function_{offset}"),
            Grammar::Cpp => format!("unknown_cpp_function_{offset}"),
        })
}

/// True when the last scope segment of `name` is a control-flow keyword.
pub(crate) fn is_control_keyword(name: &str) -> bool {
    let last = name.rsplit("::").next().unwrap_or(name);
    CONTROL_KEYWORDS.contains(&last)
}
