// SPDX-License-Identifier: PMPL-1.0-or-later

//! C front-end collaborator: a heuristic regex line-scanner, **not** a
//! C parser. It extracts the flat `input_sources` / `data_flows` /
//! `memory_operations` record stream the Datalog evaluator consumes
//! (spec §4.C's EDB construction rules), good enough to drive a
//! campaign end-to-end on a realistic single-translation-unit C
//! program. It does not preprocess macros, resolve types, or build an
//! AST; a real front-end (e.g. a `pycparser`/libclang binding) is an
//! out-of-scope external collaborator this module stands in for.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::kanren::EdbFacts;

/// Function name -> argument indices (0-based) that are memory sinks,
/// matching the original prototype's `memory_sink_functions` table.
fn memory_sink_indices(name: &str) -> Option<Vec<usize>> {
    match name {
        "strcpy" | "strcat" | "memcpy" => Some(vec![1]),
        "sprintf" | "printf" => Some((1..10).collect()),
        _ => None,
    }
}

fn main_sig_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)main\s*\(([^)]*)\)").unwrap())
}

fn func_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[A-Za-z_][\w]*[\s\*]+)+([A-Za-z_]\w*)\s*\(([^)]*)\)\s*\{?\s*$").unwrap())
}

fn scanf_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"scanf\s*\(\s*"[^"]*"\s*,\s*([^)]+)\)"#).unwrap())
}

fn input_call_assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z_]\w*)\s*=\s*(atoi|atol|atof|gets|fgets|read|fread)\s*\(").unwrap()
    })
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[A-Za-z_][\w]*[\s\*]+)?([A-Za-z_]\w*)\s*=\s*([^=][^;]*);").unwrap())
}

fn array_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_]\w*\s*\[\s*([A-Za-z_]\w*)\s*\]").unwrap())
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_]\w*)\s*\(([^)]*)\)").unwrap())
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_]\w*").unwrap())
}

/// C keywords and control constructs that the generic call-site scan
/// must not mistake for a user function invocation.
const NOT_CALLS: &[&str] = &[
    "if", "for", "while", "switch", "sizeof", "return", "scanf", "printf", "sprintf", "strcpy",
    "strcat", "memcpy", "gets", "fgets", "atoi", "atol", "atof", "read", "fread", "main",
];

fn var_name_from_arg(arg: &str) -> Option<String> {
    let trimmed = arg.trim().trim_start_matches('&').trim();
    let trimmed = trimmed.trim_start_matches('(').trim_end_matches(')');
    // An array subscript argument (e.g. `argv[1]`) resolves to its base
    // array name, coarse-grained like the rest of this scan.
    let trimmed = match trimmed.find('[') {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };
    if ident_re().is_match(trimmed) && trimmed.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn extract_idents(expr: &str) -> Vec<String> {
    ident_re().find_iter(expr).map(|m| m.as_str().to_string()).collect()
}

/// Read and analyze a C source file at `path`.
pub fn analyze_file(path: &Path) -> std::io::Result<EdbFacts> {
    let source = fs::read_to_string(path)?;
    Ok(analyze_source(&source))
}

/// Scan `source` line by line and extract EDB facts. Pure and
/// deterministic, so it is the unit of this module that is tested
/// directly.
pub fn analyze_source(source: &str) -> EdbFacts {
    let lines: Vec<&str> = source.lines().collect();

    let mut function_defs: HashMap<String, Vec<String>> = HashMap::new();
    for line in &lines {
        if let Some(caps) = func_def_re().captures(line) {
            let name = caps[1].to_string();
            if NOT_CALLS.contains(&name.as_str()) {
                continue;
            }
            let params = split_params(&caps[2]);
            function_defs.insert(name, params);
        }
    }

    let mut input_sources: Vec<String> = Vec::new();
    let mut data_flows: Vec<(String, String)> = Vec::new();
    let mut memory_operations: Vec<(String, u32)> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let lineno = (idx + 1) as u32;

        if let Some(caps) = main_sig_re().captures(line) {
            for param in split_params(&caps[1]) {
                if !param.is_empty() {
                    input_sources.push(param);
                }
            }
        }

        if let Some(caps) = scanf_re().captures(line) {
            for raw_arg in caps[1].split(',') {
                if let Some(v) = var_name_from_arg(raw_arg) {
                    input_sources.push(v);
                }
            }
        }

        if let Some(caps) = input_call_assign_re().captures(line) {
            input_sources.push(caps[1].to_string());
        }

        if let Some(caps) = assignment_re().captures(line) {
            let target = caps[1].to_string();
            let rhs = &caps[2];
            for src in extract_idents(rhs) {
                if src != target {
                    data_flows.push((src, target.clone()));
                }
            }
        }

        for caps in array_ref_re().captures_iter(line) {
            memory_operations.push((caps[1].to_string(), lineno));
        }

        // A function definition header also looks like a call
        // (`name(params) {`); skip it here so the param list isn't
        // mistaken for call arguments flowing into itself.
        if func_def_re().is_match(line) {
            continue;
        }

        for caps in call_re().captures_iter(line) {
            let name = caps[1].to_string();
            let args_str = &caps[2];
            if let Some(indices) = memory_sink_indices(&name) {
                let args: Vec<&str> = args_str.split(',').collect();
                for &i in &indices {
                    if let Some(raw_arg) = args.get(i) {
                        if let Some(v) = var_name_from_arg(raw_arg) {
                            memory_operations.push((v, lineno));
                        }
                    }
                }
                continue;
            }
            if NOT_CALLS.contains(&name.as_str()) {
                continue;
            }
            if let Some(params) = function_defs.get(&name) {
                let args: Vec<&str> = args_str.split(',').collect();
                for (i, param) in params.iter().enumerate() {
                    if let Some(raw_arg) = args.get(i) {
                        for src in extract_idents(raw_arg) {
                            data_flows.push((src, param.clone()));
                        }
                    }
                }
            }
        }
    }

    input_sources.sort();
    input_sources.dedup();
    data_flows.sort();
    data_flows.dedup();
    memory_operations.sort();
    memory_operations.dedup();

    EdbFacts {
        input_sources,
        data_flows,
        memory_operations,
    }
}

fn split_params(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|p| {
            let p = p.trim();
            if p.is_empty() || p == "void" {
                return None;
            }
            // Last identifier token is the parameter name (strips type,
            // pointer stars, and any trailing array brackets).
            let p = p.trim_end_matches(']').split('[').next().unwrap_or(p);
            ident_re().find_iter(p).last().map(|m| m.as_str().to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanf_target_is_an_input_source() {
        let src = r#"
int main() {
    int x;
    scanf("%d", &x);
    return 0;
}
"#;
        let edb = analyze_source(src);
        assert!(edb.input_sources.contains(&"x".to_string()));
    }

    #[test]
    fn main_argv_parameter_is_an_input_source() {
        let src = "int main(int argc, char *argv[]) {\n    return 0;\n}\n";
        let edb = analyze_source(src);
        assert!(edb.input_sources.contains(&"argc".to_string()));
        assert!(edb.input_sources.contains(&"argv".to_string()));
    }

    #[test]
    fn atoi_assignment_is_an_input_source() {
        let src = "int main(int argc, char **argv) {\n    int n = atoi(argv[1]);\n    return 0;\n}\n";
        let edb = analyze_source(src);
        assert!(edb.input_sources.contains(&"n".to_string()));
    }

    #[test]
    fn simple_assignment_is_a_data_flow() {
        let src = "void f() {\n    int a;\n    int b;\n    b = a;\n}\n";
        let edb = analyze_source(src);
        assert!(edb.data_flows.contains(&("a".to_string(), "b".to_string())));
    }

    #[test]
    fn array_subscript_records_index_variable_memory_op() {
        let src = "void f(int i) {\n    int buf[10];\n    buf[i] = 1;\n}\n";
        let edb = analyze_source(src);
        assert!(edb.memory_operations.iter().any(|(v, _)| v == "i"));
    }

    #[test]
    fn strcpy_second_argument_is_a_memory_op() {
        let src = "void f(char *input) {\n    char buffer[10];\n    strcpy(buffer, input);\n}\n";
        let edb = analyze_source(src);
        assert!(edb.memory_operations.iter().any(|(v, _)| v == "input"));
    }

    #[test]
    fn call_argument_flows_to_callee_parameter() {
        let src = "void sink(char *p) {\n    p[0] = 0;\n}\nint main(int argc, char **argv) {\n    sink(argv);\n    return 0;\n}\n";
        let edb = analyze_source(src);
        assert!(edb.data_flows.contains(&("argv".to_string(), "p".to_string())));
    }
}
