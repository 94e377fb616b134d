// SPDX-License-Identifier: PMPL-1.0-or-later

use anyhow::{anyhow, Result};
use colored::{ColoredString, Colorize};
use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

pub fn run_self_diagnostics() -> Result<()> {
    println!("{}", "bayzzer self-diagnostics".bold().yellow());

    let mut checks = Vec::new();
    checks.push(Diagnostic::ok("version", format!("bayzzer {}", env!("CARGO_PKG_VERSION"))));
    checks.push(check_compiler());
    checks.push(check_asan());
    checks.push(check_scratch_dir(Path::new(".")));

    println!();
    for entry in &checks {
        entry.print();
    }

    if checks.iter().any(|entry| matches!(entry.level, Level::Error)) {
        Err(anyhow!("self-diagnostics reported issues"))
    } else {
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Level {
    Ok,
    Warn,
    Error,
}

struct Diagnostic {
    label: &'static str,
    level: Level,
    detail: String,
}

impl Diagnostic {
    fn new(label: &'static str, level: Level, detail: String) -> Self {
        Self { label, level, detail }
    }

    fn ok(label: &'static str, detail: String) -> Self {
        Self::new(label, Level::Ok, detail)
    }

    fn warning(label: &'static str, detail: String) -> Self {
        Self::new(label, Level::Warn, detail)
    }

    fn error(label: &'static str, detail: String) -> Self {
        Self::new(label, Level::Error, detail)
    }

    fn print(&self) {
        println!("  [{}] {:22} {}", self.level.tag(), self.label, self.detail);
    }
}

impl Level {
    fn tag(&self) -> ColoredString {
        match self {
            Level::Ok => "OK".green(),
            Level::Warn => "WARN".yellow(),
            Level::Error => "ERR".red().bold(),
        }
    }
}

fn cc_binary() -> String {
    env::var("CC").unwrap_or_else(|_| "cc".to_string())
}

fn check_compiler() -> Diagnostic {
    let cc = cc_binary();
    match Command::new(&cc).arg("--version").output() {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout).lines().next().unwrap_or("").to_string();
            Diagnostic::ok("C compiler", format!("{cc}: {version}"))
        }
        Ok(out) => Diagnostic::error(
            "C compiler",
            format!("{cc} exited with {}: {}", out.status, String::from_utf8_lossy(&out.stderr)),
        ),
        Err(err) => Diagnostic::error("C compiler", format!("{cc} not runnable: {err}")),
    }
}

/// Compiles a one-line program with `-fsanitize=address` in a scratch
/// directory to confirm the toolchain actually supports ASAN, not just
/// that `cc` exists.
fn check_asan() -> Diagnostic {
    let dir = std::env::temp_dir().join(format!("bayzzer-asan-probe-{}", std::process::id()));
    if let Err(err) = fs::create_dir_all(&dir) {
        return Diagnostic::warning("ASAN support", format!("could not create scratch dir: {err}"));
    }
    let src = dir.join("probe.c");
    let exe = dir.join("probe.out");
    if fs::write(&src, "int main(void) { return 0; }\n").is_err() {
        return Diagnostic::warning("ASAN support", "could not write probe source".to_string());
    }

    let output = Command::new(cc_binary()).args(["-fsanitize=address", "-o"]).arg(&exe).arg(&src).output();
    let diagnostic = match output {
        Ok(out) if out.status.success() => Diagnostic::ok("ASAN support", "compiles with -fsanitize=address".to_string()),
        Ok(out) => Diagnostic::error("ASAN support", String::from_utf8_lossy(&out.stderr).trim().to_string()),
        Err(err) => Diagnostic::error("ASAN support", format!("compiler invocation failed: {err}")),
    };
    let _ = fs::remove_dir_all(&dir);
    diagnostic
}

fn check_scratch_dir(dir: &Path) -> Diagnostic {
    let probe = dir.join(".bayzzer-write-probe");
    match fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            Diagnostic::ok("scratch directory", format!("{} is writable", dir.display()))
        }
        Err(err) => Diagnostic::error("scratch directory", format!("{} is not writable: {err}", dir.display())),
    }
}
