// SPDX-License-Identifier: PMPL-1.0-or-later

//! Directed mutational fuzzer: instruments a C source file with a
//! sentinel before a target line, compiles it with ASAN, and searches
//! for an input that reaches and crashes at that line.
//!
//! Subprocess plumbing (spawn, poll with timeout, classify from
//! `Output`) is grounded on the teacher's
//! `attack::executor::AttackExecutor::run_program_with_timeout`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use crate::errors::CoreError;
use crate::fuzzer::mutate;
use crate::fuzzer::rng::Rng;

const SENTINEL: &str = "__TARGET_REACHED__";
const EXEC_TIMEOUT: Duration = Duration::from_secs(2);
const POPULATION_CAP: usize = 50;

/// Outcome of one `fuzz_target` run.
#[derive(Debug, Clone)]
pub struct FuzzingResult {
    pub target_line: u32,
    pub reached: bool,
    pub crashed: bool,
    pub time_to_exposure: Duration,
    pub triggering_input: Vec<u8>,
    pub output: String,
}

struct ExecutionOutcome {
    reached: bool,
    crashed: bool,
    stdout: String,
    stderr: String,
}

/// Owns one instrumented scratch source and executable for a single
/// target line; `cleanup` removes both.
pub struct DirectedFuzzer {
    c_source_path: PathBuf,
    work_dir: PathBuf,
    instrumented_source_path: Option<PathBuf>,
    executable_path: Option<PathBuf>,
}

impl DirectedFuzzer {
    pub fn new(c_source_path: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            c_source_path: c_source_path.into(),
            work_dir: work_dir.into(),
            instrumented_source_path: None,
            executable_path: None,
        }
    }

    /// Insert the sentinel print immediately before `target_line`
    /// (1-based), write the instrumented source to a scratch file, and
    /// compile it with the host C toolchain and ASAN.
    pub fn compile_target(&mut self, target_line: u32, worker_tag: &str) -> Result<(), CoreError> {
        let source = fs::read_to_string(&self.c_source_path)
            .map_err(|e| CoreError::Build { path: self.c_source_path.clone(), stderr: e.to_string() })?;
        let mut lines: Vec<&str> = source.lines().collect();

        let idx = target_line as usize;
        if idx == 0 || idx > lines.len() + 1 {
            return Err(CoreError::Build {
                path: self.c_source_path.clone(),
                stderr: format!("invalid target line {target_line}"),
            });
        }
        let injection = format!("printf(\"{SENTINEL}\\n\");fflush(stdout);");
        lines.insert(idx.saturating_sub(1).min(lines.len()), injection.as_str());
        let instrumented = lines.join("\n") + "\n";

        let basename = self
            .c_source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "target.c".to_string());
        let source_path = self.work_dir.join(format!("instr_{worker_tag}_{basename}"));
        fs::write(&source_path, instrumented)
            .map_err(|e| CoreError::Build { path: source_path.clone(), stderr: e.to_string() })?;

        let exe_path = self.work_dir.join(format!("fuzz_target_{worker_tag}.out"));
        let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
        let output = Command::new(&cc)
            .args(["-g", "-fsanitize=address", "-o"])
            .arg(&exe_path)
            .arg(&source_path)
            .output()
            .map_err(|e| CoreError::Build { path: source_path.clone(), stderr: e.to_string() })?;

        if !output.status.success() {
            return Err(CoreError::Build {
                path: source_path.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        self.instrumented_source_path = Some(source_path);
        self.executable_path = Some(exe_path);
        Ok(())
    }

    /// Run the compiled binary with `input` as `argv[1]` (embedded zero
    /// bytes stripped) under a 2 s timeout.
    fn execute_input(&self, input: &[u8]) -> ExecutionOutcome {
        let exe = self.executable_path.as_ref().expect("compile_target must succeed first");
        let clean: Vec<u8> = input.iter().copied().filter(|&b| b != 0).collect();
        let arg = String::from_utf8_lossy(&clean).to_string();

        match run_with_timeout(exe, &arg, EXEC_TIMEOUT) {
            Some(output) => classify(&output),
            None => ExecutionOutcome {
                reached: false,
                crashed: false,
                stdout: String::new(),
                stderr: String::new(),
            },
        }
    }

    /// Compile once, then search for a crashing input until `time_budget`
    /// elapses or a crash at the target is found.
    pub fn fuzz_target(&mut self, target_line: u32, time_budget: Duration, worker_tag: &str) -> FuzzingResult {
        if let Err(e) = self.compile_target(target_line, worker_tag) {
            return FuzzingResult {
                target_line,
                reached: false,
                crashed: false,
                time_to_exposure: Duration::ZERO,
                triggering_input: Vec::new(),
                output: format!("Compilation failed: {e}"),
            };
        }

        let mut rng = Rng::from_entropy();
        let start = Instant::now();
        let mut population = initial_seeds(&mut rng);

        let mut best_input: Option<Vec<u8>> = None;
        let mut reached_any = false;
        let mut crashed = false;
        let mut captured_output = String::new();

        while start.elapsed() < time_budget {
            let parent_idx = rng.choose_index(&population);
            let child = if population.len() >= 2 && rng.gen_range(8) == 0 {
                let other_idx = rng.choose_index(&population);
                mutate::splice(&population[parent_idx], &population[other_idx], &mut rng)
            } else {
                mutate::mutate(&population[parent_idx], &mut rng)
            };

            let outcome = self.execute_input(&child);
            if outcome.reached {
                reached_any = true;
                best_input = Some(child.clone());
                captured_output = outcome.stdout.clone();
                if outcome.crashed {
                    crashed = true;
                    break;
                }
                population.push(child);
            }

            if population.len() > POPULATION_CAP {
                let drop = population.len() - POPULATION_CAP;
                population.drain(0..drop);
            }
        }

        FuzzingResult {
            target_line,
            reached: reached_any,
            crashed,
            time_to_exposure: start.elapsed(),
            triggering_input: best_input.unwrap_or_default(),
            output: captured_output,
        }
    }

    pub fn cleanup(&mut self) {
        if let Some(p) = self.instrumented_source_path.take() {
            let _ = fs::remove_file(p);
        }
        if let Some(p) = self.executable_path.take() {
            let _ = fs::remove_file(p);
        }
    }
}

impl Drop for DirectedFuzzer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn initial_seeds(rng: &mut Rng) -> Vec<Vec<u8>> {
    let mut seeds: Vec<Vec<u8>> = (0..5).map(|_| rng.random_printable()).collect();
    seeds.push(vec![b'A'; 100]);
    seeds.push(b"10".to_vec());
    seeds.push(b"-1".to_vec());
    seeds
}

fn run_with_timeout(exe: &Path, arg: &str, timeout: Duration) -> Option<Output> {
    let mut child = Command::new(exe)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .ok()?;

    let start = Instant::now();
    loop {
        if let Ok(Some(_status)) = child.try_wait() {
            break;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            // Timed-out executions are discarded, not classified as a crash.
            return None;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    child.wait_with_output().ok()
}

fn classify(output: &Output) -> ExecutionOutcome {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let reached = stdout.contains(SENTINEL);
    let sanitizer_marker = stderr.contains("AddressSanitizer") || stderr.contains("ERROR: libFuzzer");
    let sigsegv = output.status.code().is_none() && is_segv(output);
    let crashed = sanitizer_marker || sigsegv;

    ExecutionOutcome { reached, crashed, stdout, stderr }
}

#[cfg(unix)]
fn is_segv(output: &Output) -> bool {
    use std::os::unix::process::ExitStatusExt;
    output.status.signal() == Some(11)
}

#[cfg(not(unix))]
fn is_segv(_output: &Output) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_c(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn cc_available() -> bool {
        Command::new(std::env::var("CC").unwrap_or_else(|_| "cc".to_string()))
            .arg("--version")
            .output()
            .is_ok()
    }

    #[test]
    fn overflow_target_is_found_within_budget() {
        if !cc_available() {
            eprintln!("skipping: no C compiler available");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let src = write_c(
            dir.path(),
            "overflow.c",
            "#include <string.h>\n#include <stdio.h>\nint main(int argc, char **argv) {\n    char buffer[10];\n    strcpy(buffer, argv[1]);\n    printf(\"%s\\n\", buffer);\n    return 0;\n}\n",
        );
        let mut fuzzer = DirectedFuzzer::new(&src, dir.path());
        let result = fuzzer.fuzz_target(5, Duration::from_secs(20), "t1");
        assert!(result.reached, "expected to reach the instrumented line: {}", result.output);
        assert!(result.crashed, "expected ASAN to report the overflow");
        assert!(result.triggering_input.len() >= 10);
    }

    #[test]
    fn compilation_failure_is_reported_without_crash() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_c(dir.path(), "broken.c", "int main( {\n");
        let mut fuzzer = DirectedFuzzer::new(&src, dir.path());
        let result = fuzzer.fuzz_target(1, Duration::from_secs(1), "t2");
        assert!(!result.reached);
        assert!(!result.crashed);
        assert!(result.output.contains("Compilation failed"));
    }
}
