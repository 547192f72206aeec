//! Single-step conformance tests for both processor cores.
//!
//! Each case gives an initial register/RAM snapshot, the expected final
//! snapshot and one entry per machine cycle. The core runs exactly that many
//! cycles from the initial state and every register and listed RAM cell must
//! match.
//!
//! A handful of hand-written vectors in `tests/data/` always run. The full
//! third-party suites are read from `test-data/{cdp1802,sm83}/v1/` at the
//! workspace root and are ignored by default.

use std::fs;
use std::path::{Path, PathBuf};

use duo_emu_core::bus::{Bus, BusView, FlatBus};
use duo_emu_core::cdp1802::{Cdp1802, State};
use duo_emu_core::processor::Processor;
use duo_emu_core::sm83::Sm83;
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize)]
struct TestCase<S> {
    name: String,
    initial: S,
    #[serde(rename = "final")]
    final_state: S,
    cycles: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CosmacState {
    r: [u16; 16],
    p: u8,
    x: u8,
    d: u8,
    df: u8,
    ie: u8,
    q: u8,
    t: u8,
    ram: Vec<(u16, u8)>,
}

#[derive(Deserialize)]
struct Sm83State {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    ime: u8,
    ie: u8,
    ram: Vec<(u16, u8)>,
}

fn check_u8(errors: &mut Vec<String>, name: &str, actual: u8, expected: u8) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:02X}, want ${expected:02X}"));
    }
}

fn check_u16(errors: &mut Vec<String>, name: &str, actual: u16, expected: u16) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:04X}, want ${expected:04X}"));
    }
}

fn check_ram(errors: &mut Vec<String>, bus: &FlatBus, ram: &[(u16, u8)]) {
    for &(addr, want) in ram {
        let got = bus.read_byte(addr);
        if got != want {
            errors.push(format!("RAM[${addr:04X}]: got ${got:02X}, want ${want:02X}"));
        }
    }
}

fn load_ram(bus: &mut FlatBus, ram: &[(u16, u8)]) {
    for &(addr, value) in ram {
        bus.write_byte(addr, value);
    }
}

fn run_cosmac(case: &TestCase<CosmacState>) -> Vec<String> {
    let mut bus = FlatBus::new();
    let mut cpu = Cdp1802::new();
    let init = &case.initial;
    load_ram(&mut bus, &init.ram);
    cpu.r = init.r;
    cpu.p = init.p;
    cpu.x = init.x;
    cpu.d = init.d;
    cpu.df = init.df != 0;
    cpu.ie = init.ie != 0;
    cpu.q = init.q != 0;
    cpu.t = init.t;
    cpu.set_state(State::Fetch);

    let mut errors = Vec::new();
    for n in 0..case.cycles.len() {
        if let Err(err) = cpu.cycle(&mut bus) {
            errors.push(format!("cycle {n}: {err}"));
            return errors;
        }
    }

    let want = &case.final_state;
    for (i, (&got, &expected)) in cpu.r.iter().zip(want.r.iter()).enumerate() {
        check_u16(&mut errors, &format!("R{i:X}"), got, expected);
    }
    check_u8(&mut errors, "P", cpu.p, want.p);
    check_u8(&mut errors, "X", cpu.x, want.x);
    check_u8(&mut errors, "D", cpu.d, want.d);
    check_u8(&mut errors, "DF", cpu.df as u8, want.df);
    check_u8(&mut errors, "IE", cpu.ie as u8, want.ie);
    check_u8(&mut errors, "Q", cpu.q as u8, want.q);
    check_u8(&mut errors, "T", cpu.t, want.t);
    check_ram(&mut errors, &bus, &want.ram);
    if !cpu.at_instruction_boundary() {
        errors.push("instruction did not finish in the listed cycles".to_string());
    }
    errors
}

fn run_sm83(case: &TestCase<Sm83State>) -> Vec<String> {
    let mut bus = FlatBus::new();
    let mut cpu = Sm83::new();
    let init = &case.initial;
    load_ram(&mut bus, &init.ram);
    bus.write_byte(0xFFFF, init.ie);
    cpu.a = init.a;
    cpu.f = init.f;
    cpu.b = init.b;
    cpu.c = init.c;
    cpu.d = init.d;
    cpu.e = init.e;
    cpu.h = init.h;
    cpu.l = init.l;
    cpu.pc = init.pc;
    cpu.sp = init.sp;
    cpu.ime = init.ime != 0;

    let mut errors = Vec::new();
    for n in 0..case.cycles.len() {
        if let Err(err) = cpu.cycle(&mut bus) {
            errors.push(format!("cycle {n}: {err}"));
            return errors;
        }
    }

    let want = &case.final_state;
    check_u8(&mut errors, "A", cpu.a, want.a);
    check_u8(&mut errors, "F", cpu.f, want.f);
    check_u8(&mut errors, "B", cpu.b, want.b);
    check_u8(&mut errors, "C", cpu.c, want.c);
    check_u8(&mut errors, "D", cpu.d, want.d);
    check_u8(&mut errors, "E", cpu.e, want.e);
    check_u8(&mut errors, "H", cpu.h, want.h);
    check_u8(&mut errors, "L", cpu.l, want.l);
    check_u16(&mut errors, "PC", cpu.pc, want.pc);
    check_u16(&mut errors, "SP", cpu.sp, want.sp);
    check_u8(&mut errors, "IME", cpu.ime as u8, want.ime);
    check_ram(&mut errors, &bus, &want.ram);
    errors
}

fn run_cases<S, F>(cases: &[TestCase<S>], run: F) -> Vec<String>
where
    F: Fn(&TestCase<S>) -> Vec<String>,
{
    let mut failures = Vec::new();
    for case in cases {
        let errors = run(case);
        failures.extend(errors.into_iter().map(|e| format!("{}: {e}", case.name)));
    }
    failures
}

fn load_cases<S: DeserializeOwned>(path: &Path) -> Vec<TestCase<S>> {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("reading {}: {err}", path.display()));
    serde_json::from_str(&text).unwrap_or_else(|err| panic!("parsing {}: {err}", path.display()))
}

fn data_file(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn suite_dir(arch: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../test-data")
        .join(arch)
        .join("v1")
}

fn assert_no_failures(failures: &[String], total: usize) {
    if !failures.is_empty() {
        let shown: Vec<&str> = failures.iter().take(50).map(String::as_str).collect();
        panic!(
            "{} mismatches over {total} cases:\n{}",
            failures.len(),
            shown.join("\n")
        );
    }
}

fn run_suite<S, F>(arch: &str, run: F)
where
    S: DeserializeOwned,
    F: Fn(&TestCase<S>) -> Vec<String> + Copy,
{
    let dir = suite_dir(arch);
    let Ok(entries) = fs::read_dir(&dir) else {
        eprintln!("Skipping {arch} suite: {} not found", dir.display());
        return;
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .collect();
    files.sort();

    let mut failures = Vec::new();
    let mut total = 0;
    for file in &files {
        let cases: Vec<TestCase<S>> = load_cases(file);
        total += cases.len();
        failures.extend(run_cases(&cases, run));
    }
    eprintln!("{arch}: {} files, {total} cases", files.len());
    assert_no_failures(&failures, total);
}

#[test]
fn cdp1802_vectors() {
    let cases: Vec<TestCase<CosmacState>> = load_cases(&data_file("cdp1802.json"));
    assert!(!cases.is_empty());
    assert_no_failures(&run_cases(&cases, run_cosmac), cases.len());
}

#[test]
fn sm83_vectors() {
    let cases: Vec<TestCase<Sm83State>> = load_cases(&data_file("sm83.json"));
    assert!(!cases.is_empty());
    assert_no_failures(&run_cases(&cases, run_sm83), cases.len());
}

#[test]
fn mismatch_names_case_and_register() {
    let mut cases: Vec<TestCase<Sm83State>> = load_cases(&data_file("sm83.json"));
    cases.truncate(1);
    cases[0].final_state.a ^= 0xFF;
    let failures = run_cases(&cases, run_sm83);
    assert_eq!(failures, ["3e ld a,n8: A: got $42, want $BD"]);
}

#[test]
#[ignore = "requires test-data/cdp1802; run with --ignored"]
fn cdp1802_suite() {
    run_suite::<CosmacState, _>("cdp1802", run_cosmac);
}

#[test]
#[ignore = "requires test-data/sm83; run with --ignored"]
fn sm83_suite() {
    run_suite::<Sm83State, _>("sm83", run_sm83);
}
