//! Framework de testes do kernel
//!
//! As suites são executadas no boot (feature `self_test`) e também pelo
//! harness do host, que roda cada `TestCase` como um `#[test]`.

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }

    pub fn run(&self) -> TestResult {
        (self.func)()
    }
}

/// Executa suite de testes. Retorna (passed, failed, skipped).
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("=== Executando suite:");
    crate::kinfo!(name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        match test.run() {
            TestResult::Pass => {
                crate::kok!(test.name);
                passed += 1;
            }
            TestResult::Fail => {
                crate::kfail!(test.name);
                failed += 1;
            }
            TestResult::Skip => {
                crate::kwarn!("[SKIP]");
                crate::kwarn!(test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!("Resultados: passed=", passed as u64);
    if failed > 0 {
        crate::kerror!("Resultados: failed=", failed as u64);
    }
    (passed, failed, skipped)
}

/// Falha do primeiro caso que não passou (usado pelo harness do host).
#[cfg(test)]
pub fn assert_suite(tests: &[TestCase]) {
    for test in tests {
        assert_eq!(test.run(), TestResult::Pass, "self-test falhou: {}", test.name);
    }
}
