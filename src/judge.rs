use serde::Serialize;

use crate::api::{
    err::{Error, Reason},
    submissions::SubmissionStatus,
};
use crate::config::Language;
use crate::executor::{Executor, Outcome};
use crate::persistent::models::TestCase;

const HIDDEN: &str = "Hidden";
const INCORRECT: &str = "Incorrect";

/// Result of one test case as shown to the submitter
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub passed: bool,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of grading a solution against every test case of a problem
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grade {
    pub passed: bool,
    pub results: Vec<CaseReport>,
}

impl Grade {
    pub fn status(&self) -> SubmissionStatus {
        if self.passed {
            SubmissionStatus::Pass
        } else {
            SubmissionStatus::Fail
        }
    }

    /// One line summary stored with a submission
    pub fn summary(&self) -> String {
        let failed = self.results.iter().filter(|r| !r.passed).count();
        if failed == 0 {
            "All test cases passed".to_string()
        } else {
            format!("{failed} of {} test cases failed", self.results.len())
        }
    }
}

/// Compare an execution outcome with the expected output of a case
pub fn check(case: &TestCase, outcome: Outcome) -> CaseReport {
    let error = outcome.error();
    let kind = outcome.kind();
    let actual = match outcome {
        Outcome::Output(output) => output,
        _ => String::new(),
    };
    let passed = error.is_none() && actual.trim() == case.expected_output.trim();

    if case.is_hidden {
        // Never reveal anything about hidden cases beyond pass/fail.
        // Program output may echo the input, so only the failure kind is kept.
        CaseReport {
            passed,
            input: HIDDEN.to_string(),
            expected_output: HIDDEN.to_string(),
            actual_output: if passed { HIDDEN } else { INCORRECT }.to_string(),
            is_hidden: true,
            error: kind.map(str::to_string),
        }
    } else {
        CaseReport {
            passed,
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output: actual,
            is_hidden: false,
            error,
        }
    }
}

/// Grade given code against all test cases, one execution per case
pub async fn grade(
    executor: &dyn Executor,
    lang: &Language,
    code: &str,
    cases: &[TestCase],
) -> Result<Grade, Error> {
    if cases.is_empty() {
        return Err(Error::new(
            Reason::InvalidState,
            "Problem has no test cases.".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        let outcome = executor.execute(lang, code, &case.input).await;
        log::debug!(target: "judge", "Case {}: {:?}", case.id, outcome);
        results.push(check(case, outcome));
    }

    let passed = results.iter().all(|r| r.passed);
    log::info!(
        target: "judge",
        "{} of {} cases passed",
        results.iter().filter(|r| r.passed).count(),
        results.len()
    );
    Ok(Grade { passed, results })
}
