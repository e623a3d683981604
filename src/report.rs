// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Human-readable and JSON summaries of a dispatch.

use core::fmt;
use std::time::Duration;

use serde_json::{json, Value};

use crate::dispatch::DispatchResult;

/// Summary of one dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub variant: String,
    pub degree: usize,
    pub bands: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Builds the summary of `result`.
pub fn report(result: &DispatchResult) -> Report {
    Report {
        variant: result.variant.clone(),
        degree: result.degree,
        bands: result.bands,
        skipped: result.skipped,
        elapsed: result.elapsed,
    }
}

impl Report {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_micros() as f64 / 1e3
    }

    pub fn to_json(&self) -> Value {
        json!({
            "variant": self.variant,
            "degree": self.degree,
            "bands": self.bands,
            "skipped": self.skipped,
            "elapsed_ms": self.elapsed_ms(),
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Execution time {}: {:.3} ms (degree {}, {} bands, {} skipped)",
            self.variant,
            self.elapsed_ms(),
            self.degree,
            self.bands,
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> DispatchResult {
        DispatchResult {
            elapsed: Duration::from_micros(12_500),
            degree: 8,
            variant: "unrolled".to_owned(),
            bands: 6,
            skipped: 2,
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            report(&result()).to_string(),
            "Execution time unrolled: 12.500 ms (degree 8, 6 bands, 2 skipped)"
        );
    }

    #[test]
    fn test_json() {
        let value = report(&result()).to_json();
        assert_eq!(value["variant"], "unrolled");
        assert_eq!(value["degree"], 8);
        assert_eq!(value["bands"], 6);
        assert_eq!(value["skipped"], 2);
        assert_eq!(value["elapsed_ms"], 12.5);
    }
}
