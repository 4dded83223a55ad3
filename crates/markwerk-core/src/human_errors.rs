// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for exam administrators.
//
// Every pipeline error is mapped to plain English with a clear suggestion.
// The severity tells a batch driver whether asking for a new photo can help.

use crate::error::MarkwerkError;

/// Severity of an error from the administrator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The photo itself is the problem; a clearer photo may succeed.
    RetakePhoto,
    /// The batch setup (layout, answer key, config) must be corrected.
    FixSetup,
    /// Storage or system failure unrelated to the sheet.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the administrator should try.
    pub suggestion: String,
    /// Whether resubmitting a new photo of the same sheet can succeed.
    pub resubmit: bool,
    pub severity: Severity,
}

/// Convert a `MarkwerkError` into a `HumanError`.
pub fn humanize_error(err: &MarkwerkError) -> HumanError {
    match err {
        MarkwerkError::Decode(_) => HumanError {
            message: "This file is not a readable image.".into(),
            suggestion: "Save the scan or photo as JPEG or PNG and add it again.".into(),
            resubmit: true,
            severity: Severity::RetakePhoto,
        },

        MarkwerkError::Geometry(detail) => HumanError {
            message: "We couldn't find the edges of the answer sheet.".into(),
            suggestion: format!(
                "Photograph the whole sheet flat on a darker surface, with all four corners visible. ({detail})"
            ),
            resubmit: true,
            severity: Severity::RetakePhoto,
        },

        MarkwerkError::Layout(detail) => HumanError {
            message: "The bubble grid settings don't fit this sheet.".into(),
            suggestion: format!("Check the number of questions and options per question. ({detail})"),
            resubmit: false,
            severity: Severity::FixSetup,
        },

        MarkwerkError::KeyFormat(detail) => HumanError {
            message: "The answer key is incomplete or malformed.".into(),
            suggestion: format!(
                "Every question needs at least one correct option within the option range. ({detail})"
            ),
            resubmit: false,
            severity: Severity::FixSetup,
        },

        MarkwerkError::Config(detail) => HumanError {
            message: "The scoring settings are invalid.".into(),
            suggestion: format!("Fix the configuration file or regenerate it with `init-config`. ({detail})"),
            resubmit: false,
            severity: Severity::FixSetup,
        },

        MarkwerkError::Database(_) => HumanError {
            message: "Results could not be saved.".into(),
            suggestion: "Check that the results database is writable and not open elsewhere.".into(),
            resubmit: false,
            severity: Severity::Permanent,
        },

        MarkwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "A file could not be found.".into(),
                suggestion: format!("Check the path and try again. ({io_err})"),
                resubmit: true,
                severity: Severity::FixSetup,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "A file could not be opened.".into(),
                suggestion: "Check the file permissions and try again.".into(),
                resubmit: false,
                severity: Severity::FixSetup,
            },
            _ => HumanError {
                message: "Reading or writing a file failed.".into(),
                suggestion: format!("Try again. ({io_err})"),
                resubmit: false,
                severity: Severity::Permanent,
            },
        },

        MarkwerkError::Serialization(_) => HumanError {
            message: "A data file has an unexpected format.".into(),
            suggestion: "Check that JSON files were not edited by hand incorrectly.".into(),
            resubmit: false,
            severity: Severity::FixSetup,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_asks_for_new_photo() {
        let human = humanize_error(&MarkwerkError::Geometry("no quadrilateral".into()));
        assert_eq!(human.severity, Severity::RetakePhoto);
        assert!(human.resubmit);
        assert!(human.suggestion.contains("no quadrilateral"));
    }

    #[test]
    fn key_format_is_setup_problem() {
        let human = humanize_error(&MarkwerkError::KeyFormat("Q5 missing".into()));
        assert_eq!(human.severity, Severity::FixSetup);
        assert!(!human.resubmit);
    }

    #[test]
    fn missing_file_is_setup_problem() {
        let err = MarkwerkError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(humanize_error(&err).severity, Severity::FixSetup);
    }

    #[test]
    fn database_is_permanent() {
        let human = humanize_error(&MarkwerkError::Database("locked".into()));
        assert_eq!(human.severity, Severity::Permanent);
    }
}
