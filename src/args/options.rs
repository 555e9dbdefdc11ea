use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Entry point options shared by every generated program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryOptions {
    pub workflow_run_attempt_id: Option<i64>,
    pub sample_id: Option<i64>,
    pub dry_run: bool,
    /// None when `--validate` wasn't given
    pub validate: Option<bool>,
    pub persist_file_data: bool,
    pub serialize: Option<PathBuf>,
}

impl EntryOptions {
    /// Output validation runs unless explicitly disabled
    pub fn validate_outputs(&self) -> bool {
        self.validate.unwrap_or(true)
    }
}

/// Only the literal text "false" (any case) disables validation, anything else enables it
pub fn parse_validate(text: &str) -> bool {
    !text.eq_ignore_ascii_case("false")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryFlag {
    WorkflowRunAttemptId,
    SampleId,
    DryRun,
    Validate,
    PersistFileData,
    Serialize,
    Help,
}

impl EntryFlag {
    pub(crate) fn lookup(token: &str) -> Option<EntryFlag> {
        match token {
            "--workflowRunAttemptId" => Some(EntryFlag::WorkflowRunAttemptId),
            "--sampleId" => Some(EntryFlag::SampleId),
            "--dryRun" => Some(EntryFlag::DryRun),
            "--validate" => Some(EntryFlag::Validate),
            "--persistFileData" => Some(EntryFlag::PersistFileData),
            "--serialize" => Some(EntryFlag::Serialize),
            "--help" | "-?" => Some(EntryFlag::Help),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::parameter::RESERVED_FLAGS;

    #[test]
    fn validate_is_tri_state() {
        assert!(EntryOptions::default().validate_outputs());
        assert!(!parse_validate("false"));
        assert!(!parse_validate("FALSE"));
        assert!(!parse_validate("False"));
        assert!(parse_validate("true"));
        assert!(parse_validate("no"));
        assert!(parse_validate("0"));
    }

    #[test]
    fn every_reserved_flag_is_an_entry_flag() {
        for flag in RESERVED_FLAGS {
            assert!(EntryFlag::lookup(flag).is_some(), "{flag} isn't handled");
        }
    }
}
