//! `HideField` and `HideSection` effects: UI hints, never data changes

use lancet_core::UiHint;

use super::ApplyReport;

pub(super) fn field(name: &str, report: &mut ApplyReport) {
    report.hints.push(UiHint::HideField {
        field: name.to_owned(),
    });
}

pub(super) fn section(name: &str, report: &mut ApplyReport) {
    report.hints.push(UiHint::HideSection {
        section: name.to_owned(),
    });
}
