//! Display ordering for classes and group members.
//!
//! Report ordering is visible to users, so the table below is the single place class priority
//! is defined. Class names are matched by prefix; the first matching row wins.

use crate::model::AssignedMember;
use crate::step::AssignmentStep;
use std::cmp::Ordering;

/// `(class-name prefix, rank)`; lower ranks sort first.
pub const CLASS_PRIORITY: &[(&str, u8)] = &[
    ("初級", 0),
    ("中級", 1),
    ("高級", 2),
    ("進階", 3),
    ("研經", 4),
    ("講師", 5),
];

/// Rank given to class names that match no prefix in [`CLASS_PRIORITY`].
pub const UNRANKED: u8 = u8::MAX;

pub fn class_rank(class_name: &str) -> u8 {
    let name = class_name.trim();
    CLASS_PRIORITY
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|(_, rank)| *rank)
        .unwrap_or(UNRANKED)
}

/// Compares two class names by priority, then by name.
///
/// When `senior` is set the comparison is inverted: among seniors the more advanced class comes
/// first.
pub fn class_name_ranking(a: &str, b: &str, senior: bool) -> Ordering {
    let ord = class_rank(a).cmp(&class_rank(b)).then_with(|| a.cmp(b));
    if senior { ord.reverse() } else { ord }
}

/// Roster display order: continuing seniors first, then members by their previous class
/// (newcomers last), then by id.
pub fn member_ordering(a: &AssignedMember, b: &AssignedMember) -> Ordering {
    let a_senior = a.step == AssignmentStep::SeniorContinuing;
    let b_senior = b.step == AssignmentStep::SeniorContinuing;
    b_senior
        .cmp(&a_senior)
        .then_with(|| {
            let a_prev = a.candidate.previous.as_ref().map(|p| p.class_name.as_str());
            let b_prev = b.candidate.previous.as_ref().map(|p| p.class_name.as_str());
            match (a_prev, b_prev) {
                (Some(x), Some(y)) => class_name_ranking(x, y, a_senior && b_senior),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        })
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}
