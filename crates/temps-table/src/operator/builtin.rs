//! Builtin operators and operator sets

use super::{Operator, OperatorCatalog};
use crate::types::FilterArity;
use chrono::{Duration, NaiveDateTime};
use tracing::error;

pub const BUILTIN_NAMESPACE: &str = "builtin";

pub const EQ: &str = "builtin.EQ";
pub const GT: &str = "builtin.GT";
pub const LT: &str = "builtin.LT";
pub const GE: &str = "builtin.GE";
pub const LE: &str = "builtin.LE";
pub const NE: &str = "builtin.NE";
pub const CTN: &str = "builtin.CTN";
pub const LCTN: &str = "builtin.LCTN";
pub const RCTN: &str = "builtin.RCTN";
pub const NCTN: &str = "builtin.NCTN";
pub const IN: &str = "builtin.IN";
pub const NIN: &str = "builtin.NIN";
pub const ISN: &str = "builtin.ISN";
pub const ISNN: &str = "builtin.ISNN";
pub const TODAY: &str = "builtin.TODAY";
pub const YEST: &str = "builtin.YEST";
pub const TWEEK: &str = "builtin.TWEEK";
pub const L1MONTH: &str = "builtin.L1MONTH";
pub const L3MONTH: &str = "builtin.L3MONTH";

pub const SINT: &str = "builtin.SINT";
pub const SBOOL: &str = "builtin.SBOOL";
pub const SOPT: &str = "builtin.SOPT";
pub const SDOUBLE: &str = "builtin.SDOUBLE";
pub const SSTR: &str = "builtin.SSTR";
pub const SNULLABLE: &str = "builtin.SNULLABLE";
pub const STIME: &str = "builtin.STIME";
pub const SDATE: &str = "builtin.SDATE";

const OPERATORS: &[(&str, &str, FilterArity)] = &[
    (EQ, "equal", FilterArity::Single),
    (GT, "greater than", FilterArity::Single),
    (LT, "less than", FilterArity::Single),
    (GE, "greater or equal", FilterArity::Single),
    (LE, "less or equal", FilterArity::Single),
    (NE, "not equal", FilterArity::Single),
    (CTN, "contains", FilterArity::Single),
    (LCTN, "starts with", FilterArity::Single),
    (RCTN, "ends with", FilterArity::Single),
    (NCTN, "not contains", FilterArity::Single),
    (IN, "in", FilterArity::Multiple),
    (NIN, "not in", FilterArity::Multiple),
    (ISN, "is null", FilterArity::None),
    (ISNN, "is not null", FilterArity::None),
    (TODAY, "today", FilterArity::None),
    (YEST, "yesterday", FilterArity::None),
    (TWEEK, "last week", FilterArity::None),
    (L1MONTH, "last month", FilterArity::None),
    (L3MONTH, "last three months", FilterArity::None),
];

const SETS: &[(&str, &str, &[&str])] = &[
    (SINT, "integer filters", &[EQ, GT, LT, GE, LE, NE, IN, NIN]),
    (SBOOL, "boolean filters", &[EQ]),
    (SOPT, "option filters", &[EQ, NE, IN, NIN]),
    (SDOUBLE, "double filters", &[EQ, GT, LT, GE, LE, NE, IN, NIN]),
    (
        SSTR,
        "string filters",
        &[CTN, EQ, GT, LT, GE, LE, NE, LCTN, RCTN, NCTN, IN, NIN],
    ),
    (SNULLABLE, "nullable filters", &[ISN, ISNN]),
    (
        STIME,
        "time filters",
        &[EQ, GT, LT, GE, LE, NE, TODAY, YEST, TWEEK, L1MONTH, L3MONTH],
    ),
    (SDATE, "date filters", &[EQ, GT, LT, GE, LE, NE, TODAY, YEST]),
];

/// Install the builtin operators and sets into a catalog.
///
/// Installing twice is a no-op apart from an error log per duplicate.
pub fn install(catalog: &OperatorCatalog) {
    for (id, name, arity) in OPERATORS {
        if let Err(e) = catalog.register_builtin_operator(Operator::new(*id, *name, *arity)) {
            error!("Failed to install builtin operator {}: {}", id, e);
        }
    }
    for (id, name, members) in SETS {
        if let Err(e) = catalog.register_builtin_set(id, name, members) {
            error!("Failed to install builtin operator set {}: {}", id, e);
        }
    }
}

/// Half-open `[start, end)` range covered by a relative time operator,
/// computed from `now` in local time.
pub fn relative_range(operator_id: &str, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let today = now.date().and_hms_opt(0, 0, 0)?;
    let tomorrow = today + Duration::days(1);
    match operator_id {
        TODAY => Some((today, tomorrow)),
        YEST => Some((today - Duration::days(1), today)),
        TWEEK => Some((today - Duration::days(7), tomorrow)),
        L1MONTH => Some((today - Duration::days(30), tomorrow)),
        L3MONTH => Some((today - Duration::days(90), tomorrow)),
        _ => None,
    }
}

/// Current local time as used by the relative time operators
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
