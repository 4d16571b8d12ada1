//! Funding direction classifier. Display only; never feeds the entry or exit
//! rules.

use crate::types::PositionSide;

/// `true` when the position receives funding: longs when the rate is negative,
/// shorts when it is positive.
pub fn is_funding_favorable(side: PositionSide, funding_rate: f64) -> bool {
    match side {
        PositionSide::Long => funding_rate < 0.0,
        PositionSide::Short => funding_rate > 0.0,
    }
}

/// Short label used in log lines and notifications.
pub fn funding_label(side: PositionSide, funding_rate: f64) -> &'static str {
    if funding_rate == 0.0 {
        "neutral"
    } else if is_funding_favorable(side, funding_rate) {
        "receiving"
    } else {
        "paying"
    }
}
