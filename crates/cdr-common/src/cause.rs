//! Call-signaling cause codes.
//!
//! CUCM reports disconnect reasons as Q.931 cause values, plus a handful of
//! Cisco-specific values above the Q.931 range. The table below is the
//! static code-to-text mapping used for failure reasons in reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Codes that represent normal completion. Any other code on a zero-duration
/// call leg marks it as failed.
pub const SUCCESS_CODES: [u32; 3] = [0, 16, 393_216];

/// Codes the CUCM documentation lists as explicit failures.
///
/// Informational only: classification does not require membership here, so a
/// code absent from both this list and [`SUCCESS_CODES`] still counts as a
/// failure when the call never connected.
const LISTED_FAILURE_CODES: [u32; 43] = [
    1, 2, 3, 17, 18, 19, 20, 21, 22, 27, 28, 29, 31, 34, 38, 41, 42, 43, 44, 46, 47, 49, 50, 52,
    54, 57, 58, 63, 65, 66, 69, 79, 88, 95, 96, 97, 98, 99, 100, 101, 102, 111, 127,
];

/// Sorted by code for binary search.
const CAUSE_TABLE: &[(u32, &str)] = &[
    (0, "No error"),
    (1, "Unallocated/unassigned number"),
    (2, "No route to specified transit network"),
    (3, "No route to destination"),
    (4, "Send special information tone"),
    (5, "Misdialed trunk prefix"),
    (6, "Channel unacceptable"),
    (7, "Call awarded and being delivered"),
    (16, "Normal call clearing"),
    (17, "User busy"),
    (18, "No user responding"),
    (19, "No answer from user (user alerted)"),
    (20, "Subscriber absent"),
    (21, "Call rejected"),
    (22, "Number changed"),
    (23, "Redirection to new destination"),
    (25, "Exchange routing error"),
    (26, "Non-selected user clearing"),
    (27, "Destination out of order"),
    (28, "Invalid number format"),
    (29, "Facility rejected"),
    (30, "Response to STATUS ENQUIRY"),
    (31, "Normal, unspecified"),
    (34, "No circuit/channel available"),
    (38, "Network out of order"),
    (39, "Permanent frame mode connection out of service"),
    (40, "Permanent frame mode connection operational"),
    (41, "Temporary failure"),
    (42, "Switching equipment congestion"),
    (43, "Access information discarded"),
    (44, "Requested circuit/channel not available"),
    (46, "Precedence call blocked"),
    (47, "Resource unavailable, unspecified"),
    (49, "Quality of service not available"),
    (50, "Requested facility not subscribed"),
    (52, "Outgoing calls barred"),
    (54, "Incoming calls barred"),
    (57, "Bearer capability not authorized"),
    (58, "Bearer capability not presently available"),
    (62, "Inconsistency in designated outgoing access"),
    (63, "Service or option not available"),
    (65, "Bearer capability not implemented"),
    (66, "Channel type not implemented"),
    (69, "Requested facility not implemented"),
    (70, "Only restricted digital bearer capability available"),
    (79, "Service or option not implemented"),
    (81, "Invalid call reference value"),
    (82, "Identified channel does not exist"),
    (83, "Suspended call exists but call identity does not"),
    (84, "Call identity in use"),
    (85, "No call suspended"),
    (86, "Call having requested identity has been cleared"),
    (87, "User not member of CUG"),
    (88, "Incompatible destination"),
    (90, "Non-existent CUG"),
    (91, "Invalid transit network selection"),
    (95, "Invalid message, unspecified"),
    (96, "Mandatory IE missing"),
    (97, "Message type non-existent"),
    (98, "Message not compatible with call state"),
    (99, "IE non-existent or not implemented"),
    (100, "Invalid IE contents"),
    (101, "Message not compatible with call state"),
    (102, "Recovery on timer expiry"),
    (103, "Parameter non-existent or not implemented"),
    (110, "Message with unrecognized parameter discarded"),
    (111, "Protocol error, unspecified"),
    (127, "Interworking, unspecified"),
    (393_216, "Normal clearing (Cisco)"),
    (458_752, "Call rejected (Cisco)"),
];

/// A numeric disconnect cause value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CauseCode(pub u32);

impl CauseCode {
    /// The "no error" cause, used when a leg carries no cause value.
    pub const NONE: CauseCode = CauseCode(0);

    pub fn value(self) -> u32 {
        self.0
    }

    /// Whether this code denotes normal completion.
    pub fn is_success(self) -> bool {
        SUCCESS_CODES.contains(&self.0)
    }

    /// Whether the code appears in the documented failure list.
    pub fn is_listed_failure(self) -> bool {
        LISTED_FAILURE_CODES.contains(&self.0)
    }

    /// Table text for a known code.
    pub fn known_description(self) -> Option<&'static str> {
        CAUSE_TABLE
            .binary_search_by_key(&self.0, |(code, _)| *code)
            .ok()
            .map(|idx| CAUSE_TABLE[idx].1)
    }

    /// Human-readable reason, falling back to `Unknown cause code: <code>`.
    pub fn description(self) -> String {
        match self.known_description() {
            Some(text) => text.to_string(),
            None => format!("Unknown cause code: {}", self.0),
        }
    }
}

impl fmt::Display for CauseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CauseCode {
    fn from(code: u32) -> Self {
        CauseCode(code)
    }
}
