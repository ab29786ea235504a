//! CDR field schema: semantic field names bound to column ordinals.
//!
//! The column layout is an external, versioned contract. Lookup is a direct
//! index into a constant table (one entry per [`FieldName`]). A layout change
//! is a new [`SchemaVersion`], never an edit to an existing one.

/// Lines with fewer columns than this are not call-leg rows.
pub const MIN_FIELD_COUNT: usize = 50;

/// Semantic names of the columns the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    RecordType,
    ClusterId,
    CallId,
    Origination,
    OrigIp,
    CallingNumber,
    OrigCause,
    DestIp,
    OriginalCalledNumber,
    FinalCalledNumber,
    DestCause,
    Connect,
    Disconnect,
    LastRedirectDn,
    OriginalCalledPartition,
    CallingPartition,
    FinalCalledPartition,
    LastRedirectPartition,
    Duration,
    OrigDevice,
    DestDevice,
    HuntPilotDn,
    HuntPilotPartition,
}

impl FieldName {
    pub const COUNT: usize = 23;

    pub const ALL: [FieldName; FieldName::COUNT] = [
        FieldName::RecordType,
        FieldName::ClusterId,
        FieldName::CallId,
        FieldName::Origination,
        FieldName::OrigIp,
        FieldName::CallingNumber,
        FieldName::OrigCause,
        FieldName::DestIp,
        FieldName::OriginalCalledNumber,
        FieldName::FinalCalledNumber,
        FieldName::DestCause,
        FieldName::Connect,
        FieldName::Disconnect,
        FieldName::LastRedirectDn,
        FieldName::OriginalCalledPartition,
        FieldName::CallingPartition,
        FieldName::FinalCalledPartition,
        FieldName::LastRedirectPartition,
        FieldName::Duration,
        FieldName::OrigDevice,
        FieldName::DestDevice,
        FieldName::HuntPilotDn,
        FieldName::HuntPilotPartition,
    ];

    /// Column header used by CUCM for this field.
    pub fn column_name(self) -> &'static str {
        match self {
            FieldName::RecordType => "cdrRecordType",
            FieldName::ClusterId => "globalCallID_callManagerId",
            FieldName::CallId => "globalCallID_callId",
            FieldName::Origination => "dateTimeOrigination",
            FieldName::OrigIp => "origIpAddr",
            FieldName::CallingNumber => "callingPartyNumber",
            FieldName::OrigCause => "origCause_value",
            FieldName::DestIp => "destIpAddr",
            FieldName::OriginalCalledNumber => "originalCalledPartyNumber",
            FieldName::FinalCalledNumber => "finalCalledPartyNumber",
            FieldName::DestCause => "destCause_value",
            FieldName::Connect => "dateTimeConnect",
            FieldName::Disconnect => "dateTimeDisconnect",
            FieldName::LastRedirectDn => "lastRedirectDn",
            FieldName::OriginalCalledPartition => "originalCalledPartyNumberPartition",
            FieldName::CallingPartition => "callingPartyNumberPartition",
            FieldName::FinalCalledPartition => "finalCalledPartyNumberPartition",
            FieldName::LastRedirectPartition => "lastRedirectDnPartition",
            FieldName::Duration => "duration",
            FieldName::OrigDevice => "origDeviceName",
            FieldName::DestDevice => "destDeviceName",
            FieldName::HuntPilotDn => "huntPilotDN",
            FieldName::HuntPilotPartition => "huntPilotPartition",
        }
    }
}

/// Ordinals for the V1 layout, indexed by `FieldName as usize`.
const V1_ORDINALS: [usize; FieldName::COUNT] = [
    0,   // RecordType
    1,   // ClusterId
    2,   // CallId
    4,   // Origination
    7,   // OrigIp
    8,   // CallingNumber
    11,  // OrigCause
    28,  // DestIp
    29,  // OriginalCalledNumber
    30,  // FinalCalledNumber
    33,  // DestCause
    47,  // Connect
    48,  // Disconnect
    49,  // LastRedirectDn
    51,  // OriginalCalledPartition
    52,  // CallingPartition
    53,  // FinalCalledPartition
    54,  // LastRedirectPartition
    55,  // Duration
    56,  // OrigDevice
    57,  // DestDevice
    101, // HuntPilotDn
    102, // HuntPilotPartition
];

/// A versioned column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaVersion {
    #[default]
    V1,
}

impl SchemaVersion {
    /// Column ordinal bound to `name`, or `None` when this version does not
    /// carry the field.
    pub fn ordinal(self, name: FieldName) -> Option<usize> {
        match self {
            SchemaVersion::V1 => Some(V1_ORDINALS[name as usize]),
        }
    }

    /// Trimmed value of `name`; empty when the row is too short.
    pub fn field_value<S: AsRef<str>>(self, fields: &[S], name: FieldName) -> &str {
        self.ordinal(name)
            .and_then(|idx| fields.get(idx))
            .map(|value| value.as_ref().trim())
            .unwrap_or("")
    }

    /// Integer value of `name`, or `default` when empty or unparsable.
    pub fn field_value_as_int<S: AsRef<str>>(
        self,
        fields: &[S],
        name: FieldName,
        default: i64,
    ) -> i64 {
        let raw = self.field_value(fields, name);
        if raw.is_empty() {
            return default;
        }
        raw.parse().unwrap_or(default)
    }
}

/// [`SchemaVersion::field_value`] on the default layout.
pub fn field_value<S: AsRef<str>>(fields: &[S], name: FieldName) -> &str {
    SchemaVersion::default().field_value(fields, name)
}

/// [`SchemaVersion::field_value_as_int`] on the default layout.
pub fn field_value_as_int<S: AsRef<str>>(fields: &[S], name: FieldName, default: i64) -> i64 {
    SchemaVersion::default().field_value_as_int(fields, name, default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(len: usize) -> Vec<String> {
        vec![String::new(); len]
    }

    #[test]
    fn test_all_is_in_discriminant_order() {
        for (idx, name) in FieldName::ALL.iter().enumerate() {
            assert_eq!(*name as usize, idx);
        }
    }

    #[test]
    fn test_v1_ordinals() {
        let v1 = SchemaVersion::V1;
        assert_eq!(v1.ordinal(FieldName::RecordType), Some(0));
        assert_eq!(v1.ordinal(FieldName::Origination), Some(4));
        assert_eq!(v1.ordinal(FieldName::DestCause), Some(33));
        assert_eq!(v1.ordinal(FieldName::Duration), Some(55));
        assert_eq!(v1.ordinal(FieldName::HuntPilotPartition), Some(102));
    }

    #[test]
    fn test_v1_ordinals_are_unique() {
        let mut seen = V1_ORDINALS.to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), FieldName::COUNT);
    }

    #[test]
    fn test_field_value_trims() {
        let mut fields = row(60);
        fields[8] = "  1001 ".to_string();
        assert_eq!(field_value(&fields, FieldName::CallingNumber), "1001");
    }

    #[test]
    fn test_field_value_out_of_range_is_empty() {
        let fields = row(60);
        assert_eq!(field_value(&fields, FieldName::HuntPilotDn), "");
        let empty: [&str; 0] = [];
        assert_eq!(field_value(&empty, FieldName::RecordType), "");
    }

    #[test]
    fn test_field_value_as_int() {
        let mut fields = row(60);
        fields[55] = "42".to_string();
        fields[33] = "abc".to_string();
        assert_eq!(field_value_as_int(&fields, FieldName::Duration, 0), 42);
        assert_eq!(field_value_as_int(&fields, FieldName::DestCause, -1), -1);
        assert_eq!(field_value_as_int(&fields, FieldName::OrigCause, 7), 7);
        assert_eq!(field_value_as_int(&fields, FieldName::HuntPilotDn, 3), 3);
    }

    #[test]
    fn test_column_names() {
        assert_eq!(FieldName::Origination.column_name(), "dateTimeOrigination");
        assert_eq!(FieldName::DestCause.column_name(), "destCause_value");
    }
}
