use serde::{Deserialize, Serialize};

use crate::protocols::common::{BoundsError, ByteReader};
use crate::protocols::symbols::{K28_0, K28_1, K28_3, K28_7};

use super::layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TsKind {
    Ts1,
    Ts2,
}

/// Data Rate Identifier symbol of a TS1/TS2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRate {
    pub raw: u8,
    pub speed_change: bool,
    pub autonomous_change: bool,
    pub link_speeds: u8,
    pub flit_mode: bool,
}

impl DataRate {
    pub fn link_speeds_name(&self) -> Option<&'static str> {
        match self.link_speeds {
            0b00001 => Some("Only 2.5 GT/s"),
            0b00011 => Some("Up to 5.0 GT/s"),
            0b00111 => Some("Up to 8.0 GT/s"),
            0b01111 => Some("Up to 16.0 GT/s"),
            0b11111 => Some("Up to 32.0 GT/s"),
            _ => None,
        }
    }
}

/// Training Control symbol of a TS1/TS2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingControl {
    pub raw: u8,
    /// Enhanced Link Behavior Control.
    pub elbc: u8,
    pub transmit_modified_compliance: bool,
    pub compliance_receive: bool,
    pub disable_scrambling: bool,
    pub loopback: bool,
    pub disable_link: bool,
    pub hot_reset: bool,
}

impl TrainingControl {
    pub fn elbc_name(&self) -> &'static str {
        match self.elbc {
            0 => "Full Equalization Required",
            1 => "Equalization Bypass to Highest NRZ Rate Support",
            2 => "No Equalization Needed",
            _ => "Modified TS1/TS2 Ordered Sets supported",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingFields {
    pub link_number: u8,
    pub lane_number: u8,
    pub n_fts: u8,
    pub data_rate: DataRate,
    pub training_control: TrainingControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSequence {
    pub kind: TsKind,
    /// Identifier symbols seen with lane polarity inverted.
    pub inverted: bool,
    /// Only decoded when the lane is not inverted.
    pub fields: Option<TrainingFields>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "set", rename_all = "snake_case")]
pub enum OrderedSet {
    Skp,
    FastTrainingSequence,
    ElectricalIdle,
    ElectricalIdleExit,
    TrainingSequence(TrainingSequence),
    Unknown,
}

impl OrderedSet {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Skp => "SKP Ordered Set",
            Self::FastTrainingSequence => "Fast Training Sequence",
            Self::ElectricalIdle => "Electrical Idle Ordered Set",
            Self::ElectricalIdleExit => "Electrical Idle Exit Ordered Set",
            Self::TrainingSequence(ts) => match (ts.kind, ts.inverted) {
                (TsKind::Ts1, false) => "TS1 Ordered Set",
                (TsKind::Ts2, false) => "TS2 Ordered Set",
                (TsKind::Ts1, true) => "TS1 Ordered Set (Lane polarity inversion)",
                (TsKind::Ts2, true) => "TS2 Ordered Set (Lane polarity inversion)",
            },
            Self::Unknown => "Unknown Ordered Set",
        }
    }
}

/// Classify the symbols following a COM. Short input never errors; it just
/// fails to match the longer patterns.
pub(super) fn decode_ordered_set(reader: &ByteReader<'_>) -> Result<OrderedSet, BoundsError> {
    let at = |offset| reader.peek_u8(layout::OS_TYPE_OFFSET + offset);
    let repeated = |symbol| (0..3).all(|i| at(i) == Some(symbol));

    if at(0) == Some(K28_0) {
        return Ok(OrderedSet::Skp);
    }
    if repeated(K28_1) {
        return Ok(OrderedSet::FastTrainingSequence);
    }
    if repeated(K28_3) {
        return Ok(OrderedSet::ElectricalIdle);
    }
    if at(0) == Some(K28_7) {
        return Ok(OrderedSet::ElectricalIdleExit);
    }

    let (kind, inverted) = match reader.peek_u8(layout::TS_IDENTIFIER_OFFSET) {
        Some(layout::TS1_IDENTIFIER) => (TsKind::Ts1, false),
        Some(layout::TS2_IDENTIFIER) => (TsKind::Ts2, false),
        Some(layout::TS1_IDENTIFIER_INVERTED) => (TsKind::Ts1, true),
        Some(layout::TS2_IDENTIFIER_INVERTED) => (TsKind::Ts2, true),
        _ => return Ok(OrderedSet::Unknown),
    };
    reader.require_len(layout::TS_LEN)?;

    let fields = if inverted {
        None
    } else {
        Some(TrainingFields {
            link_number: reader.read_u8(layout::TS_LINK_NUMBER_OFFSET)?,
            lane_number: reader.read_u8(layout::TS_LANE_NUMBER_OFFSET)?,
            n_fts: reader.read_u8(layout::TS_N_FTS_OFFSET)?,
            data_rate: DataRate {
                raw: reader.read_field(layout::TS_DATA_RATE)? as u8,
                speed_change: reader.read_flag(layout::TS_DATA_RATE_SPEED_CHANGE)?,
                autonomous_change: reader.read_flag(layout::TS_DATA_RATE_AUTONOMOUS_CHANGE)?,
                link_speeds: reader.read_field(layout::TS_DATA_RATE_LINK_SPEEDS)? as u8,
                flit_mode: reader.read_flag(layout::TS_DATA_RATE_FLIT_MODE)?,
            },
            training_control: TrainingControl {
                raw: reader.read_field(layout::TS_TRAINING_CONTROL)? as u8,
                elbc: reader.read_field(layout::TS_TC_ELBC)? as u8,
                transmit_modified_compliance: reader.read_flag(layout::TS_TC_TMCPL)?,
                compliance_receive: reader.read_flag(layout::TS_TC_COMPLIANCE_RECEIVE)?,
                disable_scrambling: reader.read_flag(layout::TS_TC_DISABLE_SCRAMBLING)?,
                loopback: reader.read_flag(layout::TS_TC_LOOPBACK)?,
                disable_link: reader.read_flag(layout::TS_TC_DISABLE_LINK)?,
                hot_reset: reader.read_flag(layout::TS_TC_HOT_RESET)?,
            },
        })
    };

    Ok(OrderedSet::TrainingSequence(TrainingSequence {
        kind,
        inverted,
        fields,
    }))
}
