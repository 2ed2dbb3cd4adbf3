//! Mapping from the logical line selector to the physical DTR/RTS pin.
//!
//! Everything above this module talks about Primary/Secondary only.

use serde::{Deserialize, Serialize};

use crate::domain::{ControlLine, PttResult, PttType};
use crate::share::PortHandle;

/// Which of the two hardware control lines carries the key signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineSelector {
    /// DTR
    #[default]
    Primary,
    /// RTS
    Secondary,
}

impl LineSelector {
    pub fn line(self) -> ControlLine {
        match self {
            LineSelector::Primary => ControlLine::Dtr,
            LineSelector::Secondary => ControlLine::Rts,
        }
    }

    /// Selector for a configured PTT type; `None` has no line to drive.
    pub fn for_ptt_type(ptt_type: PttType) -> Option<Self> {
        match ptt_type {
            PttType::None => None,
            PttType::Dtr => Some(LineSelector::Primary),
            PttType::Rts => Some(LineSelector::Secondary),
        }
    }
}

/// Drive the selected line on `handle`.
pub fn resolve(selector: LineSelector, handle: &PortHandle, active: bool) -> PttResult<()> {
    handle.set_control_line(selector.line(), active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockSerial;
    use crate::domain::PortId;

    #[test]
    fn primary_is_dtr_secondary_is_rts() {
        assert_eq!(LineSelector::Primary.line(), ControlLine::Dtr);
        assert_eq!(LineSelector::Secondary.line(), ControlLine::Rts);
        assert_eq!(LineSelector::default(), LineSelector::Primary);
    }

    #[test]
    fn ptt_type_maps_to_selector() {
        assert_eq!(LineSelector::for_ptt_type(PttType::Dtr), Some(LineSelector::Primary));
        assert_eq!(LineSelector::for_ptt_type(PttType::Rts), Some(LineSelector::Secondary));
        assert_eq!(LineSelector::for_ptt_type(PttType::None), None);
    }

    #[test]
    fn resolve_touches_only_the_selected_line() {
        let mock = MockSerial::with_ports(["COM3"]);
        let handle = PortHandle::open(&mock, &PortId::new("COM3")).unwrap();
        resolve(LineSelector::Secondary, &handle, true).unwrap();
        assert!(mock.line_state("COM3", ControlLine::Rts));
        assert!(!mock.line_state("COM3", ControlLine::Dtr));
    }
}
