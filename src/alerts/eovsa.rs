//! EOVSA radio flare-flag indicator
//!
//! Looks at the trailing window of the EOVSA table: the flag is `current`
//! when the newest row is flagged and `recent` when some earlier row in the
//! window is flagged but the newest is not.

use chrono::{DateTime, Utc};

use crate::types::{AlertSnapshot, EovsaSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EovsaActivity {
    Quiet,
    /// Flagged earlier in the window; `since` is the first flagged row.
    Recent { since: DateTime<Utc> },
    /// Newest row is flagged; `since` is the first flagged row.
    Current { since: DateTime<Utc> },
}

impl EovsaActivity {
    pub fn snapshot(&self) -> AlertSnapshot {
        AlertSnapshot::new(vec![
            ("eovsa_flare_current".to_string(), matches!(self, Self::Current { .. })),
            ("eovsa_flare_recent".to_string(), matches!(self, Self::Recent { .. })),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EovsaIndicator {
    window: usize,
}

impl EovsaIndicator {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn evaluate(&self, samples: &[EovsaSample]) -> EovsaActivity {
        let start = samples.len().saturating_sub(self.window);
        let recent = &samples[start..];
        let Some(first) = recent.iter().find(|s| s.flare_flag) else {
            return EovsaActivity::Quiet;
        };
        let since = first.time_tag;
        match recent.last() {
            Some(last) if last.flare_flag => EovsaActivity::Current { since },
            _ => EovsaActivity::Recent { since },
        }
    }
}
