use std::collections::HashMap;

use trace_format::TraceRecord;

use crate::config::{ConfigError, TrackConfig};
use crate::tree::TrackType;

/// Thread-id to track-type mapping, primed once before a processing pass and
/// immutable thereafter.
#[derive(Debug, Clone, Default)]
pub struct ThreadRoles {
    roles: HashMap<u32, TrackType>,
}

impl ThreadRoles {
    pub fn from_config(config: &TrackConfig) -> Result<Self, ConfigError> {
        let mut roles = HashMap::new();
        for &tid in &config.ui_threads {
            roles.insert(tid, TrackType::Ui);
        }
        for &tid in &config.raster_threads {
            if roles.insert(tid, TrackType::Raster) == Some(TrackType::Ui) {
                return Err(ConfigError::ConflictingRole(tid));
            }
        }
        Ok(ThreadRoles { roles })
    }

    /// Track role for a thread id; unmapped ids are `Unknown` and never
    /// merge into the UI or raster tracks.
    pub fn role(&self, tid: u32) -> TrackType {
        self.roles.get(&tid).copied().unwrap_or(TrackType::Unknown)
    }
}

/// Total classification of a record onto its logical track. Async-style
/// records classify `Async` regardless of thread; everything else follows
/// the primed thread role.
pub fn classify(record: &TraceRecord, roles: &ThreadRoles) -> TrackType {
    if record.ph.is_async() {
        return TrackType::Async;
    }
    roles.role(record.tid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use trace_format::{Phase, TraceRecord};

    fn roles() -> ThreadRoles {
        ThreadRoles::from_config(&TrackConfig {
            ui_threads: vec![1],
            raster_threads: vec![2],
        })
        .unwrap()
    }

    fn record(ph: Phase, tid: u32) -> TraceRecord {
        TraceRecord::builder()
            .name("event")
            .ph(ph)
            .ts(100)
            .pid(1)
            .tid(tid)
            .build()
    }

    #[rstest]
    #[case(Phase::Begin, 1, TrackType::Ui)]
    #[case(Phase::End, 2, TrackType::Raster)]
    #[case(Phase::Complete, 99, TrackType::Unknown)]
    #[case(Phase::AsyncBegin, 1, TrackType::Async)]
    #[case(Phase::AsyncEnd, 99, TrackType::Async)]
    fn test_classify(#[case] ph: Phase, #[case] tid: u32, #[case] expected: TrackType) {
        assert_eq!(classify(&record(ph, tid), &roles()), expected);
    }

    #[rstest]
    fn test_conflicting_role_rejected() {
        let config = TrackConfig {
            ui_threads: vec![1, 3],
            raster_threads: vec![3],
        };
        assert!(matches!(
            ThreadRoles::from_config(&config),
            Err(ConfigError::ConflictingRole(3))
        ));
    }
}
