use proptest::prelude::*;

use flowr_engine::adapters::{StructuredPayload, WorkerPayload};
use flowr_engine::config::Config;
use flowr_engine::orchestrator::types::{CapabilityClass, Outcome, Subtask, WorkerResult};
use flowr_engine::orchestrator::{merge, route};

/// Strategy: an acyclic subtask batch. Dependencies only point at earlier
/// sequence ids, which is exactly what the decomposer's validation admits.
fn acyclic_batch() -> impl Strategy<Value = Vec<Subtask>> {
    (1usize..8).prop_flat_map(|n| {
        let subtasks: Vec<_> = (1..=n as u32)
            .map(|id| {
                let deps = if id == 1 {
                    Just(Vec::new()).boxed()
                } else {
                    proptest::collection::vec(1..id, 0..(id as usize).min(3)).boxed()
                };
                (deps, proptest::bool::ANY).prop_map(move |(mut depends_on, structured)| {
                    depends_on.sort_unstable();
                    depends_on.dedup();
                    Subtask {
                        id,
                        capability: if structured {
                            CapabilityClass::StructuredOps
                        } else {
                            CapabilityClass::NaturalLanguage
                        },
                        description: format!("subtask {}", id),
                        depends_on,
                    }
                })
            })
            .collect();
        subtasks
    })
}

proptest! {
    /// Routing is a pure function: repeated calls on the same batch yield
    /// bit-identical plans.
    #[test]
    fn test_route_is_deterministic(subtasks in acyclic_batch()) {
        let first = route(&subtasks).expect("acyclic batch must route");
        for _ in 0..3 {
            let again = route(&subtasks).expect("acyclic batch must route");
            prop_assert_eq!(&again, &first);
        }
    }

    /// Wave numbers form a total order compatible with the dependency
    /// graph: every dependency sits in a strictly earlier wave.
    #[test]
    fn test_waves_respect_dependencies(subtasks in acyclic_batch()) {
        let plan = route(&subtasks).expect("acyclic batch must route");
        let wave_of = |id: u32| {
            plan.entries
                .iter()
                .find(|e| e.subtask_id == id)
                .expect("every subtask is planned")
                .wave
        };

        for subtask in &subtasks {
            for dep in &subtask.depends_on {
                prop_assert!(wave_of(*dep) < wave_of(subtask.id));
            }
        }

        // Entries are sorted by (wave, id)
        let keys: Vec<(u32, u32)> = plan.entries.iter().map(|e| (e.wave, e.subtask_id)).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        prop_assert_eq!(keys, sorted);
    }

    /// Merge preserves subtask sequence order for the successful payloads,
    /// no matter what order results arrive in or which outcomes occur.
    #[test]
    fn test_merge_preserves_sequence_order(
        subtasks in acyclic_batch(),
        outcome_seed in proptest::collection::vec(0u8..3, 8),
        shuffle_seed in any::<u64>(),
    ) {
        let mut results: Vec<WorkerResult> = subtasks
            .iter()
            .enumerate()
            .map(|(i, s)| match outcome_seed[i % outcome_seed.len()] {
                0 => WorkerResult::success(
                    s.id,
                    WorkerPayload::StructuredOps(StructuredPayload::default()),
                    10,
                ),
                1 => WorkerResult::failure(s.id, "rejected", 10),
                _ => WorkerResult::timeout(s.id, 10),
            })
            .collect();

        // Deterministic shuffle: completion order must not matter
        let len = results.len();
        if len > 1 {
            for i in 0..len {
                let j = (shuffle_seed as usize).wrapping_add(i * 7) % len;
                results.swap(i, j);
            }
        }

        let deliverable = merge(&subtasks, &results);

        let payload_ids: Vec<u32> = deliverable.payloads.iter().map(|e| e.subtask_id).collect();
        let mut sorted = payload_ids.clone();
        sorted.sort_unstable();
        prop_assert_eq!(&payload_ids, &sorted);

        // Status accounting matches the outcome mix
        let successes = results.iter().filter(|r| r.outcome == Outcome::Success).count();
        match deliverable.status {
            flowr_engine::orchestrator::DeliverableStatus::Complete => {
                prop_assert_eq!(successes, subtasks.len());
                prop_assert!(deliverable.note.is_none());
            }
            flowr_engine::orchestrator::DeliverableStatus::Partial => {
                prop_assert!(successes > 0 && successes < subtasks.len());
                prop_assert!(deliverable.note.is_some());
            }
            flowr_engine::orchestrator::DeliverableStatus::Failed => {
                prop_assert_eq!(successes, 0);
                prop_assert!(deliverable.note.is_some());
            }
        }
    }

    /// Merging the same inputs twice yields byte-identical deliverables.
    #[test]
    fn test_merge_is_idempotent(
        subtasks in acyclic_batch(),
        outcome_seed in proptest::collection::vec(0u8..3, 8),
    ) {
        let results: Vec<WorkerResult> = subtasks
            .iter()
            .enumerate()
            .map(|(i, s)| match outcome_seed[i % outcome_seed.len()] {
                0 => WorkerResult::success(
                    s.id,
                    WorkerPayload::StructuredOps(StructuredPayload::default()),
                    10,
                ),
                1 => WorkerResult::failure(s.id, "rejected", 10),
                _ => WorkerResult::timeout(s.id, 10),
            })
            .collect();

        let first = merge(&subtasks, &results);
        let second = merge(&subtasks, &results);
        prop_assert_eq!(
            serde_json::to_vec(&first).expect("serializable"),
            serde_json::to_vec(&second).expect("serializable")
        );
    }
}

proptest! {
    /// Configuration survives a TOML round-trip
    #[test]
    fn test_config_round_trip(
        log_level in "error|warn|info|debug|trace",
        timeout_secs in 1u64..600,
        history_limit in 1usize..100,
    ) {
        let mut config = Config::default();
        config.core.log_level = log_level;
        config.orchestrator.subtask_timeout_secs = timeout_secs;
        config.orchestrator.history_limit = history_limit;

        let toml_string = toml::to_string(&config).expect("Failed to serialize Config");
        let parsed: Config = toml::from_str(&toml_string).expect("Failed to parse Config");

        prop_assert_eq!(config.core.log_level, parsed.core.log_level);
        prop_assert_eq!(
            config.orchestrator.subtask_timeout_secs,
            parsed.orchestrator.subtask_timeout_secs
        );
        prop_assert_eq!(config.orchestrator.history_limit, parsed.orchestrator.history_limit);
    }
}
