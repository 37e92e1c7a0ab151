//! Property-based tests for slot resolution using proptest.
//!
//! Properties verified:
//! - Input order never changes the resolved mapping
//! - At most one task per slot, and only slots that were listed
//! - The winner of a slot is never beaten by another task in it

use std::collections::BTreeSet;

use proptest::prelude::*;
use swarmwait_cluster::{Node, Task, TaskState};
use swarmwait_converge::{ActiveNodes, LIFECYCLE, SlotMap, StateRank};

fn state() -> impl Strategy<Value = TaskState> {
    (0..LIFECYCLE.len()).prop_map(|i| LIFECYCLE.get(i).copied().unwrap_or(TaskState::New))
}

fn task() -> impl Strategy<Value = Task> {
    (0u64..6, state(), state(), 0usize..4, 0u32..1000).prop_map(
        |(slot, desired, observed, node, id)| {
            let node_id = match node {
                0 => String::new(),
                n => format!("n{n}"),
            };
            Task::new(format!("task-{id}"), slot, desired, observed).on_node(node_id)
        },
    )
}

/// A listing with unique task ids, as the orchestrator reports them.
fn listing(min: usize) -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(task(), min..24).prop_map(|tasks| {
        tasks
            .into_iter()
            .enumerate()
            .map(|(i, mut task)| {
                task.id = format!("{}-{i}", task.id);
                task
            })
            .collect()
    })
}

fn nodes() -> Vec<Node> {
    vec![Node::ready("n1"), Node::ready("n2"), Node::down("n3")]
}

fn key(task: &Task) -> (StateRank, StateRank, String) {
    let desired = task
        .desired_state
        .known()
        .map_or(StateRank::of(TaskState::Rejected), StateRank::of);
    let observed = task
        .observed_state
        .known()
        .map_or(StateRank::of(TaskState::Rejected), StateRank::of);
    (desired, observed, task.id.clone())
}

proptest! {
    /// Property: any permutation of the listing resolves identically.
    #[test]
    fn prop_resolution_ignores_input_order(
        (tasks, shuffled) in listing(0)
            .prop_flat_map(|tasks| (Just(tasks.clone()), Just(tasks).prop_shuffle()))
    ) {
        let active = ActiveNodes::from_nodes(&nodes());
        prop_assert_eq!(
            SlotMap::resolve(tasks, &active),
            SlotMap::resolve(shuffled, &active)
        );
    }

    /// Property: resolved slots are a subset of listed slots and no task on
    /// a down node survives.
    #[test]
    fn prop_resolution_only_keeps_admitted_tasks(tasks in listing(0)) {
        let active = ActiveNodes::from_nodes(&nodes());
        let listed: BTreeSet<u64> = tasks.iter().map(|t| t.slot).collect();
        let slots = SlotMap::resolve(tasks, &active);

        for (slot, task) in slots.iter() {
            prop_assert!(listed.contains(&slot));
            prop_assert_eq!(task.slot, slot);
            prop_assert_ne!(task.node_id.as_str(), "n3");
        }
    }

    /// Property: the kept task has the smallest (desired, observed, id) key
    /// among the admitted tasks of its slot.
    #[test]
    fn prop_winner_has_lowest_precedence_key(tasks in listing(1)) {
        let active = ActiveNodes::from_nodes(&nodes());
        let slots = SlotMap::resolve(tasks.clone(), &active);

        for (slot, winner) in slots.iter() {
            let best = tasks
                .iter()
                .filter(|t| t.slot == slot && active.admits(&t.node_id))
                .map(key)
                .min();
            prop_assert_eq!(best, Some(key(winner)));
        }
    }
}
